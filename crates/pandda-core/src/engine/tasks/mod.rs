pub mod bdc;
pub mod clustering;
pub mod model;
pub mod shelling;
pub mod sites;
pub mod zmap;
