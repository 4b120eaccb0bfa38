pub mod linkage;
pub mod stats;
