//! Data models shared by every stage of the analysis.

pub mod cluster;
pub mod dataset;
pub mod event;
pub mod grid;
pub mod ids;
pub mod masked;
pub mod shell;
pub mod site;
