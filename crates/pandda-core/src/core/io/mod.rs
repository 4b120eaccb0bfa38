//! File formats of the thin outer layer.
//!
//! Density maps and masks travel as raw little-endian arrays laid out on a grid described
//! separately; datasets are listed in a CSV manifest; results are written as CSV tables and
//! TOML summaries. The analysis itself never touches the filesystem.

pub mod manifest;
pub mod raw;
pub mod tables;
pub mod traits;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("TOML parsing error for '{path}': {source}")]
    TomlDe {
        path: String,
        source: toml::de::Error,
    },
    #[error("TOML serialization error for '{path}': {source}")]
    TomlSer {
        path: String,
        source: toml::ser::Error,
    },
    #[error("Grid file error for '{path}': {source}")]
    Grid {
        path: String,
        source: raw::RawGridError,
    },
    #[error("Invalid content in '{path}': {message}")]
    Invalid { path: String, message: String },
}

pub(crate) fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
