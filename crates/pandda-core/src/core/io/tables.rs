use super::{IoError, display_path};
use serde::Serialize;
use std::path::Path;

/// Writes one CSV row per record, with a header derived from the record's field names.
pub fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<(), IoError> {
    let csv_err = |e| IoError::Csv {
        path: display_path(path),
        source: e,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| IoError::Io {
        path: display_path(path),
        source: e,
    })
}

pub fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let content = toml::to_string_pretty(value).map_err(|e| IoError::TomlSer {
        path: display_path(path),
        source: e,
    })?;
    std::fs::write(path, content).map_err(|e| IoError::Io {
        path: display_path(path),
        source: e,
    })
}
