use super::raw::RawMaskFile;
use super::traits::GridFile;
use super::{IoError, display_path};
use crate::core::models::dataset::{DatasetResolutions, Resolution};
use crate::core::models::grid::{GridGeometry, GridPartitioning};
use crate::core::models::ids::Dtag;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct ManifestRow {
    dtag: String,
    resolution: f64,
    map: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub dtag: Dtag,
    pub resolution: Resolution,
    /// Absolute, or relative to the working directory.
    pub map: PathBuf,
}

/// The datasets of a run, read from a `dtag,resolution,map` CSV file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetManifest {
    entries: Vec<ManifestEntry>,
}

impl DatasetManifest {
    /// Loads a manifest. Relative map paths are resolved against the manifest's directory.
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| IoError::Csv {
                path: display_path(path),
                source: e,
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        let mut entries: Vec<ManifestEntry> = Vec::new();
        for (row_idx, result) in reader.deserialize::<ManifestRow>().enumerate() {
            let row = result.map_err(|e| IoError::Csv {
                path: display_path(path),
                source: e,
            })?;
            let line = row_idx + 2;
            let resolution = Resolution::new(row.resolution).map_err(|e| IoError::Invalid {
                path: display_path(path),
                message: format!("line {line}: {e}"),
            })?;
            let dtag = Dtag::new(row.dtag);
            if entries.iter().any(|e| e.dtag == dtag) {
                return Err(IoError::Invalid {
                    path: display_path(path),
                    message: format!("line {line}: duplicate dataset '{dtag}'"),
                });
            }
            let map = if row.map.is_absolute() {
                row.map
            } else {
                base.join(row.map)
            };
            entries.push(ManifestEntry {
                dtag,
                resolution,
                map,
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolutions(&self) -> DatasetResolutions {
        self.entries
            .iter()
            .map(|e| (e.dtag.clone(), e.resolution))
            .collect()
    }

    pub fn map_paths(&self) -> BTreeMap<Dtag, PathBuf> {
        self.entries
            .iter()
            .map(|e| (e.dtag.clone(), e.map.clone()))
            .collect()
    }
}

/// The shared analysis grid and its masks, read from a TOML descriptor.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GridDescriptor {
    pub dims: [usize; 3],
    pub spacing: [f64; 3],
    #[serde(default)]
    pub origin: [f64; 3],
    pub total_mask: PathBuf,
    /// Defaults to the total mask.
    pub protein_mask: Option<PathBuf>,
}

impl GridDescriptor {
    /// Loads a descriptor. Relative mask paths are resolved against the descriptor's directory.
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let content = std::fs::read_to_string(path).map_err(|e| IoError::Io {
            path: display_path(path),
            source: e,
        })?;
        let mut descriptor: Self = toml::from_str(&content).map_err(|e| IoError::TomlDe {
            path: display_path(path),
            source: e,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        descriptor.total_mask = resolve(descriptor.total_mask);
        descriptor.protein_mask = descriptor.protein_mask.map(resolve);
        Ok(descriptor)
    }

    pub fn geometry(&self) -> Result<GridGeometry, IoError> {
        GridGeometry::new(
            self.dims,
            Vector3::from(self.spacing),
            Point3::from(self.origin),
        )
        .map_err(|e| IoError::Invalid {
            path: "grid descriptor".to_string(),
            message: e.to_string(),
        })
    }

    /// Reads both masks onto the described grid.
    pub fn load_partitioning(&self) -> Result<GridPartitioning, IoError> {
        let geometry = self.geometry()?;
        let read_mask = |path: &Path| {
            RawMaskFile::read_from_path(path, &geometry).map_err(|e| IoError::Grid {
                path: display_path(path),
                source: e,
            })
        };
        let total = read_mask(&self.total_mask)?;
        match &self.protein_mask {
            Some(protein_path) => {
                let protein = read_mask(protein_path)?;
                GridPartitioning::new(total, protein).map_err(|e| IoError::Invalid {
                    path: display_path(protein_path),
                    message: e.to_string(),
                })
            }
            None => Ok(GridPartitioning::from_single_mask(total)),
        }
    }
}
