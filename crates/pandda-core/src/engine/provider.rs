//! Access to aligned density maps, the one external collaborator the analysis calls into.

use crate::core::io::raw::RawDensityFile;
use crate::core::io::traits::GridFile;
use crate::core::io::{IoError, display_path};
use crate::core::models::dataset::Resolution;
use crate::core::models::grid::{DensityGrid, GridError, GridGeometry};
use crate::core::models::ids::Dtag;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapProviderError {
    #[error("No map is known for dataset '{0}'")]
    NotFound(Dtag),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("{0}")]
    Other(String),
}

/// Produces the density map of a dataset on the shared analysis grid.
///
/// `resolution` is the resolution the caller needs the map truncated to; every dataset of a
/// shell is requested at the shell's lowest resolution. Implementations must return maps of
/// identical geometry for every dataset.
pub trait MapProvider: Sync {
    fn load(&self, dtag: &Dtag, resolution: Resolution) -> Result<DensityGrid, MapProviderError>;
}

/// Serves maps that are already held in memory, whatever resolution is requested.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMapProvider {
    maps: BTreeMap<Dtag, DensityGrid>,
}

impl InMemoryMapProvider {
    pub fn new(maps: BTreeMap<Dtag, DensityGrid>) -> Self {
        Self { maps }
    }

    pub fn insert(&mut self, dtag: Dtag, map: DensityGrid) {
        self.maps.insert(dtag, map);
    }
}

impl MapProvider for InMemoryMapProvider {
    fn load(&self, dtag: &Dtag, _resolution: Resolution) -> Result<DensityGrid, MapProviderError> {
        self.maps
            .get(dtag)
            .cloned()
            .ok_or_else(|| MapProviderError::NotFound(dtag.clone()))
    }
}

/// Reads pre-aligned raw maps from disk on demand.
///
/// The files are expected to be sampled already at a resolution suitable for every shell, so
/// the requested resolution is not used.
#[derive(Debug, Clone)]
pub struct FileMapProvider {
    geometry: GridGeometry,
    paths: BTreeMap<Dtag, PathBuf>,
}

impl FileMapProvider {
    pub fn new(geometry: GridGeometry, paths: BTreeMap<Dtag, PathBuf>) -> Self {
        Self { geometry, paths }
    }
}

impl MapProvider for FileMapProvider {
    fn load(&self, dtag: &Dtag, _resolution: Resolution) -> Result<DensityGrid, MapProviderError> {
        let path = self
            .paths
            .get(dtag)
            .ok_or_else(|| MapProviderError::NotFound(dtag.clone()))?;
        RawDensityFile::read_from_path(path, &self.geometry).map_err(|e| {
            MapProviderError::Io(IoError::Grid {
                path: display_path(path),
                source: e,
            })
        })
    }
}
