//! Destinations for background-corrected event maps.
//!
//! Event maps cover the whole grid, so the workflow hands each one to a sink as soon as it is
//! built and keeps nothing afterwards.

use crate::core::io::raw::RawDensityFile;
use crate::core::io::traits::GridFile;
use crate::core::io::{IoError, display_path};
use crate::core::models::grid::DensityGrid;
use crate::core::models::ids::EventId;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EventMapSinkError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("{0}")]
    Other(String),
}

/// Receives every event map the moment it is produced.
///
/// Called concurrently from the worker threads of different datasets.
pub trait EventMapSink: Sync {
    fn store(&self, id: &EventId, map: DensityGrid) -> Result<(), EventMapSinkError>;
}

/// Drops every map.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardEventMaps;

impl EventMapSink for DiscardEventMaps {
    fn store(&self, _id: &EventId, _map: DensityGrid) -> Result<(), EventMapSinkError> {
        Ok(())
    }
}

/// Keeps maps in memory, keyed by event.
#[derive(Debug, Default)]
pub struct CollectedEventMaps {
    maps: Mutex<BTreeMap<EventId, DensityGrid>>,
}

impl CollectedEventMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_maps(self) -> BTreeMap<EventId, DensityGrid> {
        match self.maps.into_inner() {
            Ok(maps) => maps,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EventMapSink for CollectedEventMaps {
    fn store(&self, id: &EventId, map: DensityGrid) -> Result<(), EventMapSinkError> {
        let mut maps = self
            .maps
            .lock()
            .map_err(|_| EventMapSinkError::Other("event map store is poisoned".to_string()))?;
        maps.insert(id.clone(), map);
        Ok(())
    }
}

/// Writes `<root>/<dtag>/event_<idx>.map` as a raw density file.
#[derive(Debug, Clone)]
pub struct EventMapDirectory {
    root: PathBuf,
}

impl EventMapDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: &EventId) -> PathBuf {
        self.root
            .join(id.dtag.as_str())
            .join(format!("event_{}.map", id.event_idx))
    }
}

impl EventMapSink for EventMapDirectory {
    fn store(&self, id: &EventId, map: DensityGrid) -> Result<(), EventMapSinkError> {
        let path = self.path_of(id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| IoError::Io {
                path: display_path(dir),
                source: e,
            })?;
        }
        RawDensityFile::write_to_path(&map, &path).map_err(|e| IoError::Grid {
            path: display_path(&path),
            source: e,
        })?;
        debug!(event = %id, path = %path.display(), "Wrote event map.");
        Ok(())
    }
}
