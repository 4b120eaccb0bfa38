use thiserror::Error;

use super::config::ConfigError;
use super::provider::MapProviderError;
use super::sink::EventMapSinkError;
use crate::core::models::grid::GridError;
use crate::core::models::ids::{Dtag, EventId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not enough datasets to characterise the background: {available} available, {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("Shell {shell} has {available} usable training datasets, {required} required")]
    InsufficientTrainingData {
        shell: usize,
        available: usize,
        required: usize,
    },

    #[error("Grid dimension mismatch: {0}")]
    DimensionMismatch(#[from] GridError),

    #[error("Dataset '{0}' is not available to this stage")]
    MissingDataset(Dtag),

    #[error("Failed to obtain the map of dataset '{dtag}': {source}")]
    MapProvider {
        dtag: Dtag,
        source: MapProviderError,
    },

    #[error("Failed to store the map of event {id}: {source}")]
    EventMapSink {
        id: EventId,
        source: EventMapSinkError,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
