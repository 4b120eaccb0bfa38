use super::ids::Dtag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("Resolution must be a positive, finite number of Angstroms (got {0})")]
    NotPositive(f64),
}

/// High-resolution limit of a dataset in Angstroms. Lower values mean finer data.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Resolution(f64);

impl Resolution {
    pub fn new(angstroms: f64) -> Result<Self, ResolutionError> {
        if angstroms.is_finite() && angstroms > 0.0 {
            Ok(Self(angstroms))
        } else {
            Err(ResolutionError::NotPositive(angstroms))
        }
    }

    #[inline]
    pub fn angstroms(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Resolution {
    type Error = ResolutionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Resolution> for f64 {
    fn from(value: Resolution) -> Self {
        value.0
    }
}

/// Resolution lookup for every valid dataset of a run.
pub type DatasetResolutions = BTreeMap<Dtag, Resolution>;

/// Per-dataset switches carried over from the dataset selection options of the analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetFlags {
    /// Removed before partitioning; never analysed.
    pub ignore: Vec<Dtag>,
    /// Never used to fit the background model.
    pub exclude_from_characterisation: Vec<Dtag>,
    /// Never standardized against the model, so never produce events.
    pub exclude_from_z_map_analysis: Vec<Dtag>,
}

impl DatasetFlags {
    pub fn is_ignored(&self, dtag: &Dtag) -> bool {
        self.ignore.contains(dtag)
    }

    pub fn can_characterise(&self, dtag: &Dtag) -> bool {
        !self.exclude_from_characterisation.contains(dtag)
    }

    pub fn can_analyse(&self, dtag: &Dtag) -> bool {
        !self.exclude_from_z_map_analysis.contains(dtag)
    }
}
