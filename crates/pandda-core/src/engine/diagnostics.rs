//! Recoverable conditions and the per-shell summary they are reported in.

use crate::core::models::ids::Dtag;
use crate::core::models::shell::Shell;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

/// A condition the analysis recovered from. Recorded, logged, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnalysisWarning {
    /// A near-zero denominator was replaced by a fallback or floor value.
    NumericalInstability {
        #[serde(skip_serializing_if = "Option::is_none")]
        dtag: Option<Dtag>,
        /// Number of voxels affected; zero when the whole dataset is affected.
        voxels: usize,
        message: String,
    },
    /// An event region too small to score; its BDC was defaulted.
    DegenerateCluster {
        dtag: Dtag,
        event_idx: usize,
        event_voxels: usize,
        surround_voxels: usize,
    },
    DatasetSkipped { dtag: Dtag, reason: String },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumericalInstability {
                dtag: Some(dtag),
                message,
                ..
            } => write!(f, "numerical instability in {dtag}: {message}"),
            Self::NumericalInstability { message, .. } => {
                write!(f, "numerical instability: {message}")
            }
            Self::DegenerateCluster {
                dtag,
                event_idx,
                event_voxels,
                surround_voxels,
            } => write!(
                f,
                "degenerate region for {dtag}/event_{event_idx} ({event_voxels} event, {surround_voxels} surrounding voxels); BDC defaulted"
            ),
            Self::DatasetSkipped { dtag, reason } => write!(f, "skipped {dtag}: {reason}"),
        }
    }
}

/// Cluster counts after each detection stage, summed over the datasets of a shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClusterStageCounts {
    pub initial: usize,
    pub large: usize,
    pub peaked: usize,
    pub merged: usize,
}

impl AddAssign for ClusterStageCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.initial += rhs.initial;
        self.large += rhs.large;
        self.peaked += rhs.peaked;
        self.merged += rhs.merged;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ShellStatus {
    Completed,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellSummary {
    pub number: usize,
    pub resolution_high: f64,
    pub resolution_low: f64,
    pub num_train: usize,
    pub num_test: usize,
    pub status: ShellStatus,
    pub sigma_i: BTreeMap<Dtag, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma_s_m_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma_s_m_median: Option<f64>,
    pub clusters: ClusterStageCounts,
    pub num_events: usize,
    pub skipped: Vec<Dtag>,
    pub warnings: Vec<AnalysisWarning>,
    pub seconds: f64,
}

impl ShellSummary {
    pub fn new(shell: &Shell) -> Self {
        Self {
            number: shell.number,
            resolution_high: shell.resolution_high.angstroms(),
            resolution_low: shell.resolution_low.angstroms(),
            num_train: shell.train_dtags.len(),
            num_test: shell.test_dtags.len(),
            status: ShellStatus::Completed,
            sigma_i: BTreeMap::new(),
            sigma_s_m_min: None,
            sigma_s_m_median: None,
            clusters: ClusterStageCounts::default(),
            num_events: 0,
            skipped: Vec::new(),
            warnings: Vec::new(),
            seconds: 0.0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ShellStatus::Completed
    }

    /// Records a skipped dataset and its reason.
    pub fn skip(&mut self, dtag: &Dtag, reason: impl Into<String>) {
        if !self.skipped.contains(dtag) {
            self.skipped.push(dtag.clone());
        }
        self.warnings.push(AnalysisWarning::DatasetSkipped {
            dtag: dtag.clone(),
            reason: reason.into(),
        });
    }
}

/// The document written as `shells.toml`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellReport<'a> {
    pub shells: &'a [ShellSummary],
}
