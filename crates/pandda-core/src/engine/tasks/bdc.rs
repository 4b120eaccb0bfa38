use crate::core::models::cluster::Cluster;
use crate::core::models::grid::{DensityGrid, Grid, GridError, Mask};
use crate::core::utils::stats::pearson;
use crate::engine::config::BackgroundCorrectionConfig;
use crate::engine::diagnostics::AnalysisWarning;
use crate::engine::error::EngineError;
use tracing::{instrument, trace, warn};

/// Smallest denominator used when rescaling a background-corrected map.
const MIN_CORRECTED_SCALE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct BdcEstimate {
    pub bdc: f64,
    /// Set when the regions were too small to score and the default was used.
    pub warning: Option<AnalysisWarning>,
}

/// The voxels scored for one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Regions {
    pub event: Vec<usize>,
    /// Total-mask voxels within the surround radius of the event, excluding the event itself.
    pub surround: Vec<usize>,
}

pub fn regions(cluster: &Cluster, total_mask: &Mask, surround_radius: usize) -> Regions {
    let geometry = total_mask.geometry();
    let mut surround: Vec<usize> = cluster
        .voxels
        .iter()
        .flat_map(|&voxel| geometry.cube_around(voxel, surround_radius))
        .filter(|&idx| total_mask.contains(idx) && cluster.voxels.binary_search(&idx).is_err())
        .collect();
    surround.sort_unstable();
    surround.dedup();
    Regions {
        event: cluster.voxels.clone(),
        surround,
    }
}

/// Scans the background density correction of one cluster.
///
/// Each candidate `b` is scored as `|corr_event| - corr_surround`, the Pearson correlations of
/// the corrected density `o - b·m` with the mean map `m` inside the event and around it. The
/// event term is unsigned, so subtracting too much background (an anti-correlated event) costs as
/// much as subtracting too little. The lowest score wins and ties keep the smaller `b`.
#[instrument(skip_all, name = "bdc_task", fields(dtag = %cluster.dtag, event_idx = event_idx))]
pub fn estimate(
    cluster: &Cluster,
    event_idx: usize,
    observed: &DensityGrid,
    mean: &DensityGrid,
    total_mask: &Mask,
    config: &BackgroundCorrectionConfig,
) -> Result<BdcEstimate, EngineError> {
    observed.geometry().ensure_same(mean.geometry())?;
    observed.geometry().ensure_same(total_mask.geometry())?;

    let regions = regions(cluster, total_mask, config.surround_radius);
    if regions.event.len() < config.min_region_voxels
        || regions.surround.len() < config.min_region_voxels
    {
        let warning = AnalysisWarning::DegenerateCluster {
            dtag: cluster.dtag.clone(),
            event_idx,
            event_voxels: regions.event.len(),
            surround_voxels: regions.surround.len(),
        };
        warn!("{warning}");
        return Ok(BdcEstimate {
            bdc: 0.0f64.clamp(config.min_bdc, config.max_bdc),
            warning: Some(warning),
        });
    }

    let gather = |grid: &DensityGrid, voxels: &[usize]| -> Vec<f64> {
        voxels.iter().map(|&v| f64::from(grid.data()[v])).collect()
    };
    let (obs_event, mean_event) = (gather(observed, &regions.event), gather(mean, &regions.event));
    let (obs_surround, mean_surround) = (
        gather(observed, &regions.surround),
        gather(mean, &regions.surround),
    );

    let corrected = |obs: &[f64], mean: &[f64], b: f64| -> Vec<f64> {
        obs.iter().zip(mean).map(|(o, m)| o - b * m).collect()
    };

    let mut best_bdc = config.min_bdc;
    let mut best_score = f64::INFINITY;
    for b in config.candidates() {
        let local = pearson(&corrected(&obs_event, &mean_event, b), &mean_event);
        let global = pearson(&corrected(&obs_surround, &mean_surround, b), &mean_surround);
        let score = local.abs() - global;
        trace!(bdc = b, local, global, score, "Scored candidate.");
        if score < best_score {
            best_score = score;
            best_bdc = b;
        }
    }

    Ok(BdcEstimate {
        bdc: best_bdc.clamp(config.min_bdc, config.max_bdc),
        warning: None,
    })
}

/// `(observed - bdc · mean) / max(1 - bdc, 0.01)` over the whole grid.
pub fn corrected_map(
    observed: &DensityGrid,
    mean: &DensityGrid,
    bdc: f64,
) -> Result<DensityGrid, GridError> {
    observed.geometry().ensure_same(mean.geometry())?;
    let scale = (1.0 - bdc).max(MIN_CORRECTED_SCALE);
    let values = observed
        .data()
        .iter()
        .zip(mean.data())
        .map(|(&o, &m)| ((f64::from(o) - bdc * f64::from(m)) / scale) as f32)
        .collect();
    Grid::from_vec(observed.geometry().clone(), values)
}
