use crate::core::models::grid::{DensityGrid, GridError};
use crate::core::models::ids::Dtag;
use crate::core::models::masked::MaskedVoxelArray;
use crate::core::utils::stats;
use crate::engine::config::ModelConfig;
use crate::engine::diagnostics::AnalysisWarning;
use crate::engine::error::EngineError;
use nalgebra::DVector;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Weighted sums of squared means below this are treated as a vanishing denominator.
const MIN_SCALE_DENOMINATOR: f64 = 1e-12;

/// The per-shell background model.
///
/// `mean` and `sigma_s_m` are indexed like the columns of the masked voxel array the model
/// was fitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundModel {
    mean: DVector<f64>,
    sigma_i: BTreeMap<Dtag, f64>,
    sigma_s_m: DVector<f64>,
}

impl BackgroundModel {
    #[inline]
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    #[inline]
    pub fn sigma_s_m(&self) -> &DVector<f64> {
        &self.sigma_s_m
    }

    #[inline]
    pub fn sigma_i(&self, dtag: &Dtag) -> Option<f64> {
        self.sigma_i.get(dtag).copied()
    }

    #[inline]
    pub fn sigma_i_map(&self) -> &BTreeMap<Dtag, f64> {
        &self.sigma_i
    }

    #[inline]
    pub fn num_voxels(&self) -> usize {
        self.mean.len()
    }

    pub fn sigma_s_m_min(&self) -> Option<f64> {
        (!self.sigma_s_m.is_empty()).then(|| self.sigma_s_m.min())
    }

    pub fn sigma_s_m_median(&self) -> Option<f64> {
        (!self.sigma_s_m.is_empty()).then(|| stats::median(self.sigma_s_m.as_slice()))
    }

    /// The mean map on the full grid; voxels outside the array's mask are zero.
    pub fn mean_grid(&self, array: &MaskedVoxelArray) -> Result<DensityGrid, GridError> {
        let values: Vec<f32> = self.mean.iter().map(|&v| v as f32).collect();
        array.scatter(&values, 0.0)
    }
}

#[derive(Debug, Clone)]
pub struct ModelFit {
    pub model: BackgroundModel,
    pub warnings: Vec<AnalysisWarning>,
}

/// Fits the background model of one shell.
///
/// The mean and local noise come from the `train_dtags` rows only; `sigma_i` is fitted for
/// every row of `array` so that test datasets can be standardized.
#[instrument(skip_all, name = "model_task", fields(shell = shell))]
pub fn run(
    shell: usize,
    array: &MaskedVoxelArray,
    train_dtags: &[Dtag],
    config: &ModelConfig,
) -> Result<ModelFit, EngineError> {
    let train = array.select(train_dtags);
    if train.num_datasets() < 2 {
        return Err(EngineError::InsufficientTrainingData {
            shell,
            available: train.num_datasets(),
            required: 2,
        });
    }
    info!(
        num_train = train.num_datasets(),
        num_datasets = array.num_datasets(),
        num_voxels = array.num_voxels(),
        "Fitting background model."
    );

    let mean = fit_mean(&train);
    let mut warnings = Vec::new();
    let sigma_i = fit_sigma_i(array, &mean, config, &mut warnings);

    let train_scales: Vec<f64> = train
        .dtags()
        .iter()
        .map(|dtag| {
            sigma_i
                .get(dtag)
                .copied()
                .ok_or_else(|| EngineError::MissingDataset(dtag.clone()))
        })
        .collect::<Result<_, _>>()?;
    let (sigma_s_m, floored) = fit_sigma_s_m(&train, &mean, &train_scales, config);
    if floored > 0 {
        let warning = AnalysisWarning::NumericalInstability {
            dtag: None,
            voxels: floored,
            message: format!(
                "sigma_s_m raised to the floor {} at {floored} voxels",
                config.sigma_floor
            ),
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    let model = BackgroundModel {
        mean,
        sigma_i,
        sigma_s_m,
    };
    debug!(
        sigma_s_m_min = model.sigma_s_m_min(),
        sigma_s_m_median = model.sigma_s_m_median(),
        "Background model fitted."
    );
    Ok(ModelFit { model, warnings })
}

fn fit_mean(train: &MaskedVoxelArray) -> DVector<f64> {
    let n = train.num_datasets() as f64;

    #[cfg(not(feature = "parallel"))]
    let iterator = (0..train.num_voxels()).into_iter();

    #[cfg(feature = "parallel")]
    let iterator = (0..train.num_voxels()).into_par_iter();

    let values: Vec<f64> = iterator
        .map(|voxel| {
            train
                .voxel_values(voxel)
                .iter()
                .map(|&v| f64::from(v))
                .sum::<f64>()
                / n
        })
        .collect();
    DVector::from_vec(values)
}

fn fit_sigma_i(
    array: &MaskedVoxelArray,
    mean: &DVector<f64>,
    config: &ModelConfig,
    warnings: &mut Vec<AnalysisWarning>,
) -> BTreeMap<Dtag, f64> {
    let x = mean.as_slice();

    #[cfg(not(feature = "parallel"))]
    let iterator = array.dtags().iter();

    #[cfg(feature = "parallel")]
    let iterator = array.dtags().par_iter();

    let fits: Vec<(Dtag, stats::HuberFit)> = iterator
        .enumerate()
        .map(|(row, dtag)| {
            let y: Vec<f64> = array
                .values()
                .row(row)
                .iter()
                .map(|&v| f64::from(v))
                .collect();
            let fit = stats::huber_slope_through_origin(
                x,
                &y,
                config.scale_fit_max_iterations,
                config.scale_fit_tolerance,
                MIN_SCALE_DENOMINATOR,
                1.0,
            );
            (dtag.clone(), fit)
        })
        .collect();

    let mut sigma_i = BTreeMap::new();
    for (dtag, fit) in fits {
        let mut slope = fit.slope;
        if fit.degenerate {
            let warning = AnalysisWarning::NumericalInstability {
                dtag: Some(dtag.clone()),
                voxels: 0,
                message: "mean map has no signal; sigma_i set to 1".to_string(),
            };
            warn!("{warning}");
            warnings.push(warning);
        } else if slope.is_nan() || slope < config.sigma_floor {
            let warning = AnalysisWarning::NumericalInstability {
                dtag: Some(dtag.clone()),
                voxels: 0,
                message: format!(
                    "sigma_i {slope:.3e} raised to the floor {}",
                    config.sigma_floor
                ),
            };
            warn!("{warning}");
            warnings.push(warning);
            slope = config.sigma_floor;
        }
        debug!(dtag = %dtag, sigma_i = slope, iterations = fit.iterations, "Fitted dataset scale.");
        sigma_i.insert(dtag, slope);
    }
    sigma_i
}

/// Returns the local noise of every voxel and the number of voxels raised to the floor.
fn fit_sigma_s_m(
    train: &MaskedVoxelArray,
    mean: &DVector<f64>,
    scales: &[f64],
    config: &ModelConfig,
) -> (DVector<f64>, usize) {
    #[cfg(not(feature = "parallel"))]
    let iterator = (0..train.num_voxels()).into_iter();

    #[cfg(feature = "parallel")]
    let iterator = (0..train.num_voxels()).into_par_iter();

    let values: Vec<(f64, bool)> = iterator
        .map(|voxel| {
            let m = mean[voxel];
            let residuals: Vec<f64> = train
                .voxel_values(voxel)
                .iter()
                .zip(scales)
                .map(|(&obs, &scale)| f64::from(obs) - scale * m)
                .collect();
            let sigma = stats::clipped_std(&residuals, config.clip_sigma, config.clip_max_passes);
            if sigma >= config.sigma_floor {
                (sigma, false)
            } else {
                (config.sigma_floor, true)
            }
        })
        .collect();

    let floored = values.iter().filter(|(_, floored)| *floored).count();
    let sigma_s_m = DVector::from_iterator(values.len(), values.into_iter().map(|(s, _)| s));
    (sigma_s_m, floored)
}
