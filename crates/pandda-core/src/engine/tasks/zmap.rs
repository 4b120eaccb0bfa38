use super::model::BackgroundModel;
use crate::core::models::grid::{DensityGrid, GridError};
use crate::core::models::ids::Dtag;
use crate::core::models::masked::MaskedVoxelArray;
use crate::engine::error::EngineError;
use tracing::{instrument, trace};

/// Standardized deviations of one dataset from the background model.
#[derive(Debug, Clone, PartialEq)]
pub struct Zmap {
    dtag: Dtag,
    grid: DensityGrid,
}

impl Zmap {
    pub fn new(dtag: Dtag, grid: DensityGrid) -> Self {
        Self { dtag, grid }
    }

    #[inline]
    pub fn dtag(&self) -> &Dtag {
        &self.dtag
    }

    #[inline]
    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }
}

/// `z = (observed - sigma_i * mean) / sigma_s_m` at every masked voxel, zero elsewhere.
#[instrument(skip_all, name = "zmap_task", fields(dtag = %dtag))]
pub fn compute(
    model: &BackgroundModel,
    array: &MaskedVoxelArray,
    dtag: &Dtag,
) -> Result<Zmap, EngineError> {
    let observed = array
        .dataset_values(dtag)
        .ok_or_else(|| EngineError::MissingDataset(dtag.clone()))?;
    let sigma_i = model
        .sigma_i(dtag)
        .ok_or_else(|| EngineError::MissingDataset(dtag.clone()))?;
    if model.num_voxels() != observed.len() {
        return Err(GridError::LengthMismatch {
            expected: model.num_voxels(),
            found: observed.len(),
        }
        .into());
    }

    let z: Vec<f32> = observed
        .iter()
        .zip(model.mean().iter())
        .zip(model.sigma_s_m().iter())
        .map(|((&obs, &mean), &sms)| ((f64::from(obs) - sigma_i * mean) / sms) as f32)
        .collect();
    trace!(
        max_z = z.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        "Z-map computed."
    );

    Ok(Zmap::new(dtag.clone(), array.scatter(&z, 0.0)?))
}
