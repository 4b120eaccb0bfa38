//! Synthetic datasets for end-to-end tests.
//!
//! Every dataset is the same random base density plus a checkerboard noise of fixed
//! amplitude whose sign flips with the dataset index. Any run of consecutive dataset indices of
//! even length therefore sees a balanced set of deviations at every voxel, which keeps the
//! fitted noise close to the noise amplitude and the Z-values of unperturbed datasets near one.

use crate::core::models::dataset::{DatasetResolutions, Resolution};
use crate::core::models::grid::{DensityGrid, GridGeometry, GridPartitioning, Mask};
use crate::core::models::ids::Dtag;
use crate::core::models::masked::MaskedVoxelArray;
use crate::engine::config::{AnalysisConfig, AnalysisConfigBuilder};
use crate::engine::provider::InMemoryMapProvider;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

pub(crate) const NOISE: f64 = 0.1;
pub(crate) const BUMP_HEIGHT: f64 = 0.5;
pub(crate) const BUMP_WIDTH: f64 = 1.0;

pub(crate) fn dtag(index: usize) -> Dtag {
    Dtag::new(format!("x{index:03}"))
}

pub(crate) fn geometry() -> GridGeometry {
    GridGeometry::cubic([16, 16, 16], 0.5).unwrap()
}

pub(crate) fn bump_centre() -> Point3<f64> {
    Point3::new(4.0, 4.0, 4.0)
}

/// Standard analysis parameters with a single wide shell for ascending resolutions.
pub(crate) fn config(min_characterisation_datasets: usize) -> AnalysisConfig {
    AnalysisConfigBuilder::new()
        .min_characterisation_datasets(min_characterisation_datasets)
        .max_shell_datasets(60)
        .high_res_increment(1.0)
        .contour_level(2.5)
        .min_blob_volume(1.0)
        .min_blob_z_peak(3.0)
        .outer_mask(6.0)
        .min_bdc(0.0)
        .max_bdc(1.0)
        .increment(0.05)
        .site_merge_distance(1.7)
        .build()
        .unwrap()
}

fn base_density(geometry: &GridGeometry) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..geometry.len()).map(|_| rng.gen_range(0.5..1.5)).collect()
}

fn dataset_map(geometry: &GridGeometry, base: &[f64], index: usize, bumped: bool) -> DensityGrid {
    let centre = bump_centre();
    let values = base
        .iter()
        .enumerate()
        .map(|(voxel, &b)| {
            let [i, j, k] = geometry.coord(voxel);
            let sign = if (index + i + j + k) % 2 == 0 { 1.0 } else { -1.0 };
            let mut value = b + sign * NOISE;
            if bumped {
                let r2 = (geometry.position(voxel) - centre).norm_squared();
                value += BUMP_HEIGHT * (-r2 / (2.0 * BUMP_WIDTH * BUMP_WIDTH)).exp();
            }
            value as f32
        })
        .collect();
    DensityGrid::from_vec(geometry.clone(), values).unwrap()
}

pub(crate) struct SyntheticSet {
    pub geometry: GridGeometry,
    pub partitioning: GridPartitioning,
    pub resolutions: DatasetResolutions,
    pub maps: BTreeMap<Dtag, DensityGrid>,
}

impl SyntheticSet {
    /// Dataset `i` gets resolution `resolutions[i]`; datasets listed in `bumped` carry a
    /// Gaussian bump at [`bump_centre`].
    pub fn new(resolutions: &[f64], bumped: &[usize]) -> Self {
        let geometry = geometry();
        let base = base_density(&geometry);
        let maps = (0..resolutions.len())
            .map(|i| (dtag(i), dataset_map(&geometry, &base, i, bumped.contains(&i))))
            .collect();
        let resolutions = resolutions
            .iter()
            .enumerate()
            .map(|(i, &r)| (dtag(i), Resolution::new(r).unwrap()))
            .collect();

        let total = Mask::filled(geometry.clone(), true);
        let [nx, ny, nz] = geometry.dims();
        let protein_values = (0..geometry.len())
            .map(|voxel| {
                let [i, j, k] = geometry.coord(voxel);
                i > 0 && j > 0 && k > 0 && i < nx - 1 && j < ny - 1 && k < nz - 1
            })
            .collect();
        let protein = Mask::from_vec(geometry.clone(), protein_values).unwrap();

        Self {
            partitioning: GridPartitioning::new(total, protein).unwrap(),
            geometry,
            resolutions,
            maps,
        }
    }

    /// `n` datasets with ascending resolutions from 1.5 A in steps of 0.01 A.
    pub fn single_shell(n: usize, bumped: &[usize]) -> Self {
        let resolutions: Vec<f64> = (0..n).map(|i| 1.5 + 0.01 * i as f64).collect();
        Self::new(&resolutions, bumped)
    }

    pub fn masked_array(&self) -> MaskedVoxelArray {
        MaskedVoxelArray::from_grids(self.maps.iter(), self.partitioning.total_mask()).unwrap()
    }

    /// The `k` datasets with the largest resolution values.
    pub fn coarsest(&self, k: usize) -> Vec<Dtag> {
        let mut sorted: Vec<(&Dtag, &Resolution)> = self.resolutions.iter().collect();
        sorted.sort_by(|a, b| a.1.angstroms().total_cmp(&b.1.angstroms()).then(a.0.cmp(b.0)));
        sorted[sorted.len() - k..]
            .iter()
            .map(|(d, _)| (*d).clone())
            .collect()
    }

    pub fn bump_voxel(&self) -> usize {
        self.geometry.nearest_voxel(&bump_centre()).unwrap()
    }

    pub fn provider(&self) -> InMemoryMapProvider {
        InMemoryMapProvider::new(self.maps.clone())
    }
}
