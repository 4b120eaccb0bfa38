use crate::error::{CliError, Result};
use pandda::core::models::grid::Connectivity;
use pandda::core::models::ids::Dtag;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileShellingConfig {
    pub min_characterisation_datasets: Option<usize>,
    pub max_shell_datasets: Option<usize>,
    pub high_res_increment: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileModelConfig {
    pub sigma_floor: Option<f64>,
    pub scale_fit_max_iterations: Option<usize>,
    pub scale_fit_tolerance: Option<f64>,
    pub clip_sigma: Option<f64>,
    pub clip_max_passes: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBlobFindingConfig {
    pub contour_level: Option<f64>,
    pub min_blob_volume: Option<f64>,
    pub min_blob_z_peak: Option<f64>,
    pub outer_mask: Option<f64>,
    pub cluster_cutoff_distance_multiplier: Option<f64>,
    pub negative_values: Option<bool>,
    pub connectivity: Option<Connectivity>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBackgroundCorrectionConfig {
    pub min_bdc: Option<f64>,
    pub max_bdc: Option<f64>,
    pub increment: Option<f64>,
    pub surround_radius: Option<usize>,
    pub min_region_voxels: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSiteConfig {
    pub merge_distance: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDatasetsConfig {
    #[serde(default)]
    pub ignore: Vec<Dtag>,
    #[serde(default)]
    pub exclude_from_characterisation: Vec<Dtag>,
    #[serde(default)]
    pub exclude_from_z_map_analysis: Vec<Dtag>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileOutputConfig {
    pub write_event_maps: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub shelling: Option<FileShellingConfig>,
    pub model: Option<FileModelConfig>,
    pub blob_finding: Option<FileBlobFindingConfig>,
    pub background_correction: Option<FileBackgroundCorrectionConfig>,
    pub sites: Option<FileSiteConfig>,
    pub datasets: Option<FileDatasetsConfig>,
    pub output: Option<FileOutputConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
