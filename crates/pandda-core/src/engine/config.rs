use crate::core::models::dataset::DatasetFlags;
use crate::core::models::grid::Connectivity;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellingConfig {
    pub min_characterisation_datasets: usize,
    pub max_shell_datasets: usize,
    /// Largest resolution span (Angstroms) of the test members of one shell.
    pub high_res_increment: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Lower bound of every `sigma_i` and `sigma_s_m`.
    pub sigma_floor: f64,
    pub scale_fit_max_iterations: usize,
    pub scale_fit_tolerance: f64,
    /// Clipping threshold, in standard deviations, of the local variance estimate.
    pub clip_sigma: f64,
    pub clip_max_passes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlobFindingConfig {
    pub contour_level: f64,
    /// Minimum cluster volume in cubic Angstroms, inclusive.
    pub min_blob_volume: f64,
    pub min_blob_z_peak: f64,
    pub outer_mask: f64,
    pub cluster_cutoff_distance_multiplier: f64,
    pub negative_values: bool,
    pub connectivity: Connectivity,
}

impl BlobFindingConfig {
    /// Centroid distance below which clusters of one dataset are merged.
    #[inline]
    pub fn merge_distance(&self) -> f64 {
        self.cluster_cutoff_distance_multiplier * self.outer_mask
    }
}

/// Upper bound on the number of background density correction values scored per event.
pub const MAX_BDC_CANDIDATES: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundCorrectionConfig {
    pub min_bdc: f64,
    pub max_bdc: f64,
    pub increment: f64,
    /// Width, in voxels, of the shell around an event used as the reference region.
    pub surround_radius: usize,
    /// Smallest event or surrounding region that can be scored.
    pub min_region_voxels: usize,
}

impl BackgroundCorrectionConfig {
    /// Candidate values `min_bdc + k * increment` below `max_bdc`, followed by `max_bdc`.
    ///
    /// At most [`MAX_BDC_CANDIDATES`] values are produced; `validate` rejects ranges that need more.
    pub fn candidates(&self) -> Vec<f64> {
        let mut values = Vec::new();
        let mut k = 0usize;
        while values.len() + 1 < MAX_BDC_CANDIDATES {
            let b = self.min_bdc + k as f64 * self.increment;
            if b >= self.max_bdc - 1e-12 {
                break;
            }
            values.push(b);
            k += 1;
        }
        values.push(self.max_bdc);
        values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub merge_distance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub shelling: ShellingConfig,
    pub model: ModelConfig,
    pub blob_finding: BlobFindingConfig,
    pub background_correction: BackgroundCorrectionConfig,
    pub sites: SiteConfig,
    pub flags: DatasetFlags,
    /// Keep the background-corrected map of every event in the result.
    pub retain_event_maps: bool,
}

#[derive(Default)]
pub struct AnalysisConfigBuilder {
    min_characterisation_datasets: Option<usize>,
    max_shell_datasets: Option<usize>,
    high_res_increment: Option<f64>,
    sigma_floor: Option<f64>,
    scale_fit_max_iterations: Option<usize>,
    scale_fit_tolerance: Option<f64>,
    clip_sigma: Option<f64>,
    clip_max_passes: Option<usize>,
    contour_level: Option<f64>,
    min_blob_volume: Option<f64>,
    min_blob_z_peak: Option<f64>,
    outer_mask: Option<f64>,
    cluster_cutoff_distance_multiplier: Option<f64>,
    negative_values: Option<bool>,
    connectivity: Option<Connectivity>,
    min_bdc: Option<f64>,
    max_bdc: Option<f64>,
    increment: Option<f64>,
    surround_radius: Option<usize>,
    min_region_voxels: Option<usize>,
    site_merge_distance: Option<f64>,
    flags: Option<DatasetFlags>,
    retain_event_maps: Option<bool>,
}

impl AnalysisConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_characterisation_datasets(mut self, n: usize) -> Self {
        self.min_characterisation_datasets = Some(n);
        self
    }
    pub fn max_shell_datasets(mut self, n: usize) -> Self {
        self.max_shell_datasets = Some(n);
        self
    }
    pub fn high_res_increment(mut self, angstroms: f64) -> Self {
        self.high_res_increment = Some(angstroms);
        self
    }
    pub fn sigma_floor(mut self, floor: f64) -> Self {
        self.sigma_floor = Some(floor);
        self
    }
    pub fn scale_fit_max_iterations(mut self, iterations: usize) -> Self {
        self.scale_fit_max_iterations = Some(iterations);
        self
    }
    pub fn scale_fit_tolerance(mut self, tolerance: f64) -> Self {
        self.scale_fit_tolerance = Some(tolerance);
        self
    }
    pub fn clip_sigma(mut self, k: f64) -> Self {
        self.clip_sigma = Some(k);
        self
    }
    pub fn clip_max_passes(mut self, passes: usize) -> Self {
        self.clip_max_passes = Some(passes);
        self
    }
    pub fn contour_level(mut self, level: f64) -> Self {
        self.contour_level = Some(level);
        self
    }
    pub fn min_blob_volume(mut self, volume: f64) -> Self {
        self.min_blob_volume = Some(volume);
        self
    }
    pub fn min_blob_z_peak(mut self, z: f64) -> Self {
        self.min_blob_z_peak = Some(z);
        self
    }
    pub fn outer_mask(mut self, radius: f64) -> Self {
        self.outer_mask = Some(radius);
        self
    }
    pub fn cluster_cutoff_distance_multiplier(mut self, multiplier: f64) -> Self {
        self.cluster_cutoff_distance_multiplier = Some(multiplier);
        self
    }
    pub fn negative_values(mut self, enabled: bool) -> Self {
        self.negative_values = Some(enabled);
        self
    }
    pub fn connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = Some(connectivity);
        self
    }
    pub fn min_bdc(mut self, bdc: f64) -> Self {
        self.min_bdc = Some(bdc);
        self
    }
    pub fn max_bdc(mut self, bdc: f64) -> Self {
        self.max_bdc = Some(bdc);
        self
    }
    pub fn increment(mut self, step: f64) -> Self {
        self.increment = Some(step);
        self
    }
    pub fn surround_radius(mut self, voxels: usize) -> Self {
        self.surround_radius = Some(voxels);
        self
    }
    pub fn min_region_voxels(mut self, voxels: usize) -> Self {
        self.min_region_voxels = Some(voxels);
        self
    }
    pub fn site_merge_distance(mut self, distance: f64) -> Self {
        self.site_merge_distance = Some(distance);
        self
    }
    pub fn flags(mut self, flags: DatasetFlags) -> Self {
        self.flags = Some(flags);
        self
    }
    pub fn retain_event_maps(mut self, retain: bool) -> Self {
        self.retain_event_maps = Some(retain);
        self
    }

    /// Assembles the configuration.
    ///
    /// Shelling, blob-finding, BDC range and site parameters are required; numerical tuning
    /// parameters fall back to the standard values.
    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let shelling = ShellingConfig {
            min_characterisation_datasets: self
                .min_characterisation_datasets
                .ok_or(ConfigError::MissingParameter("min_characterisation_datasets"))?,
            max_shell_datasets: self
                .max_shell_datasets
                .ok_or(ConfigError::MissingParameter("max_shell_datasets"))?,
            high_res_increment: self
                .high_res_increment
                .ok_or(ConfigError::MissingParameter("high_res_increment"))?,
        };
        let model = ModelConfig {
            sigma_floor: self.sigma_floor.unwrap_or(1e-3),
            scale_fit_max_iterations: self.scale_fit_max_iterations.unwrap_or(20),
            scale_fit_tolerance: self.scale_fit_tolerance.unwrap_or(1e-8),
            clip_sigma: self.clip_sigma.unwrap_or(3.0),
            clip_max_passes: self.clip_max_passes.unwrap_or(10),
        };
        let blob_finding = BlobFindingConfig {
            contour_level: self
                .contour_level
                .ok_or(ConfigError::MissingParameter("contour_level"))?,
            min_blob_volume: self
                .min_blob_volume
                .ok_or(ConfigError::MissingParameter("min_blob_volume"))?,
            min_blob_z_peak: self
                .min_blob_z_peak
                .ok_or(ConfigError::MissingParameter("min_blob_z_peak"))?,
            outer_mask: self
                .outer_mask
                .ok_or(ConfigError::MissingParameter("outer_mask"))?,
            cluster_cutoff_distance_multiplier: self
                .cluster_cutoff_distance_multiplier
                .unwrap_or(1.0),
            negative_values: self.negative_values.unwrap_or(false),
            connectivity: self.connectivity.unwrap_or_default(),
        };
        let background_correction = BackgroundCorrectionConfig {
            min_bdc: self.min_bdc.ok_or(ConfigError::MissingParameter("min_bdc"))?,
            max_bdc: self.max_bdc.ok_or(ConfigError::MissingParameter("max_bdc"))?,
            increment: self
                .increment
                .ok_or(ConfigError::MissingParameter("increment"))?,
            surround_radius: self.surround_radius.unwrap_or(3),
            min_region_voxels: self.min_region_voxels.unwrap_or(5),
        };
        let sites = SiteConfig {
            merge_distance: self
                .site_merge_distance
                .ok_or(ConfigError::MissingParameter("site_merge_distance"))?,
        };
        let config = AnalysisConfig {
            shelling,
            model,
            blob_finding,
            background_correction,
            sites,
            flags: self.flags.unwrap_or_default(),
            retain_event_maps: self.retain_event_maps.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

fn require_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(name, format!("must be finite (got {value})")))
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    require_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be positive (got {value})")))
    }
}

fn require_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    require_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must not be negative (got {value})")))
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.shelling;
        if s.min_characterisation_datasets < 2 {
            return Err(invalid(
                "min_characterisation_datasets",
                "at least two datasets are needed to characterise the background",
            ));
        }
        if s.max_shell_datasets == 0 {
            return Err(invalid("max_shell_datasets", "must be at least 1"));
        }
        require_non_negative("high_res_increment", s.high_res_increment)?;

        let m = &self.model;
        require_positive("sigma_floor", m.sigma_floor)?;
        require_positive("scale_fit_tolerance", m.scale_fit_tolerance)?;
        require_positive("clip_sigma", m.clip_sigma)?;

        let b = &self.blob_finding;
        require_positive("contour_level", b.contour_level)?;
        require_non_negative("min_blob_volume", b.min_blob_volume)?;
        require_finite("min_blob_z_peak", b.min_blob_z_peak)?;
        require_non_negative("outer_mask", b.outer_mask)?;
        require_non_negative(
            "cluster_cutoff_distance_multiplier",
            b.cluster_cutoff_distance_multiplier,
        )?;

        let c = &self.background_correction;
        require_positive("increment", c.increment)?;
        require_non_negative("min_bdc", c.min_bdc)?;
        require_finite("max_bdc", c.max_bdc)?;
        if c.max_bdc > 1.0 {
            return Err(invalid("max_bdc", format!("must not exceed 1 (got {})", c.max_bdc)));
        }
        if c.min_bdc > c.max_bdc {
            return Err(invalid(
                "min_bdc",
                format!("{} is greater than max_bdc {}", c.min_bdc, c.max_bdc),
            ));
        }
        let steps = ((c.max_bdc - c.min_bdc) / c.increment).ceil() + 1.0;
        if steps > MAX_BDC_CANDIDATES as f64 {
            return Err(invalid(
                "increment",
                format!(
                    "{} yields {steps} candidates between {} and {}; at most {MAX_BDC_CANDIDATES} are allowed",
                    c.increment, c.min_bdc, c.max_bdc
                ),
            ));
        }

        require_non_negative("site_merge_distance", self.sites.merge_distance)?;
        Ok(())
    }
}
