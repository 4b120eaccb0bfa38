use pandda::core::models::grid::Connectivity;

pub struct DefaultsConfig {
    pub min_characterisation_datasets: usize,
    pub max_shell_datasets: usize,
    pub high_res_increment: f64,
    pub sigma_floor: f64,
    pub scale_fit_max_iterations: usize,
    pub scale_fit_tolerance: f64,
    pub clip_sigma: f64,
    pub clip_max_passes: usize,
    pub contour_level: f64,
    pub min_blob_volume: f64,
    pub min_blob_z_peak: f64,
    pub outer_mask: f64,
    pub cluster_cutoff_distance_multiplier: f64,
    pub negative_values: bool,
    pub connectivity: Connectivity,
    pub min_bdc: f64,
    pub max_bdc: f64,
    pub bdc_increment: f64,
    pub surround_radius: usize,
    pub min_region_voxels: usize,
    pub site_merge_distance: f64,
    pub write_event_maps: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            min_characterisation_datasets: 15,
            max_shell_datasets: 60,
            high_res_increment: 0.05,
            sigma_floor: 1e-3,
            scale_fit_max_iterations: 20,
            scale_fit_tolerance: 1e-8,
            clip_sigma: 3.0,
            clip_max_passes: 10,
            contour_level: 2.5,
            min_blob_volume: 8.0,
            min_blob_z_peak: 3.0,
            outer_mask: 6.0,
            cluster_cutoff_distance_multiplier: 1.0,
            negative_values: false,
            connectivity: Connectivity::Full,
            min_bdc: 0.0,
            max_bdc: 1.0,
            bdc_increment: 0.05,
            surround_radius: 3,
            min_region_voxels: 5,
            site_merge_distance: 1.7,
            write_event_maps: false,
        }
    }
}
