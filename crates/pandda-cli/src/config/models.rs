use pandda::engine::config::AnalysisConfig;
use std::path::PathBuf;

/// Everything the `analyse` command needs after all configuration sources are merged.
pub struct AppConfig {
    pub manifest_path: PathBuf,
    pub grid_path: PathBuf,
    pub out_dir: PathBuf,
    pub analysis: AnalysisConfig,
}
