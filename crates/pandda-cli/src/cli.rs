use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "PanDDA - Pan-Dataset Density Analysis. Finds weak binding events across many aligned crystallographic density maps of the same crystal system.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads. Defaults to the number of logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pan-dataset analysis: shells, background models, Z-maps, events and sites.
    Analyse(AnalyseArgs),
}

/// Arguments for the `analyse` subcommand.
#[derive(Args, Debug)]
pub struct AnalyseArgs {
    // --- Inputs and outputs ---
    /// CSV manifest with one `dtag,resolution,map` row per dataset.
    #[arg(long, required = true, value_name = "PATH")]
    pub manifest: PathBuf,

    /// TOML descriptor of the shared grid and its masks.
    #[arg(long, required = true, value_name = "PATH")]
    pub grid: PathBuf,

    /// Directory receiving the analysis tables (created if missing).
    #[arg(short, long, required = true, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Optional analysis configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Overrides ---
    /// Z threshold used to extract clusters.
    #[arg(long, value_name = "FLOAT")]
    pub contour_level: Option<f64>,

    /// Minimum cluster volume in cubic Angstroms.
    #[arg(long, value_name = "FLOAT")]
    pub min_blob_volume: Option<f64>,

    /// Minimum absolute Z peak of a cluster.
    #[arg(long, value_name = "FLOAT")]
    pub min_blob_z_peak: Option<f64>,

    /// Number of training datasets per background model.
    #[arg(long, value_name = "NUM")]
    pub min_characterisation_datasets: Option<usize>,

    /// Maximum number of test datasets per shell.
    #[arg(long, value_name = "NUM")]
    pub max_shell_datasets: Option<usize>,

    /// Also extract clusters of strongly negative Z.
    #[arg(long)]
    pub negative_values: bool,

    /// Write the background-corrected map of every event.
    #[arg(long)]
    pub write_event_maps: bool,

    /// Override a configuration value, e.g. `-S blob-finding.contour-level=3.0`.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
}
