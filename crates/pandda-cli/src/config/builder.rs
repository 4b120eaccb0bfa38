use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::AnalyseArgs;
use crate::error::{CliError, Result};
use pandda::core::models::dataset::DatasetFlags;
use pandda::core::models::grid::Connectivity;
use pandda::engine::config::AnalysisConfigBuilder;
use std::str::FromStr;

pub fn build_config(args: &AnalyseArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let shelling = file_config.shelling.take().unwrap_or_default();
    let model = file_config.model.take().unwrap_or_default();
    let blob = file_config.blob_finding.take().unwrap_or_default();
    let bdc = file_config.background_correction.take().unwrap_or_default();
    let sites = file_config.sites.take().unwrap_or_default();
    let datasets = file_config.datasets.take().unwrap_or_default();
    let output = file_config.output.take().unwrap_or_default();

    let negative_values = match (args.negative_values, blob.negative_values) {
        (true, _) => true,
        (false, Some(file_val)) => file_val,
        (false, None) => defaults.negative_values,
    };
    let write_event_maps = match (args.write_event_maps, output.write_event_maps) {
        (true, _) => true,
        (false, Some(file_val)) => file_val,
        (false, None) => defaults.write_event_maps,
    };

    let analysis = AnalysisConfigBuilder::new()
        .min_characterisation_datasets(
            args.min_characterisation_datasets
                .or(shelling.min_characterisation_datasets)
                .unwrap_or(defaults.min_characterisation_datasets),
        )
        .max_shell_datasets(
            args.max_shell_datasets
                .or(shelling.max_shell_datasets)
                .unwrap_or(defaults.max_shell_datasets),
        )
        .high_res_increment(
            shelling
                .high_res_increment
                .unwrap_or(defaults.high_res_increment),
        )
        .sigma_floor(model.sigma_floor.unwrap_or(defaults.sigma_floor))
        .scale_fit_max_iterations(
            model
                .scale_fit_max_iterations
                .unwrap_or(defaults.scale_fit_max_iterations),
        )
        .scale_fit_tolerance(
            model
                .scale_fit_tolerance
                .unwrap_or(defaults.scale_fit_tolerance),
        )
        .clip_sigma(model.clip_sigma.unwrap_or(defaults.clip_sigma))
        .clip_max_passes(model.clip_max_passes.unwrap_or(defaults.clip_max_passes))
        .contour_level(
            args.contour_level
                .or(blob.contour_level)
                .unwrap_or(defaults.contour_level),
        )
        .min_blob_volume(
            args.min_blob_volume
                .or(blob.min_blob_volume)
                .unwrap_or(defaults.min_blob_volume),
        )
        .min_blob_z_peak(
            args.min_blob_z_peak
                .or(blob.min_blob_z_peak)
                .unwrap_or(defaults.min_blob_z_peak),
        )
        .outer_mask(blob.outer_mask.unwrap_or(defaults.outer_mask))
        .cluster_cutoff_distance_multiplier(
            blob.cluster_cutoff_distance_multiplier
                .unwrap_or(defaults.cluster_cutoff_distance_multiplier),
        )
        .negative_values(negative_values)
        .connectivity(blob.connectivity.unwrap_or(defaults.connectivity))
        .min_bdc(bdc.min_bdc.unwrap_or(defaults.min_bdc))
        .max_bdc(bdc.max_bdc.unwrap_or(defaults.max_bdc))
        .increment(bdc.increment.unwrap_or(defaults.bdc_increment))
        .surround_radius(bdc.surround_radius.unwrap_or(defaults.surround_radius))
        .min_region_voxels(
            bdc.min_region_voxels
                .unwrap_or(defaults.min_region_voxels),
        )
        .site_merge_distance(
            sites
                .merge_distance
                .unwrap_or(defaults.site_merge_distance),
        )
        .flags(DatasetFlags {
            ignore: datasets.ignore,
            exclude_from_characterisation: datasets.exclude_from_characterisation,
            exclude_from_z_map_analysis: datasets.exclude_from_z_map_analysis,
        })
        .retain_event_maps(write_event_maps)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        manifest_path: args.manifest.clone(),
        grid_path: args.grid.clone(),
        out_dir: args.out_dir.clone(),
        analysis,
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn parse_connectivity(key: &str, value: &str) -> Result<Connectivity> {
    match value {
        "face" => Ok(Connectivity::Face),
        "full" => Ok(Connectivity::Full),
        _ => Err(CliError::Config(format!(
            "Invalid connectivity for {}: '{}'. Expected 'face' or 'full'.",
            key, value
        ))),
    }
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "shelling.min-characterisation-datasets" => {
                config
                    .shelling
                    .get_or_insert_with(Default::default)
                    .min_characterisation_datasets = Some(parse_value(key, value, "integer")?);
            }
            "shelling.max-shell-datasets" => {
                config
                    .shelling
                    .get_or_insert_with(Default::default)
                    .max_shell_datasets = Some(parse_value(key, value, "integer")?);
            }
            "shelling.high-res-increment" => {
                config
                    .shelling
                    .get_or_insert_with(Default::default)
                    .high_res_increment = Some(parse_value(key, value, "float")?);
            }
            "model.sigma-floor" => {
                config.model.get_or_insert_with(Default::default).sigma_floor =
                    Some(parse_value(key, value, "float")?);
            }
            "model.scale-fit-max-iterations" => {
                config
                    .model
                    .get_or_insert_with(Default::default)
                    .scale_fit_max_iterations = Some(parse_value(key, value, "integer")?);
            }
            "model.scale-fit-tolerance" => {
                config
                    .model
                    .get_or_insert_with(Default::default)
                    .scale_fit_tolerance = Some(parse_value(key, value, "float")?);
            }
            "model.clip-sigma" => {
                config.model.get_or_insert_with(Default::default).clip_sigma =
                    Some(parse_value(key, value, "float")?);
            }
            "model.clip-max-passes" => {
                config
                    .model
                    .get_or_insert_with(Default::default)
                    .clip_max_passes = Some(parse_value(key, value, "integer")?);
            }
            "blob-finding.contour-level" => {
                config
                    .blob_finding
                    .get_or_insert_with(Default::default)
                    .contour_level = Some(parse_value(key, value, "float")?);
            }
            "blob-finding.min-blob-volume" => {
                config
                    .blob_finding
                    .get_or_insert_with(Default::default)
                    .min_blob_volume = Some(parse_value(key, value, "float")?);
            }
            "blob-finding.min-blob-z-peak" => {
                config
                    .blob_finding
                    .get_or_insert_with(Default::default)
                    .min_blob_z_peak = Some(parse_value(key, value, "float")?);
            }
            "blob-finding.outer-mask" => {
                config
                    .blob_finding
                    .get_or_insert_with(Default::default)
                    .outer_mask = Some(parse_value(key, value, "float")?);
            }
            "blob-finding.cluster-cutoff-distance-multiplier" => {
                config
                    .blob_finding
                    .get_or_insert_with(Default::default)
                    .cluster_cutoff_distance_multiplier = Some(parse_value(key, value, "float")?);
            }
            "blob-finding.negative-values" => {
                config
                    .blob_finding
                    .get_or_insert_with(Default::default)
                    .negative_values = Some(parse_value(key, value, "boolean")?);
            }
            "blob-finding.connectivity" => {
                config
                    .blob_finding
                    .get_or_insert_with(Default::default)
                    .connectivity = Some(parse_connectivity(key, value)?);
            }
            "background-correction.min-bdc" => {
                config
                    .background_correction
                    .get_or_insert_with(Default::default)
                    .min_bdc = Some(parse_value(key, value, "float")?);
            }
            "background-correction.max-bdc" => {
                config
                    .background_correction
                    .get_or_insert_with(Default::default)
                    .max_bdc = Some(parse_value(key, value, "float")?);
            }
            "background-correction.increment" => {
                config
                    .background_correction
                    .get_or_insert_with(Default::default)
                    .increment = Some(parse_value(key, value, "float")?);
            }
            "background-correction.surround-radius" => {
                config
                    .background_correction
                    .get_or_insert_with(Default::default)
                    .surround_radius = Some(parse_value(key, value, "integer")?);
            }
            "background-correction.min-region-voxels" => {
                config
                    .background_correction
                    .get_or_insert_with(Default::default)
                    .min_region_voxels = Some(parse_value(key, value, "integer")?);
            }
            "sites.merge-distance" => {
                config.sites.get_or_insert_with(Default::default).merge_distance =
                    Some(parse_value(key, value, "float")?);
            }
            "output.write-event-maps" => {
                config
                    .output
                    .get_or_insert_with(Default::default)
                    .write_event_maps = Some(parse_value(key, value, "boolean")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use pandda::core::models::ids::Dtag;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn minimal_args(config_path: Option<&Path>) -> Vec<String> {
        let mut args: Vec<String> = [
            "pandda",
            "analyse",
            "--manifest",
            "datasets.csv",
            "--grid",
            "grid.toml",
            "--out-dir",
            "out",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(path) = config_path {
            args.push("-c".to_string());
            args.push(path.to_str().unwrap().to_string());
        }
        args
    }

    fn analyse_args(args: Vec<String>) -> AnalyseArgs {
        let Commands::Analyse(analyse_args) = Cli::parse_from(args).command;
        analyse_args
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let config = build_config(&analyse_args(minimal_args(None))).unwrap();
        let analysis = config.analysis;
        assert_eq!(analysis.shelling.min_characterisation_datasets, 15);
        assert_eq!(analysis.shelling.max_shell_datasets, 60);
        assert_eq!(analysis.blob_finding.contour_level, 2.5);
        assert_eq!(analysis.blob_finding.min_blob_volume, 8.0);
        assert_eq!(analysis.blob_finding.connectivity, Connectivity::Full);
        assert_eq!(analysis.sites.merge_distance, 1.7);
        assert!(!analysis.blob_finding.negative_values);
        assert!(!analysis.retain_event_maps);
        assert_eq!(config.out_dir, PathBuf::from("out"));
    }

    #[test]
    fn file_values_override_defaults() {
        let config_path = write_config_file(
            "file_values.toml",
            r#"
            [shelling]
            min-characterisation-datasets = 20
            high-res-increment = 0.1

            [blob-finding]
            connectivity = "face"
            negative-values = true

            [datasets]
            exclude-from-characterisation = ["x003"]

            [output]
            write-event-maps = true
            "#,
        );
        let config = build_config(&analyse_args(minimal_args(Some(&config_path)))).unwrap();
        let analysis = config.analysis;
        assert_eq!(analysis.shelling.min_characterisation_datasets, 20);
        assert_eq!(analysis.shelling.high_res_increment, 0.1);
        assert_eq!(analysis.blob_finding.connectivity, Connectivity::Face);
        assert!(analysis.blob_finding.negative_values);
        assert_eq!(
            analysis.flags.exclude_from_characterisation,
            vec![Dtag::new("x003")]
        );
        assert!(analysis.retain_event_maps);
        assert_eq!(analysis.blob_finding.min_blob_z_peak, 3.0);
    }

    #[test]
    fn cli_flags_override_set_values_and_file() {
        let config_path = write_config_file(
            "cli_override.toml",
            r#"
            [blob-finding]
            contour-level = 2.0 # Will be overridden
            min-blob-volume = 5.0
            "#,
        );
        let mut args = minimal_args(Some(&config_path));
        args.extend(
            [
                "--contour-level",
                "3.5",
                "-S",
                "blob-finding.contour-level=3.0",
                "-S",
                "blob-finding.min-blob-volume=12.0",
                "--write-event-maps",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        let analysis = build_config(&analyse_args(args)).unwrap().analysis;
        assert_eq!(analysis.blob_finding.contour_level, 3.5);
        assert_eq!(analysis.blob_finding.min_blob_volume, 12.0);
        assert!(analysis.retain_event_maps);
    }

    #[test]
    fn set_values_reject_unknown_keys_and_bad_values() {
        let mut args = minimal_args(None);
        args.extend(["-S", "sites.radius=2.0"].iter().map(|s| s.to_string()));
        assert!(matches!(
            build_config(&analyse_args(args)),
            Err(CliError::Config(_))
        ));

        let mut args = minimal_args(None);
        args.extend(
            ["-S", "model.clip-max-passes=many"]
                .iter()
                .map(|s| s.to_string()),
        );
        assert!(matches!(
            build_config(&analyse_args(args)),
            Err(CliError::Config(_))
        ));

        let mut args = minimal_args(None);
        args.extend(["-S", "no-equals-sign"].iter().map(|s| s.to_string()));
        assert!(matches!(
            build_config(&analyse_args(args)),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn invalid_ranges_surface_as_config_errors() {
        let mut args = minimal_args(None);
        args.extend(
            ["--min-characterisation-datasets", "1"]
                .iter()
                .map(|s| s.to_string()),
        );
        let result = build_config(&analyse_args(args));
        assert!(
            matches!(result, Err(CliError::Config(msg)) if msg.contains("min_characterisation_datasets"))
        );
    }

    #[test]
    fn malformed_file_is_a_parsing_error() {
        let config_path = write_config_file("malformed.toml", "[shelling\nmax-shell-datasets = 3");
        let result = build_config(&analyse_args(minimal_args(Some(&config_path))));
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }
}
