use crate::cli::AnalyseArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use pandda::{
    core::io::{
        manifest::{DatasetManifest, GridDescriptor},
        tables,
    },
    engine::diagnostics::ShellReport,
    engine::progress::ProgressReporter,
    engine::provider::FileMapProvider,
    engine::sink::{DiscardEventMaps, EventMapDirectory, EventMapSink},
    workflows,
    workflows::analyse::AnalysisResult,
};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const ANALYSES_DIR: &str = "analyses";
const PROCESSED_DATASETS_DIR: &str = "processed_datasets";
const EVENTS_FILE: &str = "pandda_analyse_events.csv";
const SITES_FILE: &str = "pandda_analyse_sites.csv";
const SHELLS_FILE: &str = "shells.toml";

pub fn run(args: AnalyseArgs, show_progress: bool) -> Result<()> {
    info!("Merging configuration from defaults, file and CLI arguments...");
    let app_config = config::build_config(&args)?;

    info!("Loading dataset manifest from {:?}", &app_config.manifest_path);
    let manifest = DatasetManifest::load(&app_config.manifest_path)?;
    if manifest.is_empty() {
        return Err(CliError::Argument(format!(
            "Manifest '{}' lists no datasets",
            app_config.manifest_path.display()
        )));
    }

    info!("Loading grid descriptor from {:?}", &app_config.grid_path);
    let descriptor = GridDescriptor::load(&app_config.grid_path)?;
    let partitioning = descriptor.load_partitioning()?;
    let provider = FileMapProvider::new(partitioning.geometry().clone(), manifest.map_paths());

    let progress_handler = if show_progress {
        CliProgressHandler::new()
    } else {
        CliProgressHandler::hidden()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let sink: Box<dyn EventMapSink> = if app_config.analysis.retain_event_maps {
        let maps_dir = app_config.out_dir.join(PROCESSED_DATASETS_DIR);
        info!("Event maps will be written under {:?}", &maps_dir);
        Box::new(EventMapDirectory::new(maps_dir))
    } else {
        Box::new(DiscardEventMaps)
    };

    println!("Analysing {} dataset(s)...", manifest.len());
    let result = workflows::analyse::run(
        &manifest.resolutions(),
        &partitioning,
        &provider,
        sink.as_ref(),
        &app_config.analysis,
        &reporter,
    )?;

    let failed = result.num_failed_shells();
    if failed > 0 {
        warn!("{} of {} shell(s) failed", failed, result.shells.len());
    }

    write_outputs(&app_config.out_dir, &result)?;

    println!(
        "Analysis complete: {} event(s) in {} site(s) from {} shell(s) ({} failed).",
        result.events.len(),
        result.sites.len(),
        result.shells.len(),
        failed
    );
    println!("Results written to: {}", app_config.out_dir.display());
    Ok(())
}

fn write_outputs(out_dir: &Path, result: &AnalysisResult) -> Result<()> {
    let analyses_dir = out_dir.join(ANALYSES_DIR);
    fs::create_dir_all(&analyses_dir)?;

    let events_path = analyses_dir.join(EVENTS_FILE);
    info!("Writing {} event(s) to {:?}", result.events.len(), &events_path);
    tables::write_csv(&events_path, &result.events.records())?;

    let sites_path = analyses_dir.join(SITES_FILE);
    info!("Writing {} site(s) to {:?}", result.sites.len(), &sites_path);
    tables::write_csv(&sites_path, &result.sites.records())?;

    let shells_path = analyses_dir.join(SHELLS_FILE);
    tables::write_toml(
        &shells_path,
        &ShellReport {
            shells: &result.shells,
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use pandda::core::io::raw::{RawDensityFile, RawMaskFile};
    use pandda::core::io::traits::GridFile;
    use pandda::core::models::grid::{Grid, GridGeometry};
    use std::path::PathBuf;
    use tempfile::tempdir;

    const DIMS: [usize; 3] = [6, 6, 6];

    fn write_inputs(dir: &Path, num_datasets: usize) -> (PathBuf, PathBuf) {
        let geometry = GridGeometry::cubic(DIMS, 0.5).unwrap();

        let mask = Grid::filled(geometry.clone(), true);
        RawMaskFile::write_to_path(&mask, dir.join("total.mask")).unwrap();

        let mut manifest = String::from("dtag,resolution,map\n");
        for d in 0..num_datasets {
            let values = (0..geometry.len())
                .map(|i| 1.0 + 0.02 * ((i * 7 + d * 3) % 5) as f32)
                .collect();
            let map = Grid::from_vec(geometry.clone(), values).unwrap();
            let name = format!("x{d:03}.map");
            RawDensityFile::write_to_path(&map, dir.join(&name)).unwrap();
            manifest.push_str(&format!("x{d:03},{:.2},{name}\n", 1.5 + 0.01 * d as f64));
        }
        let manifest_path = dir.join("datasets.csv");
        fs::write(&manifest_path, manifest).unwrap();

        let grid_path = dir.join("grid.toml");
        fs::write(
            &grid_path,
            "dims = [6, 6, 6]\nspacing = [0.5, 0.5, 0.5]\ntotal-mask = \"total.mask\"\n",
        )
        .unwrap();
        (manifest_path, grid_path)
    }

    fn analyse_args(manifest: &Path, grid: &Path, out: &Path, extra: &[&str]) -> AnalyseArgs {
        let mut args = vec![
            "pandda".to_string(),
            "analyse".to_string(),
            "--manifest".to_string(),
            manifest.to_str().unwrap().to_string(),
            "--grid".to_string(),
            grid.to_str().unwrap().to_string(),
            "--out-dir".to_string(),
            out.to_str().unwrap().to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        let Commands::Analyse(analyse_args) = Cli::parse_from(args).command;
        analyse_args
    }

    #[test]
    fn analyse_writes_tables_and_shell_summaries() {
        let dir = tempdir().unwrap();
        let (manifest, grid) = write_inputs(dir.path(), 6);
        let out = dir.path().join("out");

        let args = analyse_args(
            &manifest,
            &grid,
            &out,
            &["--min-characterisation-datasets", "4"],
        );
        run(args, false).unwrap();

        let analyses = out.join(ANALYSES_DIR);
        assert!(analyses.join(EVENTS_FILE).is_file());
        assert!(analyses.join(SITES_FILE).is_file());
        let shells = fs::read_to_string(analyses.join(SHELLS_FILE)).unwrap();
        assert!(shells.contains("[[shells]]"));
        assert!(shells.contains("number = 0"));
    }

    #[test]
    fn write_event_maps_places_one_file_per_event() {
        let dir = tempdir().unwrap();
        let (manifest, grid) = write_inputs(dir.path(), 6);
        let out = dir.path().join("out");

        let args = analyse_args(
            &manifest,
            &grid,
            &out,
            &["--min-characterisation-datasets", "4", "--write-event-maps"],
        );
        run(args, false).unwrap();

        let events = fs::read_to_string(out.join(ANALYSES_DIR).join(EVENTS_FILE)).unwrap();
        let expected: Vec<PathBuf> = events
            .lines()
            .skip(1)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let mut fields = line.split(',');
                let dtag = fields.next().unwrap();
                let idx = fields.next().unwrap();
                out.join(PROCESSED_DATASETS_DIR)
                    .join(dtag)
                    .join(format!("event_{idx}.map"))
            })
            .collect();
        assert!(expected.iter().all(|path| path.is_file()));
        assert_eq!(out.join(PROCESSED_DATASETS_DIR).exists(), !expected.is_empty());
    }

    #[test]
    fn too_few_datasets_is_a_fatal_engine_error() {
        let dir = tempdir().unwrap();
        let (manifest, grid) = write_inputs(dir.path(), 3);
        let out = dir.path().join("out");

        let args = analyse_args(&manifest, &grid, &out, &[]);
        let result = run(args, false);
        assert!(matches!(result, Err(CliError::Engine(_))));
        assert!(!out.join(ANALYSES_DIR).exists());
    }

    #[test]
    fn missing_manifest_is_reported_with_its_path() {
        let dir = tempdir().unwrap();
        let (_, grid) = write_inputs(dir.path(), 1);
        let missing = dir.path().join("nope.csv");

        let args = analyse_args(&missing, &grid, &dir.path().join("out"), &[]);
        let err = run(args, false).unwrap_err();
        assert!(matches!(err, CliError::Files(_)));
        assert!(err.to_string().contains("nope.csv"));
    }
}
