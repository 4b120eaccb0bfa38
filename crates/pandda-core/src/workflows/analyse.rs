use crate::core::models::dataset::DatasetResolutions;
use crate::core::models::event::Event;
use crate::core::models::grid::{DensityGrid, GridPartitioning};
use crate::core::models::ids::{Dtag, EventId};
use crate::core::models::masked::MaskedVoxelArray;
use crate::core::models::shell::Shell;
use crate::core::models::site::{EventTable, SiteTable};
use crate::engine::config::AnalysisConfig;
use crate::engine::diagnostics::{AnalysisWarning, ClusterStageCounts, ShellStatus, ShellSummary};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::provider::MapProvider;
use crate::engine::sink::EventMapSink;
use crate::engine::tasks;
use crate::engine::tasks::model::BackgroundModel;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// One summary per shell, in shell order, including failed shells.
    pub shells: Vec<ShellSummary>,
    pub events: EventTable,
    pub sites: SiteTable,
}

impl AnalysisResult {
    pub fn num_failed_shells(&self) -> usize {
        self.shells.iter().filter(|s| !s.is_completed()).count()
    }
}

/// Everything one shell hands to the final reduction.
struct ShellOutcome {
    summary: ShellSummary,
    events: Vec<Event>,
}

/// The fitted state of one shell that every test dataset reads.
struct FittedShell<'a> {
    maps: &'a BTreeMap<Dtag, DensityGrid>,
    array: &'a MaskedVoxelArray,
    model: &'a BackgroundModel,
    mean: &'a DensityGrid,
}

/// Everything one test dataset hands back to its shell.
#[derive(Default)]
struct DatasetOutcome {
    events: Vec<Event>,
    counts: ClusterStageCounts,
    warnings: Vec<AnalysisWarning>,
}

/// Runs the whole analysis over every dataset in `resolutions`.
///
/// When `retain_event_maps` is set, each background-corrected event map is handed to `sink` as
/// soon as it is built. A dataset whose map cannot be stored is skipped like any other failing
/// dataset; maps it stored before the failure are left in place.
#[instrument(skip_all, name = "analyse_workflow")]
pub fn run<P: MapProvider + ?Sized, S: EventMapSink + ?Sized>(
    resolutions: &DatasetResolutions,
    partitioning: &GridPartitioning,
    provider: &P,
    sink: &S,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
) -> Result<AnalysisResult, EngineError> {
    config.validate()?;

    // === Phase 1: Partition datasets into shells ===
    reporter.report(Progress::PhaseStart { name: "Shelling" });
    let shells = tasks::shelling::run(resolutions, &config.flags, &config.shelling)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Process shells independently ===
    reporter.report(Progress::PhaseStart {
        name: "Processing Shells",
    });
    reporter.report(Progress::TaskStart {
        total_steps: shells.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = shells.iter();

    #[cfg(feature = "parallel")]
    let iterator = shells.par_iter();

    let outcomes: Vec<ShellOutcome> = iterator
        .map(|shell| {
            let outcome = process_shell(shell, partitioning, provider, sink, config);
            reporter.report(Progress::ShellFinished {
                number: shell.number,
                completed: outcome.summary.is_completed(),
                events: outcome.events.len(),
            });
            reporter.report(Progress::TaskIncrement);
            outcome
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Reduce events of all shells into sites ===
    reporter.report(Progress::PhaseStart { name: "Sites" });
    let mut summaries = Vec::with_capacity(outcomes.len());
    let mut events = Vec::new();
    for outcome in outcomes {
        if outcome.summary.is_completed() {
            events.extend(outcome.events);
        }
        summaries.push(outcome.summary);
    }
    summaries.sort_by_key(|s| s.number);
    let (events, sites) = tasks::sites::run(events, &config.sites);
    reporter.report(Progress::PhaseFinish);

    let result = AnalysisResult {
        shells: summaries,
        events,
        sites,
    };
    info!(
        num_shells = result.shells.len(),
        failed_shells = result.num_failed_shells(),
        num_events = result.events.len(),
        num_sites = result.sites.len(),
        "Analysis complete."
    );
    Ok(result)
}

/// Runs one shell to completion. Failures are recorded in the summary, never propagated.
fn process_shell<P: MapProvider + ?Sized, S: EventMapSink + ?Sized>(
    shell: &Shell,
    partitioning: &GridPartitioning,
    provider: &P,
    sink: &S,
    config: &AnalysisConfig,
) -> ShellOutcome {
    let started = Instant::now();
    let mut summary = ShellSummary::new(shell);
    let outcome = try_process_shell(shell, partitioning, provider, sink, config, &mut summary);
    summary.seconds = started.elapsed().as_secs_f64();

    match outcome {
        Ok(events) => {
            summary.num_events = events.len();
            info!(
                shell = shell.number,
                num_events = events.len(),
                seconds = summary.seconds,
                "Shell complete."
            );
            ShellOutcome { summary, events }
        }
        Err(e) => {
            warn!(shell = shell.number, error = %e, "Shell failed and is excluded from the results.");
            summary.status = ShellStatus::Failed {
                reason: e.to_string(),
            };
            ShellOutcome {
                summary,
                events: Vec::new(),
            }
        }
    }
}

#[instrument(skip_all, name = "shell", fields(shell = shell.number))]
fn try_process_shell<P: MapProvider + ?Sized, S: EventMapSink + ?Sized>(
    shell: &Shell,
    partitioning: &GridPartitioning,
    provider: &P,
    sink: &S,
    config: &AnalysisConfig,
    summary: &mut ShellSummary,
) -> Result<Vec<Event>, EngineError> {
    info!(
        resolution_high = shell.resolution_high.angstroms(),
        resolution_low = shell.resolution_low.angstroms(),
        num_train = shell.train_dtags.len(),
        num_test = shell.test_dtags.len(),
        "Processing shell."
    );

    let maps = load_maps(shell, partitioning, provider, summary);

    let train: Vec<Dtag> = shell
        .train_dtags
        .iter()
        .filter(|dtag| maps.contains_key(*dtag))
        .cloned()
        .collect();
    let required = config.shelling.min_characterisation_datasets.max(2);
    if train.len() < required {
        return Err(EngineError::InsufficientTrainingData {
            shell: shell.number,
            available: train.len(),
            required,
        });
    }

    let array = MaskedVoxelArray::from_grids(maps.iter(), partitioning.total_mask())?;
    let fit = tasks::model::run(shell.number, &array, &train, &config.model)?;
    summary.warnings.extend(fit.warnings);
    let model = fit.model;
    summary.sigma_i = model.sigma_i_map().clone();
    summary.sigma_s_m_min = model.sigma_s_m_min();
    summary.sigma_s_m_median = model.sigma_s_m_median();
    let mean = model.mean_grid(&array)?;

    let tests: Vec<&Dtag> = shell
        .test_dtags
        .iter()
        .filter(|dtag| maps.contains_key(*dtag))
        .collect();

    let fitted = FittedShell {
        maps: &maps,
        array: &array,
        model: &model,
        mean: &mean,
    };

    #[cfg(not(feature = "parallel"))]
    let iterator = tests.iter();

    #[cfg(feature = "parallel")]
    let iterator = tests.par_iter();

    let results: Vec<(&Dtag, Result<DatasetOutcome, EngineError>)> = iterator
        .map(|&dtag| {
            let result = analyse_dataset(dtag, &fitted, partitioning, sink, config);
            (dtag, result)
        })
        .collect();

    let mut events = Vec::new();
    for (dtag, result) in results {
        match result {
            Ok(outcome) => {
                summary.clusters += outcome.counts;
                summary.warnings.extend(outcome.warnings);
                events.extend(outcome.events);
            }
            Err(e) => {
                warn!(dtag = %dtag, error = %e, "Dataset analysis failed; skipping dataset.");
                summary.skip(dtag, e.to_string());
            }
        }
    }
    Ok(events)
}

/// Requests every map of the shell; unusable datasets are skipped with a warning.
fn load_maps<P: MapProvider + ?Sized>(
    shell: &Shell,
    partitioning: &GridPartitioning,
    provider: &P,
    summary: &mut ShellSummary,
) -> BTreeMap<Dtag, DensityGrid> {
    let dtags: Vec<Dtag> = shell.all_dtags().into_iter().collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = dtags.iter();

    #[cfg(feature = "parallel")]
    let iterator = dtags.par_iter();

    let loaded: Vec<(&Dtag, Result<DensityGrid, String>)> = iterator
        .map(|dtag| {
            let result = provider
                .load(dtag, shell.resolution_low)
                .map_err(|e| {
                    EngineError::MapProvider {
                        dtag: dtag.clone(),
                        source: e,
                    }
                    .to_string()
                })
                .and_then(|grid| {
                    partitioning
                        .geometry()
                        .ensure_same(grid.geometry())
                        .map(|_| grid)
                        .map_err(|e| EngineError::from(e).to_string())
                });
            (dtag, result)
        })
        .collect();

    let mut maps = BTreeMap::new();
    for (dtag, result) in loaded {
        match result {
            Ok(grid) => {
                maps.insert(dtag.clone(), grid);
            }
            Err(reason) => {
                warn!(dtag = %dtag, %reason, "Map unavailable; skipping dataset.");
                summary.skip(dtag, reason);
            }
        }
    }
    maps
}

#[instrument(skip_all, name = "dataset", fields(dtag = %dtag))]
fn analyse_dataset<S: EventMapSink + ?Sized>(
    dtag: &Dtag,
    fitted: &FittedShell<'_>,
    partitioning: &GridPartitioning,
    sink: &S,
    config: &AnalysisConfig,
) -> Result<DatasetOutcome, EngineError> {
    let mean = fitted.mean;
    let observed = fitted
        .maps
        .get(dtag)
        .ok_or_else(|| EngineError::MissingDataset(dtag.clone()))?;
    let zmap = tasks::zmap::compute(fitted.model, fitted.array, dtag)?;
    let search =
        tasks::clustering::run(&zmap, partitioning.protein_mask(), &config.blob_finding)?;

    let mut outcome = DatasetOutcome {
        counts: search.counts,
        ..Default::default()
    };
    for (position, cluster) in search.clusters.into_iter().enumerate() {
        let event_idx = position + 1;
        let estimate = tasks::bdc::estimate(
            &cluster,
            event_idx,
            observed,
            mean,
            partitioning.total_mask(),
            &config.background_correction,
        )?;
        outcome.warnings.extend(estimate.warning);

        let id = EventId::new(dtag.clone(), event_idx);
        if config.retain_event_maps {
            let map = tasks::bdc::corrected_map(observed, mean, estimate.bdc)?;
            sink.store(&id, map).map_err(|source| EngineError::EventMapSink {
                id: id.clone(),
                source,
            })?;
        }
        outcome.events.push(Event {
            id,
            cluster,
            bdc: estimate.bdc,
            site: None,
        });
    }
    Ok(outcome)
}
