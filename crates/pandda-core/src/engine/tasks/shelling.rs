use crate::core::models::dataset::{DatasetFlags, DatasetResolutions, Resolution};
use crate::core::models::ids::Dtag;
use crate::core::models::shell::Shell;
use crate::engine::config::ShellingConfig;
use crate::engine::error::EngineError;
use itertools::Itertools;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

/// Tolerance on the resolution span of a shell, absorbing decimal rounding of resolutions.
const SPAN_TOLERANCE: f64 = 1e-9;

/// Partitions the datasets into resolution shells.
///
/// The training pool is the `min_characterisation_datasets` coarsest datasets that may be
/// used for characterisation; it is shared by every shell. Every dataset that may be analysed
/// is a test member of exactly one shell, walking from the finest resolution upwards.
#[instrument(skip_all, name = "shelling_task")]
pub fn run(
    resolutions: &DatasetResolutions,
    flags: &DatasetFlags,
    config: &ShellingConfig,
) -> Result<Vec<Shell>, EngineError> {
    let valid: Vec<(&Dtag, Resolution)> = resolutions
        .iter()
        .filter(|(dtag, _)| !flags.is_ignored(dtag))
        .map(|(dtag, res)| (dtag, *res))
        .sorted_by(|(da, ra), (db, rb)| {
            ra.angstroms()
                .total_cmp(&rb.angstroms())
                .then_with(|| da.cmp(db))
        })
        .collect();

    let characterisable: Vec<&Dtag> = valid
        .iter()
        .filter(|(dtag, _)| flags.can_characterise(dtag))
        .map(|(dtag, _)| *dtag)
        .collect();
    let required = config.min_characterisation_datasets;
    if characterisable.len() < required {
        return Err(EngineError::InsufficientData {
            available: characterisable.len(),
            required,
        });
    }
    let pool: BTreeSet<Dtag> = characterisable[characterisable.len() - required..]
        .iter()
        .map(|dtag| (*dtag).clone())
        .collect();
    debug!(pool = ?pool, "Selected characterisation pool.");

    let mut shells: Vec<Shell> = Vec::new();
    let mut current: Vec<(&Dtag, Resolution)> = Vec::new();
    for &(dtag, res) in valid.iter().filter(|(dtag, _)| flags.can_analyse(dtag)) {
        if let Some(&(_, start)) = current.first() {
            let full = current.len() >= config.max_shell_datasets;
            let too_wide = res.angstroms() - start.angstroms()
                > config.high_res_increment + SPAN_TOLERANCE;
            if full || too_wide {
                shells.push(close_shell(shells.len(), &current, &pool));
                current.clear();
            }
        }
        current.push((dtag, res));
    }
    if !current.is_empty() {
        shells.push(close_shell(shells.len(), &current, &pool));
    }

    if shells.is_empty() {
        warn!("No dataset is eligible for z-map analysis.");
    }
    info!(
        num_shells = shells.len(),
        pool_size = pool.len(),
        "Datasets partitioned into shells."
    );
    Ok(shells)
}

fn close_shell(number: usize, members: &[(&Dtag, Resolution)], pool: &BTreeSet<Dtag>) -> Shell {
    // Members are sorted by resolution, so the first is the finest.
    let resolution_high = members[0].1;
    let resolution_low = members[members.len() - 1].1;
    Shell {
        number,
        resolution_high,
        resolution_low,
        train_dtags: pool.clone(),
        test_dtags: members.iter().map(|(dtag, _)| (*dtag).clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolutions(values: &[(&str, f64)]) -> DatasetResolutions {
        values
            .iter()
            .map(|(d, r)| (Dtag::new(*d), Resolution::new(*r).unwrap()))
            .collect()
    }

    fn config(min_char: usize, max_shell: usize, increment: f64) -> ShellingConfig {
        ShellingConfig {
            min_characterisation_datasets: min_char,
            max_shell_datasets: max_shell,
            high_res_increment: increment,
        }
    }

    fn dtags(shell: &Shell) -> Vec<&str> {
        shell.test_dtags.iter().map(Dtag::as_str).collect()
    }

    #[test]
    fn run_fails_with_fewer_datasets_than_characterisation_pool() {
        let res = resolutions(&[("a", 1.5), ("b", 1.6)]);
        let result = run(&res, &DatasetFlags::default(), &config(3, 10, 0.1));
        assert!(matches!(
            result,
            Err(EngineError::InsufficientData {
                available: 2,
                required: 3
            })
        ));
    }

    #[test]
    fn run_uses_coarsest_datasets_as_shared_training_pool() {
        let res = resolutions(&[("a", 1.5), ("b", 2.5), ("c", 1.9), ("d", 2.2)]);
        let shells = run(&res, &DatasetFlags::default(), &config(2, 10, 0.05)).unwrap();
        let expected: BTreeSet<Dtag> = [Dtag::new("b"), Dtag::new("d")].into_iter().collect();
        assert!(shells.iter().all(|s| s.train_dtags == expected));
    }

    #[test]
    fn run_closes_shell_when_resolution_span_is_exceeded() {
        let res = resolutions(&[("a", 1.50), ("b", 1.55), ("c", 1.56), ("d", 1.70)]);
        let shells = run(&res, &DatasetFlags::default(), &config(2, 10, 0.05)).unwrap();
        assert_eq!(shells.len(), 3);
        assert_eq!(dtags(&shells[0]), vec!["a", "b"]);
        assert_eq!(dtags(&shells[1]), vec!["c"]);
        assert_eq!(dtags(&shells[2]), vec!["d"]);
        assert_eq!(shells[0].resolution_high.angstroms(), 1.50);
        assert_eq!(shells[0].resolution_low.angstroms(), 1.55);
        assert_eq!(
            shells.iter().map(|s| s.number).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn run_closes_shell_when_full_and_keeps_undersized_last_shell() {
        let res = resolutions(&[("a", 2.0), ("b", 2.0), ("c", 2.0), ("d", 2.0), ("e", 2.0)]);
        let shells = run(&res, &DatasetFlags::default(), &config(2, 2, 1.0)).unwrap();
        let sizes: Vec<usize> = shells.iter().map(|s| s.test_dtags.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(dtags(&shells[0]), vec!["a", "b"]);
    }

    #[test]
    fn run_covers_every_analysable_dataset_exactly_once() {
        let values: Vec<(String, f64)> = (0..37)
            .map(|i| (format!("x{i:02}"), 1.2 + 0.013 * i as f64))
            .collect();
        let res: DatasetResolutions = values
            .iter()
            .map(|(d, r)| (Dtag::new(d.as_str()), Resolution::new(*r).unwrap()))
            .collect();
        let shells = run(&res, &DatasetFlags::default(), &config(5, 4, 0.1)).unwrap();

        let mut seen: Vec<Dtag> = shells.iter().flat_map(|s| s.test_dtags.iter().cloned()).collect();
        seen.sort();
        let all: Vec<Dtag> = res.keys().cloned().collect();
        assert_eq!(seen, all);
        for shell in &shells {
            assert!(shell.train_dtags.len() >= 5);
            for dtag in &shell.test_dtags {
                assert!(res[dtag].angstroms() <= shell.resolution_low.angstroms());
            }
        }
    }

    #[test]
    fn run_honours_dataset_flags() {
        let res = resolutions(&[("a", 1.5), ("b", 1.6), ("c", 1.7), ("d", 1.8)]);
        let flags = DatasetFlags {
            ignore: vec![Dtag::new("a")],
            exclude_from_characterisation: vec![Dtag::new("d")],
            exclude_from_z_map_analysis: vec![Dtag::new("c")],
        };
        let shells = run(&res, &flags, &config(2, 10, 1.0)).unwrap();
        assert_eq!(shells.len(), 1);
        assert_eq!(dtags(&shells[0]), vec!["b", "d"]);
        let pool: Vec<&str> = shells[0].train_dtags.iter().map(Dtag::as_str).collect();
        assert_eq!(pool, vec!["b", "c"]);
    }
}
