use super::dataset::Resolution;
use super::ids::Dtag;
use std::collections::BTreeSet;

/// A resolution-homogeneous batch of datasets processed against one background model.
///
/// `test_dtags` are the shell's own members; `train_dtags` is the characterisation pool shared
/// by all shells and may overlap the test set.
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    pub number: usize,
    /// Finest (numerically smallest) resolution among the test members.
    pub resolution_high: Resolution,
    /// Coarsest (numerically largest) resolution among the test members.
    pub resolution_low: Resolution,
    pub train_dtags: BTreeSet<Dtag>,
    pub test_dtags: BTreeSet<Dtag>,
}

impl Shell {
    /// Every dataset whose map is needed to process the shell.
    pub fn all_dtags(&self) -> BTreeSet<Dtag> {
        self.train_dtags.union(&self.test_dtags).cloned().collect()
    }
}
