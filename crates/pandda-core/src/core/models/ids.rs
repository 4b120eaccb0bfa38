use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of one crystallographic dataset.
///
/// Dtags are the join key across every per-dataset structure (resolutions, maps, sigma_i,
/// Z-maps, events), so they are ordered and hashable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dtag(String);

impl Dtag {
    pub fn new(dtag: impl Into<String>) -> Self {
        Self(dtag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dtag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dtag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Dtag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An event is addressed by its dataset and a 1-based index within that dataset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub dtag: Dtag,
    pub event_idx: usize,
}

impl EventId {
    pub fn new(dtag: Dtag, event_idx: usize) -> Self {
        Self { dtag, event_idx }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/event_{}", self.dtag, self.event_idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub usize);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
