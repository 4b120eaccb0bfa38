use super::cluster::Cluster;
use super::ids::{EventId, SiteId};
use serde::Serialize;

/// A significant, spatially localized density anomaly in one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub cluster: Cluster,
    /// Estimated fraction of ground-state density in the observed map at the event.
    pub bdc: f64,
    pub site: Option<SiteId>,
}

impl Event {
    /// Occupancy of the event state implied by the background correction.
    #[inline]
    pub fn occupancy(&self) -> f64 {
        1.0 - self.bdc
    }

    pub fn with_site(mut self, site: SiteId) -> Self {
        self.site = Some(site);
        self
    }

    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            dtag: self.id.dtag.to_string(),
            event_idx: self.id.event_idx,
            x: self.cluster.centroid.x,
            y: self.cluster.centroid.y,
            z: self.cluster.centroid.z,
            bdc: self.bdc,
            site_idx: self.site.map(|s| s.0),
            z_peak: self.cluster.peak,
            cluster_volume: self.cluster.volume,
        }
    }
}

/// One row of the event table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub dtag: String,
    pub event_idx: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub bdc: f64,
    pub site_idx: Option<usize>,
    pub z_peak: f64,
    pub cluster_volume: f64,
}
