use super::event::{Event, EventRecord};
use super::ids::{EventId, SiteId};
use nalgebra::Point3;
use serde::Serialize;

/// Events from possibly many datasets sharing one physical location.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: SiteId,
    /// Mean of the member event centroids.
    pub centroid: Point3<f64>,
    /// Member events, sorted.
    pub members: Vec<EventId>,
}

impl Site {
    pub fn to_record(&self) -> SiteRecord {
        SiteRecord {
            site_idx: self.id.0,
            x: self.centroid.x,
            y: self.centroid.y,
            z: self.centroid.z,
            num_events: self.members.len(),
        }
    }
}

/// One row of the site table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteRecord {
    pub site_idx: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub num_events: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteTable {
    pub sites: Vec<Site>,
}

impl SiteTable {
    pub fn records(&self) -> Vec<SiteRecord> {
        self.sites.iter().map(Site::to_record).collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    pub events: Vec<Event>,
}

impl EventTable {
    pub fn records(&self) -> Vec<EventRecord> {
        self.events.iter().map(Event::to_record).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
