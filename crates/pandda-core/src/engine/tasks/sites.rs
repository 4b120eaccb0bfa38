use crate::core::models::event::Event;
use crate::core::models::ids::SiteId;
use crate::core::models::site::{EventTable, Site, SiteTable};
use crate::core::utils::linkage::link_within;
use crate::engine::config::SiteConfig;
use nalgebra::{Point3, Vector3};
use tracing::{info, instrument};

/// Links the events of every dataset into sites.
///
/// Events are put in `(dtag, event_idx)` order first, so the tables do not depend on the
/// order in which shells delivered them. Sites are numbered from 1 in the order of their
/// first member.
#[instrument(skip_all, name = "sites_task")]
pub fn run(mut events: Vec<Event>, config: &SiteConfig) -> (EventTable, SiteTable) {
    events.sort_by(|a, b| a.id.cmp(&b.id));
    let centroids: Vec<Point3<f64>> = events.iter().map(|e| e.cluster.centroid).collect();
    let groups = link_within(&centroids, config.merge_distance);

    let mut sites = Vec::with_capacity(groups.len());
    for (position, group) in groups.iter().enumerate() {
        let id = SiteId(position + 1);
        let sum = group
            .iter()
            .fold(Vector3::zeros(), |acc, &i| acc + centroids[i].coords);
        let centroid = Point3::from(sum / group.len() as f64);
        let members = group.iter().map(|&i| events[i].id.clone()).collect();
        for &i in group {
            events[i].site = Some(id);
        }
        sites.push(Site {
            id,
            centroid,
            members,
        });
    }

    info!(
        num_events = events.len(),
        num_sites = sites.len(),
        "Events linked into sites."
    );
    (EventTable { events }, SiteTable { sites })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::cluster::Cluster;
    use crate::core::models::grid::GridGeometry;
    use crate::core::models::ids::{Dtag, EventId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn event(g: &GridGeometry, dtag: &str, idx: usize, coord: [usize; 3]) -> Event {
        Event {
            id: EventId::new(Dtag::new(dtag), idx),
            cluster: Cluster::new(Dtag::new(dtag), vec![g.index(coord)], 5.0, g),
            bdc: 0.4,
            site: None,
        }
    }

    fn events() -> Vec<Event> {
        let g = GridGeometry::cubic([30, 30, 30], 0.5).unwrap();
        vec![
            event(&g, "b", 1, [10, 10, 10]),
            event(&g, "a", 1, [11, 10, 10]),
            event(&g, "a", 2, [25, 25, 25]),
            event(&g, "c", 1, [10, 12, 10]),
            event(&g, "c", 2, [2, 2, 2]),
        ]
    }

    fn config() -> SiteConfig {
        SiteConfig {
            merge_distance: 1.7,
        }
    }

    #[test]
    fn run_links_events_of_different_datasets_at_same_place() {
        let (events, sites) = run(events(), &config());
        assert_eq!(sites.len(), 3);
        let first = &sites.sites[0];
        assert_eq!(first.id, SiteId(1));
        assert_eq!(
            first.members,
            vec![
                EventId::new(Dtag::new("a"), 1),
                EventId::new(Dtag::new("b"), 1),
                EventId::new(Dtag::new("c"), 1),
            ]
        );
        assert!(events.events.iter().all(|e| e.site.is_some()));
        let expected = Point3::new((5.5 + 5.0 + 5.0) / 3.0, (5.0 + 5.0 + 6.0) / 3.0, 5.0);
        assert!((first.centroid - expected).norm() < 1e-12);
    }

    #[test]
    fn run_is_invariant_to_event_order() {
        let (reference_events, reference_sites) = run(events(), &config());
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..5 {
            let mut shuffled = events();
            shuffled.shuffle(&mut rng);
            let (events, sites) = run(shuffled, &config());
            assert_eq!(sites, reference_sites);
            assert_eq!(events, reference_events);
        }
    }

    #[test]
    fn run_handles_no_events() {
        let (events, sites) = run(Vec::new(), &config());
        assert!(events.is_empty());
        assert!(sites.is_empty());
    }
}
