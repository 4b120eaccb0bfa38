use super::zmap::Zmap;
use crate::core::models::cluster::Cluster;
use crate::core::models::grid::{GridGeometry, Mask};
use crate::core::utils::linkage::link_within;
use crate::engine::config::BlobFindingConfig;
use crate::engine::diagnostics::ClusterStageCounts;
use crate::engine::error::EngineError;
use std::collections::VecDeque;
use tracing::{debug, instrument};

/// Relative tolerance applied when converting the volume threshold to a voxel count.
const VOLUME_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSearch {
    /// Surviving clusters, ordered by their lowest voxel index.
    pub clusters: Vec<Cluster>,
    pub counts: ClusterStageCounts,
}

/// Extracts, filters and merges the outlier clusters of one Z-map.
///
/// Stages, in order: threshold inside the protein mask, connected components, volume filter,
/// peak filter, centroid merge.
#[instrument(skip_all, name = "clustering_task", fields(dtag = %zmap.dtag()))]
pub fn run(
    zmap: &Zmap,
    protein_mask: &Mask,
    config: &BlobFindingConfig,
) -> Result<ClusterSearch, EngineError> {
    let geometry = zmap.grid().geometry();
    geometry.ensure_same(protein_mask.geometry())?;

    let significance: Vec<f64> = zmap
        .grid()
        .data()
        .iter()
        .map(|&z| {
            let z = f64::from(z);
            if config.negative_values { z.abs() } else { z }
        })
        .collect();
    let selected: Vec<bool> = significance
        .iter()
        .enumerate()
        .map(|(idx, &s)| protein_mask.contains(idx) && s >= config.contour_level)
        .collect();

    let initial = connected_components(zmap, geometry, &selected, &significance, config);
    let mut counts = ClusterStageCounts {
        initial: initial.len(),
        ..Default::default()
    };

    let min_voxels = min_voxel_count(config.min_blob_volume, geometry.voxel_volume());
    let large: Vec<Cluster> = initial
        .into_iter()
        .filter(|c| c.size() >= min_voxels)
        .collect();
    counts.large = large.len();

    let peaked: Vec<Cluster> = large
        .into_iter()
        .filter(|c| c.peak >= config.min_blob_z_peak)
        .collect();
    counts.peaked = peaked.len();

    let merged = merge_clusters(peaked, config.merge_distance(), geometry);
    counts.merged = merged.len();

    debug!(
        initial = counts.initial,
        large = counts.large,
        peaked = counts.peaked,
        merged = counts.merged,
        min_voxels,
        "Cluster stages complete."
    );
    Ok(ClusterSearch {
        clusters: merged,
        counts,
    })
}

/// Smallest whole number of voxels whose volume reaches `min_volume`.
pub fn min_voxel_count(min_volume: f64, voxel_volume: f64) -> usize {
    let ratio = min_volume / voxel_volume;
    (ratio * (1.0 - VOLUME_TOLERANCE)).ceil().max(0.0) as usize
}

fn connected_components(
    zmap: &Zmap,
    geometry: &GridGeometry,
    selected: &[bool],
    significance: &[f64],
    config: &BlobFindingConfig,
) -> Vec<Cluster> {
    let mut visited = vec![false; selected.len()];
    let mut clusters = Vec::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for seed in 0..selected.len() {
        if !selected[seed] || visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut voxels = vec![seed];
        let mut peak = significance[seed];

        while let Some(current) = queue.pop_front() {
            for neighbor in geometry.neighbors(current, config.connectivity) {
                if selected[neighbor] && !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                    voxels.push(neighbor);
                    peak = peak.max(significance[neighbor]);
                }
            }
        }
        clusters.push(Cluster::new(zmap.dtag().clone(), voxels, peak, geometry));
    }
    clusters
}

/// Unions clusters whose centroids are within `cutoff`, repeating on the merged centroids
/// until no pair is left within range. The result is ordered by lowest voxel index.
pub fn merge_clusters(
    mut clusters: Vec<Cluster>,
    cutoff: f64,
    geometry: &GridGeometry,
) -> Vec<Cluster> {
    clusters.sort_by_key(Cluster::anchor);
    loop {
        let centroids: Vec<_> = clusters.iter().map(|c| c.centroid).collect();
        let groups = link_within(&centroids, cutoff);
        if groups.len() == clusters.len() {
            return clusters;
        }
        let mut merged: Vec<Cluster> = groups
            .iter()
            .filter_map(|group| Cluster::merged(group.iter().map(|&i| &clusters[i]), geometry))
            .collect();
        merged.sort_by_key(Cluster::anchor);
        clusters = merged;
    }
}
