use super::grid::GridGeometry;
use super::ids::Dtag;
use nalgebra::{Point3, Vector3};

/// A connected set of outlying voxels in one dataset's Z-map.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub dtag: Dtag,
    /// Linear voxel indices, ascending.
    pub voxels: Vec<usize>,
    /// Largest deviation inside the cluster (absolute when negative values are analysed).
    pub peak: f64,
    /// Mean physical position of the member voxels.
    pub centroid: Point3<f64>,
    /// Physical volume in cubic Angstroms.
    pub volume: f64,
}

impl Cluster {
    pub fn new(dtag: Dtag, mut voxels: Vec<usize>, peak: f64, geometry: &GridGeometry) -> Self {
        voxels.sort_unstable();
        voxels.dedup();
        let centroid = centroid_of(&voxels, geometry);
        let volume = voxels.len() as f64 * geometry.voxel_volume();
        Self {
            dtag,
            voxels,
            peak,
            centroid,
            volume,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.voxels.len()
    }

    /// Lowest member voxel; used as the stable ordering key of clusters.
    #[inline]
    pub fn anchor(&self) -> usize {
        self.voxels.first().copied().unwrap_or(usize::MAX)
    }

    /// Union of several clusters of the same dataset.
    pub fn merged<'a>(parts: impl IntoIterator<Item = &'a Cluster>, geometry: &GridGeometry) -> Option<Self> {
        let mut parts = parts.into_iter().peekable();
        let dtag = parts.peek()?.dtag.clone();
        let mut voxels = Vec::new();
        let mut peak = f64::NEG_INFINITY;
        for part in parts {
            voxels.extend_from_slice(&part.voxels);
            peak = peak.max(part.peak);
        }
        Some(Self::new(dtag, voxels, peak, geometry))
    }
}

fn centroid_of(voxels: &[usize], geometry: &GridGeometry) -> Point3<f64> {
    if voxels.is_empty() {
        return *geometry.origin();
    }
    let sum = voxels
        .iter()
        .fold(Vector3::zeros(), |acc, &idx| acc + geometry.position(idx).coords);
    Point3::from(sum / voxels.len() as f64)
}
