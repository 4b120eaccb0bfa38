use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("Grid dimensions must all be non-zero (got {0:?})")]
    EmptyDimensions([usize; 3]),
    #[error("Grid spacing must be positive and finite along every axis (got {0:?})")]
    InvalidSpacing([f64; 3]),
    #[error("Expected {expected} voxel values for the grid, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("Grid geometries differ: {left} vs {right}")]
    GeometryMismatch { left: String, right: String },
    #[error("Grid dimensions {0:?} exceed the addressable voxel count")]
    TooLarge([usize; 3]),
}

/// Voxel adjacency used when growing connected regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Connectivity {
    /// Voxels sharing a face (6 neighbours).
    Face,
    /// Voxels sharing a face, an edge or a corner (26 neighbours).
    #[default]
    Full,
}

const FACE_OFFSETS: [[i64; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

const FULL_OFFSETS: [[i64; 3]; 26] = full_offsets();

const fn full_offsets() -> [[i64; 3]; 26] {
    let mut out = [[0; 3]; 26];
    let mut n = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[n] = [dx, dy, dz];
                    n += 1;
                }
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    out
}

impl Connectivity {
    pub fn offsets(self) -> &'static [[i64; 3]] {
        match self {
            Connectivity::Face => &FACE_OFFSETS,
            Connectivity::Full => &FULL_OFFSETS,
        }
    }
}

/// Shape and placement of the shared, orthogonal analysis grid.
///
/// Voxels are addressed by a linear index `i + nx * (j + ny * k)`. The grid is not periodic.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    dims: [usize; 3],
    spacing: Vector3<f64>,
    origin: Point3<f64>,
}

impl GridGeometry {
    pub fn new(
        dims: [usize; 3],
        spacing: Vector3<f64>,
        origin: Point3<f64>,
    ) -> Result<Self, GridError> {
        if dims.iter().any(|&d| d == 0) {
            return Err(GridError::EmptyDimensions(dims));
        }
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(GridError::InvalidSpacing([spacing.x, spacing.y, spacing.z]));
        }
        // Every voxel must also be addressable as an f32 byte offset in the raw files.
        let addressable = dims[0]
            .checked_mul(dims[1])
            .and_then(|n| n.checked_mul(dims[2]))
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()));
        if addressable.is_none() {
            return Err(GridError::TooLarge(dims));
        }
        Ok(Self {
            dims,
            spacing,
            origin,
        })
    }

    /// Cubic voxels of edge `spacing`, origin at zero.
    pub fn cubic(dims: [usize; 3], spacing: f64) -> Result<Self, GridError> {
        Self::new(
            dims,
            Vector3::new(spacing, spacing, spacing),
            Point3::origin(),
        )
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    #[inline]
    pub fn spacing(&self) -> &Vector3<f64> {
        &self.spacing
    }

    #[inline]
    pub fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn voxel_volume(&self) -> f64 {
        self.spacing.x * self.spacing.y * self.spacing.z
    }

    #[inline]
    pub fn index(&self, coord: [usize; 3]) -> usize {
        coord[0] + self.dims[0] * (coord[1] + self.dims[1] * coord[2])
    }

    #[inline]
    pub fn coord(&self, index: usize) -> [usize; 3] {
        let i = index % self.dims[0];
        let rest = index / self.dims[0];
        [i, rest % self.dims[1], rest / self.dims[1]]
    }

    pub fn position(&self, index: usize) -> Point3<f64> {
        let [i, j, k] = self.coord(index);
        self.origin
            + Vector3::new(
                i as f64 * self.spacing.x,
                j as f64 * self.spacing.y,
                k as f64 * self.spacing.z,
            )
    }

    /// Index of the voxel whose centre is closest to `point`, if the point lies on the grid.
    pub fn nearest_voxel(&self, point: &Point3<f64>) -> Option<usize> {
        let rel = point - self.origin;
        let mut coord = [0usize; 3];
        for axis in 0..3 {
            let f = (rel[axis] / self.spacing[axis]).round();
            if f < 0.0 || f >= self.dims[axis] as f64 {
                return None;
            }
            coord[axis] = f as usize;
        }
        Some(self.index(coord))
    }

    fn offset(&self, index: usize, delta: [i64; 3]) -> Option<usize> {
        let coord = self.coord(index);
        let mut shifted = [0usize; 3];
        for axis in 0..3 {
            let c = coord[axis] as i64 + delta[axis];
            if c < 0 || c >= self.dims[axis] as i64 {
                return None;
            }
            shifted[axis] = c as usize;
        }
        Some(self.index(shifted))
    }

    pub fn neighbors(
        &self,
        index: usize,
        connectivity: Connectivity,
    ) -> impl Iterator<Item = usize> + '_ {
        connectivity
            .offsets()
            .iter()
            .filter_map(move |&delta| self.offset(index, delta))
    }

    /// All voxels within `radius` voxel steps along every axis (Chebyshev ball), centre included.
    pub fn cube_around(&self, index: usize, radius: usize) -> impl Iterator<Item = usize> + '_ {
        let r = radius as i64;
        (-r..=r).flat_map(move |dz| {
            (-r..=r).flat_map(move |dy| {
                (-r..=r).filter_map(move |dx| self.offset(index, [dx, dy, dz]))
            })
        })
    }

    pub fn ensure_same(&self, other: &GridGeometry) -> Result<(), GridError> {
        if self == other {
            Ok(())
        } else {
            Err(GridError::GeometryMismatch {
                left: self.describe(),
                right: other.describe(),
            })
        }
    }

    fn describe(&self) -> String {
        format!(
            "dims {:?}, spacing ({:.3}, {:.3}, {:.3}), origin ({:.3}, {:.3}, {:.3})",
            self.dims,
            self.spacing.x,
            self.spacing.y,
            self.spacing.z,
            self.origin.x,
            self.origin.y,
            self.origin.z
        )
    }
}

/// A scalar field sampled on a [`GridGeometry`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    geometry: GridGeometry,
    data: Vec<T>,
}

/// Electron density (or any derived real-valued map) on the analysis grid.
pub type DensityGrid = Grid<f32>;

/// Boolean region of interest on the analysis grid.
pub type Mask = Grid<bool>;

impl<T: Clone> Grid<T> {
    pub fn filled(geometry: GridGeometry, value: T) -> Self {
        let data = vec![value; geometry.len()];
        Self { geometry, data }
    }
}

impl<T> Grid<T> {
    pub fn from_vec(geometry: GridGeometry, data: Vec<T>) -> Result<Self, GridError> {
        if data.len() != geometry.len() {
            return Err(GridError::LengthMismatch {
                expected: geometry.len(),
                found: data.len(),
            });
        }
        Ok(Self { geometry, data })
    }

    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

impl Grid<bool> {
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&inside| inside).count()
    }

    /// Linear indices of the voxels inside the mask, in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(idx, &inside)| inside.then_some(idx))
            .collect()
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.data.get(index).copied().unwrap_or(false)
    }
}

/// The voxel regions shared by every dataset: the modelling mask (macromolecule plus symmetry
/// padding) and the protein mask that bounds event detection.
#[derive(Debug, Clone)]
pub struct GridPartitioning {
    geometry: GridGeometry,
    total_mask: Mask,
    protein_mask: Mask,
}

impl GridPartitioning {
    pub fn new(total_mask: Mask, protein_mask: Mask) -> Result<Self, GridError> {
        total_mask.geometry().ensure_same(protein_mask.geometry())?;
        Ok(Self {
            geometry: total_mask.geometry().clone(),
            total_mask,
            protein_mask,
        })
    }

    /// Uses one mask both for modelling and for event detection.
    pub fn from_single_mask(mask: Mask) -> Self {
        Self {
            geometry: mask.geometry().clone(),
            protein_mask: mask.clone(),
            total_mask: mask,
        }
    }

    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    #[inline]
    pub fn total_mask(&self) -> &Mask {
        &self.total_mask
    }

    #[inline]
    pub fn protein_mask(&self) -> &Mask {
        &self.protein_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> GridGeometry {
        GridGeometry::new(
            [4, 3, 2],
            Vector3::new(0.5, 1.0, 2.0),
            Point3::new(10.0, 0.0, -1.0),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_empty_dimensions_and_bad_spacing() {
        assert!(matches!(
            GridGeometry::cubic([0, 2, 2], 0.5),
            Err(GridError::EmptyDimensions(_))
        ));
        assert!(matches!(
            GridGeometry::cubic([2, 2, 2], 0.0),
            Err(GridError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn new_rejects_dimensions_whose_volume_overflows() {
        assert_eq!(
            GridGeometry::cubic([usize::MAX, 2, 1], 0.5),
            Err(GridError::TooLarge([usize::MAX, 2, 1]))
        );
        assert!(matches!(
            GridGeometry::cubic([usize::MAX / 4, 1, 1], 0.5),
            Ok(_)
        ));
        assert!(GridGeometry::cubic([1 << 22, 1 << 22, 1 << 22], 0.5).is_err());
    }

    #[test]
    fn index_and_coord_are_inverse() {
        let g = geometry();
        for idx in 0..g.len() {
            assert_eq!(g.index(g.coord(idx)), idx);
        }
        assert_eq!(g.index([1, 2, 1]), 1 + 4 * (2 + 3));
    }

    #[test]
    fn position_applies_origin_and_anisotropic_spacing() {
        let g = geometry();
        let p = g.position(g.index([2, 1, 1]));
        assert_eq!(p, Point3::new(11.0, 1.0, 1.0));
        assert_eq!(g.voxel_volume(), 1.0);
    }

    #[test]
    fn nearest_voxel_rounds_and_rejects_points_off_grid() {
        let g = geometry();
        assert_eq!(
            g.nearest_voxel(&Point3::new(11.1, 0.9, 1.2)),
            Some(g.index([2, 1, 1]))
        );
        assert_eq!(g.nearest_voxel(&Point3::new(0.0, 0.0, 0.0)), None);
    }

    #[test]
    fn neighbors_respect_connectivity_and_boundaries() {
        let g = GridGeometry::cubic([3, 3, 3], 1.0).unwrap();
        let centre = g.index([1, 1, 1]);
        assert_eq!(g.neighbors(centre, Connectivity::Face).count(), 6);
        assert_eq!(g.neighbors(centre, Connectivity::Full).count(), 26);
        let corner = g.index([0, 0, 0]);
        assert_eq!(g.neighbors(corner, Connectivity::Face).count(), 3);
        assert_eq!(g.neighbors(corner, Connectivity::Full).count(), 7);
    }

    #[test]
    fn cube_around_includes_centre_and_clips_at_edges() {
        let g = GridGeometry::cubic([5, 5, 5], 1.0).unwrap();
        assert_eq!(g.cube_around(g.index([2, 2, 2]), 1).count(), 27);
        assert_eq!(g.cube_around(g.index([0, 0, 0]), 2).count(), 27);
    }

    #[test]
    fn from_vec_checks_length() {
        let g = geometry();
        assert!(matches!(
            DensityGrid::from_vec(g.clone(), vec![0.0; 3]),
            Err(GridError::LengthMismatch {
                expected: 24,
                found: 3
            })
        ));
        assert!(DensityGrid::from_vec(g, vec![0.0; 24]).is_ok());
    }

    #[test]
    fn mask_indices_are_sorted_and_counted() {
        let g = GridGeometry::cubic([2, 2, 1], 1.0).unwrap();
        let mask = Mask::from_vec(g, vec![false, true, false, true]).unwrap();
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.indices(), vec![1, 3]);
        assert!(mask.contains(3));
        assert!(!mask.contains(7));
    }

    #[test]
    fn partitioning_rejects_masks_on_different_grids() {
        let a = Mask::filled(GridGeometry::cubic([2, 2, 2], 1.0).unwrap(), true);
        let b = Mask::filled(GridGeometry::cubic([2, 2, 2], 0.5).unwrap(), true);
        assert!(matches!(
            GridPartitioning::new(a, b),
            Err(GridError::GeometryMismatch { .. })
        ));
    }
}
