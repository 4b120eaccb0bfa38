use super::grid::{DensityGrid, GridError, GridGeometry, Mask};
use super::ids::Dtag;
use nalgebra::DMatrix;
use std::sync::Arc;

/// Density values of several datasets at the voxels selected by a mask.
///
/// Rows are datasets, columns are masked voxels. The matrix is column-major, so the values of
/// one voxel across all datasets are contiguous. The voxel order is the ascending linear index
/// order of the mask and is shared (not copied) by every array derived from this one.
#[derive(Debug, Clone)]
pub struct MaskedVoxelArray {
    geometry: GridGeometry,
    dtags: Vec<Dtag>,
    voxel_indices: Arc<[usize]>,
    values: DMatrix<f32>,
}

impl MaskedVoxelArray {
    pub fn from_grids<'a, I>(grids: I, mask: &Mask) -> Result<Self, GridError>
    where
        I: IntoIterator<Item = (&'a Dtag, &'a DensityGrid)>,
    {
        let geometry = mask.geometry().clone();
        let voxel_indices: Arc<[usize]> = mask.indices().into();

        let mut dtags = Vec::new();
        let mut rows: Vec<&DensityGrid> = Vec::new();
        for (dtag, grid) in grids {
            geometry.ensure_same(grid.geometry())?;
            dtags.push(dtag.clone());
            rows.push(grid);
        }

        let values = DMatrix::from_fn(rows.len(), voxel_indices.len(), |r, c| {
            rows[r].data()[voxel_indices[c]]
        });

        Ok(Self {
            geometry,
            dtags,
            voxel_indices,
            values,
        })
    }

    #[inline]
    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    #[inline]
    pub fn dtags(&self) -> &[Dtag] {
        &self.dtags
    }

    #[inline]
    pub fn voxel_indices(&self) -> &[usize] {
        &self.voxel_indices
    }

    #[inline]
    pub fn num_datasets(&self) -> usize {
        self.values.nrows()
    }

    #[inline]
    pub fn num_voxels(&self) -> usize {
        self.values.ncols()
    }

    #[inline]
    pub fn values(&self) -> &DMatrix<f32> {
        &self.values
    }

    pub fn row_of(&self, dtag: &Dtag) -> Option<usize> {
        self.dtags.iter().position(|d| d == dtag)
    }

    /// Values of every dataset at masked voxel `voxel`, in row order.
    #[inline]
    pub fn voxel_values(&self, voxel: usize) -> &[f32] {
        let n = self.num_datasets();
        &self.values.as_slice()[voxel * n..(voxel + 1) * n]
    }

    /// Values of one dataset at every masked voxel.
    pub fn dataset_values(&self, dtag: &Dtag) -> Option<Vec<f32>> {
        self.row_of(dtag)
            .map(|row| self.values.row(row).iter().copied().collect())
    }

    /// A new array holding only the requested datasets, in the requested order. Dtags that are
    /// not present are skipped.
    pub fn select(&self, dtags: &[Dtag]) -> Self {
        let rows: Vec<usize> = dtags.iter().filter_map(|d| self.row_of(d)).collect();
        let values = self.values.select_rows(rows.iter());
        Self {
            geometry: self.geometry.clone(),
            dtags: rows.iter().map(|&r| self.dtags[r].clone()).collect(),
            voxel_indices: Arc::clone(&self.voxel_indices),
            values,
        }
    }

    /// Places one value per masked voxel back on the full grid; unmasked voxels get `fill`.
    pub fn scatter(&self, values: &[f32], fill: f32) -> Result<DensityGrid, GridError> {
        if values.len() != self.num_voxels() {
            return Err(GridError::LengthMismatch {
                expected: self.num_voxels(),
                found: values.len(),
            });
        }
        let mut grid = DensityGrid::filled(self.geometry.clone(), fill);
        let data = grid.data_mut();
        for (&idx, &value) in self.voxel_indices.iter().zip(values) {
            data[idx] = value;
        }
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Vec<(Dtag, DensityGrid)>, Mask) {
        let g = GridGeometry::cubic([2, 2, 1], 1.0).unwrap();
        let mask = Mask::from_vec(g.clone(), vec![true, false, true, true]).unwrap();
        let grids = vec![
            (
                Dtag::new("a"),
                DensityGrid::from_vec(g.clone(), vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
            ),
            (
                Dtag::new("b"),
                DensityGrid::from_vec(g, vec![5.0, 6.0, 7.0, 8.0]).unwrap(),
            ),
        ];
        (grids, mask)
    }

    #[test]
    fn from_grids_keeps_only_masked_voxels_in_index_order() {
        let (grids, mask) = fixture();
        let array = MaskedVoxelArray::from_grids(grids.iter().map(|(d, g)| (d, g)), &mask).unwrap();
        assert_eq!(array.num_datasets(), 2);
        assert_eq!(array.num_voxels(), 3);
        assert_eq!(array.voxel_indices(), &[0, 2, 3]);
        assert_eq!(
            array.dataset_values(&Dtag::new("b")).unwrap(),
            vec![5.0, 7.0, 8.0]
        );
        assert_eq!(array.voxel_values(1), &[3.0, 7.0]);
    }

    #[test]
    fn select_reorders_rows_and_shares_voxel_order() {
        let (grids, mask) = fixture();
        let array = MaskedVoxelArray::from_grids(grids.iter().map(|(d, g)| (d, g)), &mask).unwrap();
        let subset = array.select(&[Dtag::new("b"), Dtag::new("missing"), Dtag::new("a")]);
        assert_eq!(subset.dtags(), &[Dtag::new("b"), Dtag::new("a")]);
        assert_eq!(subset.voxel_values(0), &[5.0, 1.0]);
        assert_eq!(subset.voxel_indices(), array.voxel_indices());
    }

    #[test]
    fn scatter_restores_grid_with_fill_outside_mask() {
        let (grids, mask) = fixture();
        let array = MaskedVoxelArray::from_grids(grids.iter().map(|(d, g)| (d, g)), &mask).unwrap();
        let grid = array.scatter(&[9.0, 8.0, 7.0], 0.0).unwrap();
        assert_eq!(grid.data(), &[9.0, 0.0, 8.0, 7.0]);
        assert!(array.scatter(&[1.0], 0.0).is_err());
    }

    #[test]
    fn from_grids_rejects_maps_on_another_grid() {
        let (_, mask) = fixture();
        let other = DensityGrid::filled(GridGeometry::cubic([2, 2, 1], 0.5).unwrap(), 0.0);
        let dtag = Dtag::new("c");
        assert!(matches!(
            MaskedVoxelArray::from_grids([(&dtag, &other)], &mask),
            Err(GridError::GeometryMismatch { .. })
        ));
    }
}
