use super::traits::GridFile;
use crate::core::models::grid::{DensityGrid, Grid, GridError, GridGeometry, Mask};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RawGridError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Expected {expected} bytes for the grid, found {found}")]
    Size { expected: usize, found: usize },
    #[error(transparent)]
    Grid(#[from] GridError),
}

fn read_exact_size(
    reader: &mut impl Read,
    expected: usize,
) -> Result<Vec<u8>, RawGridError> {
    let mut bytes = Vec::with_capacity(expected);
    reader.read_to_end(&mut bytes)?;
    if bytes.len() != expected {
        return Err(RawGridError::Size {
            expected,
            found: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Density values as consecutive little-endian `f32` in linear voxel order.
pub struct RawDensityFile;

impl GridFile for RawDensityFile {
    type Value = f32;
    type Error = RawGridError;

    fn read_from(
        reader: &mut impl Read,
        geometry: &GridGeometry,
    ) -> Result<DensityGrid, Self::Error> {
        let bytes = read_exact_size(reader, geometry.len() * 4)?;
        let mut values = vec![0.0f32; geometry.len()];
        LittleEndian::read_f32_into(&bytes, &mut values);
        Ok(Grid::from_vec(geometry.clone(), values)?)
    }

    fn write_to(grid: &DensityGrid, writer: &mut impl Write) -> Result<(), Self::Error> {
        for &value in grid.data() {
            writer.write_f32::<LittleEndian>(value)?;
        }
        Ok(())
    }
}

/// One byte per voxel; any non-zero byte marks the voxel as inside the mask.
pub struct RawMaskFile;

impl GridFile for RawMaskFile {
    type Value = bool;
    type Error = RawGridError;

    fn read_from(reader: &mut impl Read, geometry: &GridGeometry) -> Result<Mask, Self::Error> {
        let bytes = read_exact_size(reader, geometry.len())?;
        let values = bytes.into_iter().map(|b| b != 0).collect();
        Ok(Grid::from_vec(geometry.clone(), values)?)
    }

    fn write_to(grid: &Mask, writer: &mut impl Write) -> Result<(), Self::Error> {
        for &inside in grid.data() {
            writer.write_u8(u8::from(inside))?;
        }
        Ok(())
    }
}
