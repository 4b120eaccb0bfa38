use crate::core::models::grid::{Grid, GridGeometry};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A file format storing the values of one grid without its geometry.
///
/// The geometry is always supplied by the caller, so every file of a run is interpreted on
/// the same shared grid.
pub trait GridFile {
    /// The voxel value type stored by the format.
    type Value;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads exactly one grid's worth of values.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be read or does not hold exactly
    /// `geometry.len()` values.
    fn read_from(
        reader: &mut impl Read,
        geometry: &GridGeometry,
    ) -> Result<Grid<Self::Value>, Self::Error>;

    fn write_to(grid: &Grid<Self::Value>, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(
        path: P,
        geometry: &GridGeometry,
    ) -> Result<Grid<Self::Value>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, geometry)
    }

    fn write_to_path<P: AsRef<Path>>(
        grid: &Grid<Self::Value>,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(grid, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
