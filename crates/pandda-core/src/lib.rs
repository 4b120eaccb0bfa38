//! # PanDDA Core Library
//!
//! The statistical core of Pan-Dataset Density Analysis: given many aligned electron-density
//! maps of the same macromolecule, it builds a per-voxel background model, standardizes each
//! dataset against it and reports the localized anomalies ("events") that recur as binding
//! "sites" across the collection.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Plain data models (`Dtag`, `DensityGrid`, `Mask`,
//!   `MaskedVoxelArray`, `Shell`, `Cluster`, `Event`, `Site`), numeric utilities and the thin
//!   file I/O used by the command-line front end.
//!
//! - **[`engine`]: The Logic Core.** Configuration, errors and diagnostics, the external
//!   collaborator traits, and one task module per pipeline stage (shelling, background model,
//!   Z-maps, clustering, background correction, site assignment). Every task is a pure function
//!   of its inputs.
//!
//! - **[`workflows`]: The Public API.** `workflows::analyse::run` partitions datasets into
//!   shells, evaluates the shells independently and folds their events into the global
//!   event and site tables.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
pub(crate) mod testing;
