//! # Core Module
//!
//! Fundamental building blocks for the pan-dataset analysis: the data models that flow between
//! pipeline stages, numeric helpers, and file I/O.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Dataset identifiers, grids and masks, masked voxel arrays,
//!   shells, clusters, events and sites
//! - **File I/O** ([`io`]) - Raw grid files, dataset manifests, CSV tables and TOML summaries
//! - **Utilities** ([`utils`]) - Robust statistics and proximity-based union-find
//!
//! ## Scientific Foundation
//!
//! - **Aligned density maps** share one grid geometry, so voxel `n` means the same physical
//!   point in every dataset
//! - **Two-level noise model**: a per-dataset scale and a per-voxel residual uncertainty
//! - **Events** are connected regions of outlying voxels, corrected for the ground-state density
//!   still mixed into the observed map

pub mod io;
pub mod models;
pub mod utils;
