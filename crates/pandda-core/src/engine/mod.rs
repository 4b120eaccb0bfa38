//! # Engine Module
//!
//! The statistical machinery of the analysis: everything between a set of aligned maps and
//! the per-dataset events.
//!
//! ## Overview
//!
//! Each pipeline stage lives in its own task module and is a pure function of its inputs:
//!
//! - **Shelling** - groups datasets into resolution shells sharing one training pool
//! - **Model** - fits the per-voxel mean, per-dataset scale and per-voxel local noise
//! - **Z-map** - standardizes a dataset against the fitted model
//! - **Clustering** - extracts, filters and merges connected outlier regions
//! - **BDC** - scans the background density correction of every cluster
//! - **Sites** - links events of all datasets into shared sites
//!
//! The supporting modules hold the configuration ([`config`]), error types ([`error`]),
//! recoverable warnings and shell summaries ([`diagnostics`]), progress reporting
//! ([`progress`]), the map provider interface ([`provider`]) and the destinations of event
//! maps ([`sink`]).

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod progress;
pub mod provider;
pub mod sink;
pub mod tasks;
