//! # Workflows Module
//!
//! High-level entry points that run a complete analysis over a collection of datasets.
//!
//! ## Overview
//!
//! A workflow owns the ordering of the pipeline stages in [`crate::engine::tasks`], the
//! isolation of per-shell and per-dataset failures, and the final reduction of all events
//! into sites. It never reads or writes files: maps come from a
//! [`MapProvider`](crate::engine::provider::MapProvider) and results are returned as values.
//!
//! - **Analysis Workflow** ([`analyse`]) - shells, background models, Z-maps, events and sites.

pub mod analyse;
