//! Core types for monthly, raster-based rangeland biogeochemistry models.
//!
//! This crate holds everything that is independent of the Century equations:
//! rasters and nodata handling, the state-variable registry, immutable
//! monthly snapshots, parameter tables, driver discovery, run configuration
//! and the component graph that orders the work within a month.

pub mod component;
pub mod config;
pub mod drivers;
pub mod errors;
pub mod io;
pub mod model;
pub mod raster;
pub mod state;
pub mod tables;
pub mod variable;
