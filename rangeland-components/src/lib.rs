//! Century rangeland components
//!
//! This crate provides the point kernels of the Century soil and plant
//! model and the monthly raster components built from them.
//!
//! # Module Organisation
//!
//! - `kernels`: scalar equations evaluated at a single pixel
//! - `components`: `Climate`, `SoilWater`, `Decomposition` and `Production`,
//!   run once per month by the component graph
//! - `persistent`: parameters derived once from soil rasters and the initial state
//! - `names`: raster names shared between components

pub mod components;
pub mod kernels;
pub mod names;
pub mod persistent;
