//! Point kernels: the Century equations for a single pixel.
//!
//! Every function here works on plain `f64` values. Undefined results are
//! returned as `None` (or a documented fallback) and turned into nodata by
//! the raster components that call them.

pub mod climate;
pub mod decomposition;
pub mod flows;
pub mod plant;
pub mod production;
pub mod ratios;
pub mod soil;
pub mod water;
