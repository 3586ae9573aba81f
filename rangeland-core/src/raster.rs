//! Single-band rasters and the per-pixel evaluation machinery.
//!
//! Every raster carries its own nodata value. Pixel kernels are evaluated
//! independently for each cell, in parallel, and any pixel that reads nodata
//! writes nodata to every output derived from it.
//!
//! Two output sentinels are used:
//! - [`TARGET_NODATA`] for quantities that can never be negative (pools, water, radiation)
//! - [`IC_NODATA`] for signed quantities such as temperatures

use crate::errors::{RangelandError, RangelandResult};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Nodata value for non-negative outputs.
pub const TARGET_NODATA: f32 = -1.0;
/// Nodata value for signed outputs and initial conditions.
pub const IC_NODATA: f32 = f32::MIN;

/// Test whether `value` should be treated as nodata.
///
/// Uses the same tolerance as `numpy.isclose` so that sentinels survive a
/// round trip through single precision. NaN is always nodata.
pub fn is_nodata(value: f32, nodata: f32) -> bool {
    if value.is_nan() {
        return true;
    }
    if nodata.is_nan() {
        return false;
    }
    let (a, b) = (value as f64, nodata as f64);
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Georeferencing for a raster grid.
///
/// `pixel_size.1` is negative for north-up grids, as in a GDAL geotransform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInfo {
    /// (x, y) size of a pixel in projection units (degrees for geographic grids)
    pub pixel_size: (f64, f64),
    /// (x, y) coordinate of the upper-left corner
    pub origin: (f64, f64),
    /// (rows, cols)
    pub shape: (usize, usize),
    pub nodata: f32,
}

impl RasterInfo {
    /// Y coordinate of the centre of `row`.
    pub fn row_center(&self, row: usize) -> f64 {
        self.origin.1 + (row as f64 + 0.5) * self.pixel_size.1
    }

    /// Bounding box as `[min_x, min_y, max_x, max_y]`.
    pub fn bounding_box(&self) -> [f64; 4] {
        let x0 = self.origin.0;
        let x1 = x0 + self.shape.1 as f64 * self.pixel_size.0;
        let y0 = self.origin.1;
        let y1 = y0 + self.shape.0 as f64 * self.pixel_size.1;
        [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]
    }

    /// A raster holding the latitude of each pixel centre, in degrees.
    ///
    /// Assumes a geographic coordinate system.
    pub fn latitude_raster(&self) -> Raster {
        let (rows, cols) = self.shape;
        let data = Array2::from_shape_fn((rows, cols), |(r, _)| self.row_center(r) as f32);
        Raster::new(data, IC_NODATA)
    }
}

/// A single band of float32 values with a declared nodata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    data: Array2<f32>,
    nodata: f32,
}

impl Raster {
    pub fn new(data: Array2<f32>, nodata: f32) -> Self {
        Self { data, nodata }
    }

    /// Build a raster from row-major values.
    pub fn from_vec(shape: (usize, usize), values: Vec<f32>, nodata: f32) -> RangelandResult<Self> {
        let found = values.len();
        let data = Array2::from_shape_vec(shape, values).map_err(|_| {
            RangelandError::Error(format!(
                "{} values cannot fill a raster of shape {:?}",
                found, shape
            ))
        })?;
        Ok(Self::new(data, nodata))
    }

    /// A raster with every pixel set to `value`.
    pub fn filled(shape: (usize, usize), value: f32, nodata: f32) -> Self {
        Self::new(Array2::from_elem(shape, value), nodata)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// Raw value at a row-major pixel index.
    pub fn raw(&self, idx: usize) -> f32 {
        let cols = self.data.ncols();
        self.data[[idx / cols, idx % cols]]
    }

    /// Value at a row-major pixel index, or `None` if the pixel is nodata.
    pub fn value(&self, idx: usize) -> Option<f64> {
        let v = self.raw(idx);
        if is_nodata(v, self.nodata) {
            None
        } else {
            Some(v as f64)
        }
    }

    /// Number of pixels holding valid data.
    pub fn valid_count(&self) -> usize {
        self.data
            .iter()
            .filter(|v| !is_nodata(**v, self.nodata))
            .count()
    }

    /// Returns an error if the raster does not have the `expected` shape.
    pub fn check_shape(&self, name: &str, expected: (usize, usize)) -> RangelandResult<()> {
        if self.shape() != expected {
            return Err(RangelandError::ShapeMismatch {
                name: name.to_string(),
                expected,
                found: self.shape(),
            });
        }
        Ok(())
    }

    /// Pixel-wise sum of several rasters.
    ///
    /// A pixel is nodata in the result if it is nodata in any of the inputs.
    pub fn sum(rasters: &[&Raster], nodata: f32) -> RangelandResult<Raster> {
        let first = rasters
            .first()
            .ok_or_else(|| RangelandError::Error("Cannot sum an empty set of rasters".into()))?;
        let shape = first.shape();
        for r in rasters {
            r.check_shape("summand", shape)?;
        }
        let out = compute_rasters(shape, &[OutputSpec::new("sum", nodata)], |idx, out| {
            let mut total = 0.0;
            for raster in rasters {
                match raster.value(idx) {
                    Some(v) => total += v,
                    None => return false,
                }
            }
            out[0] = total;
            true
        });
        out.into_iter()
            .next()
            .ok_or_else(|| RangelandError::Error("Sum produced no output".into()))
    }
}

/// Name and nodata sentinel of one kernel output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub name: String,
    pub nodata: f32,
}

impl OutputSpec {
    pub fn new(name: impl Into<String>, nodata: f32) -> Self {
        Self {
            name: name.into(),
            nodata,
        }
    }

    /// An output that can never be negative.
    pub fn pool(name: impl Into<String>) -> Self {
        Self::new(name, TARGET_NODATA)
    }

    /// An output that may legitimately be negative.
    pub fn signed(name: impl Into<String>) -> Self {
        Self::new(name, IC_NODATA)
    }
}

/// Evaluate a pixel kernel over a grid, in parallel across pixels.
///
/// `kernel` receives the row-major pixel index and a scratch slice with one
/// slot per entry in `outputs`. It returns `false` to mark the pixel as
/// nodata in every output. Non-finite values written by the kernel are
/// replaced with the nodata value of that output.
pub fn compute_rasters<F>(shape: (usize, usize), outputs: &[OutputSpec], kernel: F) -> Vec<Raster>
where
    F: Fn(usize, &mut [f64]) -> bool + Sync + Send,
{
    let n_out = outputs.len();
    if n_out == 0 {
        return vec![];
    }
    let n_pixels = shape.0 * shape.1;
    let mut buffer = vec![0.0_f64; n_pixels * n_out];

    buffer
        .par_chunks_mut(n_out)
        .enumerate()
        .for_each(|(idx, slot)| {
            if !kernel(idx, slot) {
                for (value, spec) in slot.iter_mut().zip(outputs) {
                    *value = spec.nodata as f64;
                }
            }
        });

    outputs
        .iter()
        .enumerate()
        .map(|(k, spec)| {
            let values: Vec<f32> = buffer
                .iter()
                .skip(k)
                .step_by(n_out)
                .map(|v| if v.is_finite() { *v as f32 } else { spec.nodata })
                .collect();
            let data = Array2::from_shape_vec(shape, values)
                .unwrap_or_else(|_| Array2::from_elem(shape, spec.nodata));
            Raster::new(data, spec.nodata)
        })
        .collect()
}

/// An ordered set of rasters read together at each pixel.
#[derive(Debug, Clone)]
pub struct RasterGather<'a> {
    rasters: Vec<&'a Raster>,
}

impl<'a> RasterGather<'a> {
    pub fn new(rasters: Vec<&'a Raster>) -> Self {
        Self { rasters }
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// Fill `out` with the values at `idx`, in gather order.
    ///
    /// Returns `false` as soon as any raster is nodata at the pixel.
    pub fn read(&self, idx: usize, out: &mut [f64]) -> bool {
        for (slot, raster) in out.iter_mut().zip(&self.rasters) {
            match raster.value(idx) {
                Some(v) => *slot = v,
                None => return false,
            }
        }
        true
    }
}
