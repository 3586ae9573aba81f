//! Monthly components.
//!
//! Each component gathers its rasters in a fixed order, runs a point kernel
//! at every pixel in parallel and writes one raster per output. A pixel that
//! reads nodata, or whose site code has no parameter row, is nodata in every
//! output of that component.

mod climate;
mod decomposition;
mod production;
mod soil_water;

pub use climate::Climate;
pub use decomposition::Decomposition;
pub use production::Production;
pub use soil_water::SoilWater;

use crate::kernels::flows::Pool;
use rangeland_core::component::OutputRasters;
use rangeland_core::errors::RangelandResult;
use rangeland_core::raster::{OutputSpec, Raster, RasterGather};
use rangeland_core::state::MonthInputs;
use rangeland_core::tables::{ParameterTable, SiteParameters};
use rangeland_core::variable::{variable_name, Element};

/// Where a gathered raster comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Driver,
    Persistent,
    Previous,
    Input,
    /// Latest version of a state variable
    Latest,
}

/// Resolve `names` against `inputs` and gather them for per-pixel reads.
pub(crate) fn gather<'a>(
    inputs: &MonthInputs<'a>,
    names: &[(Source, String)],
) -> RangelandResult<RasterGather<'a>> {
    let rasters = names
        .iter()
        .map(|(source, name)| match source {
            Source::Driver => inputs.driver(name),
            Source::Persistent => inputs.persistent(name),
            Source::Previous => inputs.previous(name),
            Source::Input => inputs.input(name),
            Source::Latest => inputs.latest(name),
        })
        .collect::<RangelandResult<Vec<&Raster>>>()?;
    Ok(RasterGather::new(rasters))
}

/// Pair computed rasters with the names they were computed for.
pub(crate) fn named_outputs(specs: &[OutputSpec], rasters: Vec<Raster>) -> OutputRasters {
    specs
        .iter()
        .map(|spec| spec.name.clone())
        .zip(rasters)
        .collect()
}

/// Site parameters for a site code read from a raster.
///
/// `None` for negative or non-integral codes and for codes with no row.
pub(crate) fn site_parameters(
    sites: &ParameterTable<SiteParameters>,
    code: f64,
) -> Option<&SiteParameters> {
    if !code.is_finite() || code < 0.0 || (code - code.round()).abs() > 1e-6 {
        return None;
    }
    sites.get(code.round() as u32)
}

/// Names of a carbon pool and its two nutrients, in `Pool` order.
pub(crate) fn pool_names(carbon: &str, nutrient: &str, depth: Option<usize>) -> [String; 3] {
    [
        variable_name(carbon, depth, None),
        variable_name(nutrient, depth, Some(Element::Nitrogen)),
        variable_name(nutrient, depth, Some(Element::Phosphorus)),
    ]
}

/// Sequential reader over one pixel's gathered values.
pub(crate) struct Cursor<'a> {
    values: &'a [f64],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(values: &'a [f64]) -> Self {
        Self {
            values,
            position: 0,
        }
    }

    pub(crate) fn next(&mut self) -> f64 {
        let value = self.values.get(self.position).copied().unwrap_or(f64::NAN);
        self.position += 1;
        value
    }

    pub(crate) fn array<const N: usize>(&mut self) -> [f64; N] {
        std::array::from_fn(|_| self.next())
    }

    pub(crate) fn pool(&mut self) -> Pool {
        let [c, n, p] = self.array();
        Pool::new(c, n, p)
    }
}

/// Sequential writer into one pixel's output slots.
pub(crate) struct Sink<'a> {
    slots: &'a mut [f64],
    position: usize,
}

impl<'a> Sink<'a> {
    pub(crate) fn new(slots: &'a mut [f64]) -> Self {
        Self { slots, position: 0 }
    }

    pub(crate) fn push(&mut self, value: f64) {
        if let Some(slot) = self.slots.get_mut(self.position) {
            *slot = value;
        }
        self.position += 1;
    }

    pub(crate) fn extend(&mut self, values: impl IntoIterator<Item = f64>) {
        for value in values {
            self.push(value);
        }
    }

    pub(crate) fn pool(&mut self, pool: &Pool) {
        self.extend([pool.c, pool.e[0], pool.e[1]]);
    }
}
