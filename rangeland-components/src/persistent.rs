//! Time-invariant parameters derived once at the start of a run.
//!
//! Soil water limits, texture and pH effects and the C:E ratios required for
//! structural material are functions of soil rasters, the site table and the
//! initial organic matter pools. None of them change during the run, so they
//! are computed in one parallel pass and then read by every month.

use crate::components::site_parameters;
use crate::kernels::ratios::{agdrat, rnewas_som2};
use crate::kernels::soil::{
    eftext, fleach, fraction_to_som3, layer_water_limits, ompc, orglch, p1co2_2, pheff_metab,
    pheff_struc, vlossg,
};
use crate::names::{
    self, BULK_DENSITY, CLAY, EFTEXT, FPS1S3, FPS2S3, ORGLCH, P1CO2_2, PH, PHEFF_METAB,
    PHEFF_STRUC, SAND, SILT, SITE_INDEX, VLOSSG, WC,
};
use log::info;
use rangeland_core::errors::{RangelandError, RangelandResult};
use rangeland_core::raster::{compute_rasters, OutputSpec, RasterGather};
use rangeland_core::state::StateSnapshot;
use rangeland_core::tables::{ParameterTable, SiteParameters};
use rangeland_core::variable::{variable_name, Element, MAX_SOIL_LAYERS};

/// Soil rasters read by the calculator, all from the site snapshot.
const SOIL: [&str; 6] = [BULK_DENSITY, PH, SAND, SILT, CLAY, SITE_INDEX];

/// Initial pools read by the calculator.
fn initial_pools() -> [String; 6] {
    [
        variable_name("som1c", Some(2), None),
        variable_name("som2c", Some(2), None),
        variable_name("som3c", None, None),
        variable_name("strucc", Some(1), None),
        variable_name("struce", Some(1), Some(Element::Nitrogen)),
        variable_name("struce", Some(1), Some(Element::Phosphorus)),
    ]
}

/// Names of every derived raster, in the order they are computed.
pub fn persistent_names() -> Vec<String> {
    let mut out: Vec<String> = (1..=MAX_SOIL_LAYERS).map(names::afiel).collect();
    out.extend((1..=MAX_SOIL_LAYERS).map(names::awilt));
    out.extend(
        [WC, EFTEXT, P1CO2_2, FPS1S3, FPS2S3, ORGLCH, VLOSSG, PHEFF_STRUC, PHEFF_METAB]
            .map(String::from),
    );
    out.extend(Element::ALL.map(names::fleach));
    for element in Element::ALL {
        out.push(names::rnewas(element, 1));
        out.push(names::rnewas(element, 2));
    }
    for element in Element::ALL {
        out.push(names::rnewbs(element, 1));
        out.push(names::rnewbs(element, 2));
    }
    out
}

/// Derives the persistent parameters of a run.
pub struct PersistentParameters<'a> {
    sites: &'a ParameterTable<SiteParameters>,
}

impl<'a> PersistentParameters<'a> {
    pub fn new(sites: &'a ParameterTable<SiteParameters>) -> Self {
        Self { sites }
    }

    /// Values at one pixel, in [`persistent_names`] order.
    ///
    /// `None` when the site code has no row, or when texture, bulk density
    /// or organic layer depth leave the soil water limits undefined.
    pub fn calculate(&self, soil: [f64; 6], pools: [f64; 6]) -> Option<Vec<f64>> {
        let [bulkd, ph, sand, silt, clay, code] = soil;
        let [som1c_2, som2c_2, som3c, strucc_1, struce_1_n, struce_1_p] = pools;
        let site = site_parameters(self.sites, code)?;

        let om = ompc(som1c_2, som2c_2, som3c, bulkd, site.edepth)?;
        let (fc, wp) = layer_water_limits(sand, silt, clay, om, bulkd)?;

        let mut values = Vec::with_capacity(MAX_SOIL_LAYERS * 2 + 19);
        values.extend(fc);
        values.extend(wp);
        values.extend([
            fc[0] - wp[0],
            eftext(site.peftxa, site.peftxb, sand),
            p1co2_2(site.p1co2a_2, site.p1co2b_2, sand),
            fraction_to_som3(site.ps1s3_1, site.ps1s3_2, clay),
            fraction_to_som3(site.ps2s3_1, site.ps2s3_2, clay),
            orglch(site.omlech_1, site.omlech_2, sand),
            vlossg(clay, site.vlossg),
            pheff_struc(ph),
            pheff_metab(ph),
        ]);
        values.extend(fleach(
            [site.fleach_1, site.fleach_2, site.fleach_3, site.fleach_4],
            sand,
        ));
        for (element, content) in Element::ALL.into_iter().zip([struce_1_n, struce_1_p]) {
            let pcemic = site.pcemic1(element);
            let to_som1 = agdrat(content, strucc_1, pcemic);
            values.push(to_som1);
            values.push(rnewas_som2(to_som1, site.rad1p(element), pcemic[1]));
        }
        for element in Element::ALL {
            values.push(site.varat1(element)[0]);
            values.push(site.varat22(element)[0]);
        }
        Some(values)
    }

    /// Derive every persistent raster.
    ///
    /// `soil` holds the soil rasters and site index, `initial` the initial
    /// state. Pixels where any input is nodata are nodata in every output.
    pub fn derive(&self, soil: &StateSnapshot, initial: &StateSnapshot) -> RangelandResult<StateSnapshot> {
        let shape = soil
            .shape()
            .ok_or_else(|| RangelandError::Error("no soil rasters supplied".to_string()))?;
        let pools = initial_pools();
        let mut rasters = Vec::with_capacity(SOIL.len() + pools.len());
        for name in SOIL {
            let raster = soil.get(name)?;
            raster.check_shape(name, shape)?;
            rasters.push(raster);
        }
        for name in &pools {
            let raster = initial.get(name)?;
            raster.check_shape(name, shape)?;
            rasters.push(raster);
        }
        let rasters = RasterGather::new(rasters);

        let names = persistent_names();
        let specs: Vec<OutputSpec> = names
            .iter()
            .map(|name| OutputSpec::pool(name.as_str()))
            .collect();
        let computed = compute_rasters(shape, &specs, |idx, out| {
            let mut values = [0.0; 12];
            if !rasters.read(idx, &mut values) {
                return false;
            }
            let mut soil = [0.0; 6];
            let mut pools = [0.0; 6];
            soil.copy_from_slice(&values[..6]);
            pools.copy_from_slice(&values[6..]);
            match self.calculate(soil, pools) {
                Some(derived) => {
                    out.copy_from_slice(&derived);
                    true
                }
                None => false,
            }
        });

        let derived: StateSnapshot = names.into_iter().zip(computed).collect();
        let valid = derived.get(WC).map(|r| r.valid_count()).unwrap_or(0);
        info!(
            "derived {} persistent parameters, {valid} of {} pixels valid",
            derived.len(),
            shape.0 * shape.1
        );
        Ok(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SOIL_VALUES: [f64; 6] = [1.5, 6.5, 0.39, 0.41, 0.2, 1.0];
    const POOLS: [f64; 6] = [42.109, 959.1091, 588.0574, 120.0, 0.6, 0.12];

    fn sites() -> ParameterTable<SiteParameters> {
        ParameterTable::from_records(
            "sites",
            [(
                1,
                SiteParameters {
                    edepth: 0.2,
                    ..Default::default()
                },
            )],
        )
    }

    #[test]
    fn field_capacity_of_first_layer() {
        let sites = sites();
        let values = PersistentParameters::new(&sites)
            .calculate(SOIL_VALUES, POOLS)
            .unwrap();
        assert_eq!(values.len(), persistent_names().len());
        assert_abs_diff_eq!(values[0], 0.30895, epsilon = 0.0001);
        assert_abs_diff_eq!(values[MAX_SOIL_LAYERS], 0.201988, epsilon = 0.0001);
        let wc = persistent_names().iter().position(|n| n == WC).unwrap();
        assert_abs_diff_eq!(values[wc], values[0] - values[MAX_SOIL_LAYERS], epsilon = 1e-12);
    }

    #[test]
    fn unknown_site_or_bad_soil_is_undefined() {
        let sites = sites();
        let calculator = PersistentParameters::new(&sites);
        let mut soil = SOIL_VALUES;
        soil[5] = 3.0;
        assert!(calculator.calculate(soil, POOLS).is_none());
        let mut soil = SOIL_VALUES;
        soil[0] = 0.0;
        assert!(calculator.calculate(soil, POOLS).is_none());
    }

    #[test]
    fn required_ratios_follow_site_table() {
        let sites = sites();
        let site = sites.get(1).unwrap();
        let values = PersistentParameters::new(&sites)
            .calculate(SOIL_VALUES, POOLS)
            .unwrap();
        let at = |name: String| values[persistent_names().iter().position(|n| *n == name).unwrap()];
        assert_eq!(at(names::rnewbs(Element::Nitrogen, 1)), site.varat1(Element::Nitrogen)[0]);
        assert_eq!(at(names::rnewbs(Element::Phosphorus, 2)), site.varat22(Element::Phosphorus)[0]);
        let to_som1 = agdrat(0.6, 120.0, site.pcemic1(Element::Nitrogen));
        assert_eq!(at(names::rnewas(Element::Nitrogen, 1)), to_som1);
    }
}
