//! Decomposition of litter and soil organic matter.
//!
//! # Inputs
//!
//! - `tave`, `pet`, `snowmelt`, `avh2o_3` and `amov_<lyr>` from earlier in the month
//! - texture and pH effects derived once at the start of the run
//!
//! # State
//!
//! Surface and soil structural and metabolic litter, SOM1, SOM2, SOM3,
//! mineral N and P by layer, and the parent, secondary and occluded P pools.
//!
//! # Outputs
//!
//! - `defac`, `anerb` decomposition factors used this month
//! - `gromin_1` gross N mineralization (g / m^2)

use super::{gather, named_outputs, pool_names, site_parameters, Cursor, Sink, Source};
use crate::kernels::climate::{anerb, defac, rprpet, temperature_factor};
use crate::kernels::decomposition::{
    decompose_month, DecompositionDrivers, DecompositionSummary, SiteFactors, SoilOrganicPools,
};
use crate::names::{
    self, ANERB, ANNUAL_PRECIP, AVH2O_3, DEFAC, EFTEXT, FPS1S3, FPS2S3, GROMIN, ORGLCH, P1CO2_2,
    PET, PHEFF_METAB, PHEFF_STRUC, PRECIP, SITE_INDEX, SNOWMELT, TAVE, VLOSSG,
};
use log::debug;
use rangeland_core::component::{Component, OutputRasters, RequirementDefinition};
use rangeland_core::errors::RangelandResult;
use rangeland_core::raster::{compute_rasters, OutputSpec};
use rangeland_core::state::MonthInputs;
use rangeland_core::tables::{ParameterTable, SiteParameters};
use rangeland_core::variable::{variable_name, Element, MAX_SOIL_LAYERS};
use serde::{Deserialize, Serialize};

const FACTORS: [&str; 8] = [
    EFTEXT,
    P1CO2_2,
    FPS1S3,
    FPS2S3,
    ORGLCH,
    VLOSSG,
    PHEFF_STRUC,
    PHEFF_METAB,
];

/// Monthly decomposition with `iterations` sub-steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    sites: ParameterTable<SiteParameters>,
    n_layers: usize,
    iterations: usize,
}

impl Decomposition {
    pub fn from_parameters(
        sites: ParameterTable<SiteParameters>,
        n_layers: usize,
        iterations: usize,
    ) -> Self {
        Self {
            sites,
            n_layers: n_layers.clamp(1, MAX_SOIL_LAYERS),
            iterations: iterations.max(1),
        }
    }

    /// Names of the state variables, in the order they are read and written.
    fn state_names(&self) -> Vec<(String, &'static str)> {
        let mut state = Vec::new();
        for depth in [1, 2] {
            let [c, n, p] = pool_names("strucc", "struce", Some(depth));
            state.extend([(c, "g C / m^2"), (n, "g / m^2"), (p, "g / m^2")]);
            state.push((variable_name("strlig", Some(depth), None), "1"));
            let [c, n, p] = pool_names("metabc", "metabe", Some(depth));
            state.extend([(c, "g C / m^2"), (n, "g / m^2"), (p, "g / m^2")]);
            for (carbon, nutrient) in [("som1c", "som1e"), ("som2c", "som2e")] {
                let [c, n, p] = pool_names(carbon, nutrient, Some(depth));
                state.extend([(c, "g C / m^2"), (n, "g / m^2"), (p, "g / m^2")]);
            }
        }
        let [c, n, p] = pool_names("som3c", "som3e", None);
        state.extend([(c, "g C / m^2"), (n, "g / m^2"), (p, "g / m^2")]);
        for name in ["parent_2", "secndy_2", "occlud"] {
            state.push((name.to_string(), "g P / m^2"));
        }
        for lyr in 1..=self.n_layers {
            for element in Element::ALL {
                state.push((variable_name("minerl", Some(lyr), Some(element)), "g / m^2"));
            }
        }
        state
    }

    fn persistent_names() -> Vec<String> {
        let mut persistent: Vec<String> = FACTORS.iter().map(|f| f.to_string()).collect();
        persistent.extend(Element::ALL.map(names::fleach));
        for element in Element::ALL {
            for receiver in [1, 2] {
                persistent.push(names::rnewas(element, receiver));
            }
        }
        for element in Element::ALL {
            for receiver in [1, 2] {
                persistent.push(names::rnewbs(element, receiver));
            }
        }
        persistent
    }

    fn gathered(&self) -> Vec<(Source, String)> {
        let mut gathered = vec![
            (Source::Driver, PRECIP.to_string()),
            (Source::Driver, ANNUAL_PRECIP.to_string()),
            (Source::Input, TAVE.to_string()),
            (Source::Input, PET.to_string()),
            (Source::Input, SNOWMELT.to_string()),
            (Source::Input, AVH2O_3.to_string()),
            (Source::Persistent, SITE_INDEX.to_string()),
        ];
        gathered.extend(
            Self::persistent_names()
                .into_iter()
                .map(|name| (Source::Persistent, name)),
        );
        gathered.extend((1..=self.n_layers).map(|lyr| (Source::Input, names::amov(lyr))));
        gathered.extend(
            self.state_names()
                .into_iter()
                .map(|(name, _)| (Source::Latest, name)),
        );
        gathered
    }

    fn output_specs(&self) -> Vec<OutputSpec> {
        let mut specs: Vec<OutputSpec> = self
            .state_names()
            .into_iter()
            .map(|(name, _)| OutputSpec::pool(name))
            .collect();
        specs.push(OutputSpec::pool(DEFAC));
        specs.push(OutputSpec::pool(ANERB));
        specs.push(OutputSpec::pool(GROMIN));
        specs
    }

    /// Decomposition factor and anaerobic effect for the month.
    ///
    /// Without reference evapotranspiration moisture does not limit
    /// decomposition and conditions are never anaerobic.
    pub fn climate_factors(
        site: &SiteParameters,
        tave: f64,
        pet: f64,
        snowmelt: f64,
        avh2o_3: f64,
        precip: f64,
    ) -> (f64, f64) {
        match rprpet(pet, snowmelt, avh2o_3, precip) {
            Some(ratio) => (
                defac(tave, ratio, site.teff()),
                anerb(ratio, pet, site.drain, site.aneref()),
            ),
            None => (temperature_factor(tave, site.teff()), 1.0),
        }
    }

    fn solve_pixel(&self, values: &[f64], out: &mut [f64]) -> bool {
        let mut cursor = Cursor::new(values);
        let [precip, annual_precip, tave, pet, snowmelt, avh2o_3, code] = cursor.array();
        let Some(site) = site_parameters(&self.sites, code) else {
            return false;
        };

        let [eftext, p1co2_2, fps1s3, fps2s3, orglch, vlossg, pheff_struc, pheff_metab] =
            cursor.array();
        let fleach = cursor.array();
        let [as_n1, as_n2, as_p1, as_p2] = cursor.array();
        let [bs_n1, bs_n2, bs_p1, bs_p2] = cursor.array();
        let factors = SiteFactors {
            eftext,
            p1co2_2,
            fps1s3,
            fps2s3,
            orglch,
            vlossg,
            pheff_struc,
            pheff_metab,
            fleach,
            rnewas: [[as_n1, as_n2], [as_p1, as_p2]],
            rnewbs: [[bs_n1, bs_n2], [bs_p1, bs_p2]],
        };

        let mut amov = [0.0; MAX_SOIL_LAYERS];
        for slot in amov.iter_mut().take(self.n_layers) {
            *slot = cursor.next();
        }

        let mut pools = SoilOrganicPools::default();
        for depth in 0..2 {
            pools.litter.structural[depth] = cursor.pool();
            pools.litter.strlig[depth] = cursor.next();
            pools.litter.metabolic[depth] = cursor.pool();
            pools.som1[depth] = cursor.pool();
            pools.som2[depth] = cursor.pool();
        }
        pools.som3 = cursor.pool();
        [pools.parent_p, pools.secondary_p, pools.occluded_p] = cursor.array();
        for layer in pools.minerl.iter_mut().take(self.n_layers) {
            *layer = cursor.array();
        }

        let (defac, anerb) = Self::climate_factors(site, tave, pet, snowmelt, avh2o_3, precip);
        let drivers = DecompositionDrivers {
            defac,
            anerb,
            precip,
            annual_precip,
            amov,
            n_layers: site.n_layers().min(self.n_layers),
        };
        let summary = self.calculate(&mut pools, site, &factors, &drivers);

        let mut sink = Sink::new(out);
        for depth in 0..2 {
            sink.pool(&pools.litter.structural[depth]);
            sink.push(pools.litter.strlig[depth]);
            sink.pool(&pools.litter.metabolic[depth]);
            sink.pool(&pools.som1[depth]);
            sink.pool(&pools.som2[depth]);
        }
        sink.pool(&pools.som3);
        sink.extend([pools.parent_p, pools.secondary_p, pools.occluded_p]);
        for layer in pools.minerl.iter().take(self.n_layers) {
            sink.extend(*layer);
        }
        sink.extend([defac, anerb, summary.gromin]);
        true
    }

    /// Decompose one pixel's pools for the month.
    pub fn calculate(
        &self,
        pools: &mut SoilOrganicPools,
        site: &SiteParameters,
        factors: &SiteFactors,
        drivers: &DecompositionDrivers,
    ) -> DecompositionSummary {
        decompose_month(pools, site, factors, drivers, self.iterations)
    }
}

#[typetag::serde]
impl Component for Decomposition {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let mut definitions = vec![
            RequirementDefinition::driver(PRECIP, "cm"),
            RequirementDefinition::driver(ANNUAL_PRECIP, "cm"),
            RequirementDefinition::input(TAVE, "degC"),
            RequirementDefinition::input(PET, "cm"),
            RequirementDefinition::input(SNOWMELT, "cm"),
            RequirementDefinition::input(AVH2O_3, "cm"),
            RequirementDefinition::persistent(SITE_INDEX, "1"),
        ];
        definitions.extend(
            Self::persistent_names()
                .iter()
                .map(|name| RequirementDefinition::persistent(name, "1")),
        );
        definitions
            .extend((1..=self.n_layers).map(|lyr| RequirementDefinition::input(&names::amov(lyr), "cm")));
        definitions.extend(
            self.state_names()
                .iter()
                .map(|(name, unit)| RequirementDefinition::state(name, unit)),
        );
        definitions.push(RequirementDefinition::output(DEFAC, "1"));
        definitions.push(RequirementDefinition::output(ANERB, "1"));
        definitions.push(RequirementDefinition::output(GROMIN, "g N / m^2"));
        definitions
    }

    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        let shape = inputs.shape()?;
        debug!(
            "{}: decomposing with {} sub-step(s)",
            inputs.step.label(),
            self.iterations
        );
        let wanted = self.gathered();
        let rasters = gather(inputs, &wanted)?;
        let specs = self.output_specs();

        let computed = compute_rasters(shape, &specs, |idx, out| {
            let mut values = vec![0.0; wanted.len()];
            rasters.read(idx, &mut values) && self.solve_pixel(&values, out)
        });
        Ok(named_outputs(&specs, computed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component() -> Decomposition {
        Decomposition::from_parameters(
            ParameterTable::from_records("sites", [(1, SiteParameters::default())]),
            4,
            1,
        )
    }

    #[test]
    fn state_names_cover_every_site_pool() {
        let names: Vec<String> = component().state_names().into_iter().map(|(n, _)| n).collect();
        for expected in [
            "strucc_1", "struce_2_2", "strlig_2", "metabe_1_1", "som1c_2", "som2e_1_2", "som3e_2",
            "occlud", "minerl_4_2",
        ] {
            assert!(names.contains(&expected.to_string()), "{expected}");
        }
        assert_eq!(names.len(), 2 * 13 + 3 + 3 + 4 * 2);
    }

    #[test]
    fn zero_pet_means_no_moisture_limit() {
        let site = SiteParameters::default();
        let (defac, anerb) = Decomposition::climate_factors(&site, 10.0, 0.0, 0.0, 1.0, 1.0);
        assert_eq!(defac, temperature_factor(10.0, site.teff()));
        assert_eq!(anerb, 1.0);
    }

    #[test]
    fn pixel_round_trips_pools_in_order() {
        let component = component();
        let wanted = component.gathered();
        let specs = component.output_specs();
        let mut values = vec![0.0; wanted.len()];
        // precip, annual precip, tave, pet, snowmelt, avh2o_3, site
        values[..7].copy_from_slice(&[4.0, 40.0, 15.0, 6.0, 0.0, 2.0, 1.0]);
        // every pool starts with the same content
        let first_state = wanted.len() - component.state_names().len();
        for value in values.iter_mut().skip(first_state) {
            *value = 10.0;
        }
        // strlig
        values[first_state + 3] = 0.2;
        values[first_state + 16] = 0.2;

        let mut out = vec![0.0; specs.len()];
        assert!(component.solve_pixel(&values, &mut out));
        assert!(out.iter().all(|v| v.is_finite() && *v >= 0.0));
        let defac_index = specs.iter().position(|s| s.name == DEFAC).unwrap();
        assert!(out[defac_index] > 0.0);
    }
}
