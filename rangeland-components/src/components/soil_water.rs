//! Soil water balance.
//!
//! Runs the snow, surface loss, layer cascade, transpiration and
//! evaporation stages for every pixel and reports the water available to
//! each plant functional type.

use super::{gather, named_outputs, site_parameters, Cursor, Sink, Source};
use crate::kernels::ratios::BIOMASS_PER_CARBON;
use crate::kernels::water::{
    available_water, soil_water_month, SoilWaterOutcome, SoilWaterPixel, SurfaceCover,
    WaterParameters,
};
use crate::names::{self, AVH2O_2, AVH2O_3, PET, PRECIP, SHWAVE, SITE_INDEX, SNOWMELT, TAVE};
use rangeland_core::component::{Component, OutputRasters, RequirementDefinition};
use rangeland_core::errors::RangelandResult;
use rangeland_core::raster::{compute_rasters, OutputSpec};
use rangeland_core::state::MonthInputs;
use rangeland_core::tables::{ParameterTable, PftParameters, SiteParameters};
use rangeland_core::variable::{pft_variable, variable_name, MAX_SOIL_LAYERS};
use serde::{Deserialize, Serialize};

/// Monthly soil water balance over `n_layers` soil layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilWater {
    sites: ParameterTable<SiteParameters>,
    pfts: ParameterTable<PftParameters>,
    n_layers: usize,
}

impl SoilWater {
    pub fn from_parameters(
        sites: ParameterTable<SiteParameters>,
        pfts: ParameterTable<PftParameters>,
        n_layers: usize,
    ) -> Self {
        Self {
            sites,
            pfts,
            n_layers: n_layers.clamp(1, MAX_SOIL_LAYERS),
        }
    }

    fn layers(&self) -> impl Iterator<Item = usize> {
        1..=self.n_layers
    }

    fn gathered(&self) -> Vec<(Source, String)> {
        let mut gathered = vec![
            (Source::Driver, PRECIP.to_string()),
            (Source::Input, TAVE.to_string()),
            (Source::Input, PET.to_string()),
            (Source::Input, SHWAVE.to_string()),
            (Source::Persistent, SITE_INDEX.to_string()),
            (Source::Latest, "snow".to_string()),
            (Source::Latest, "snlq".to_string()),
            (Source::Previous, "strucc_1".to_string()),
            (Source::Previous, "metabc_1".to_string()),
        ];
        for lyr in self.layers() {
            gathered.push((Source::Latest, variable_name("asmos", Some(lyr), None)));
            gathered.push((Source::Persistent, names::afiel(lyr)));
            gathered.push((Source::Persistent, names::awilt(lyr)));
        }
        for pft in self.pfts.keys() {
            gathered.push((Source::Persistent, names::pft_cover(pft)));
            gathered.push((Source::Previous, pft_variable("aglivc", pft)));
            gathered.push((Source::Previous, pft_variable("stdedc", pft)));
        }
        gathered
    }

    fn output_specs(&self) -> Vec<OutputSpec> {
        let mut specs: Vec<OutputSpec> = self
            .layers()
            .map(|lyr| OutputSpec::pool(variable_name("asmos", Some(lyr), None)))
            .collect();
        specs.push(OutputSpec::pool("snow"));
        specs.push(OutputSpec::pool("snlq"));
        specs.extend(self.pfts.keys().into_iter().map(|pft| OutputSpec::pool(names::avh2o_1(pft))));
        specs.extend(self.layers().map(|lyr| OutputSpec::pool(names::amov(lyr))));
        specs.push(OutputSpec::pool(SNOWMELT));
        specs.push(OutputSpec::pool(AVH2O_2));
        specs.push(OutputSpec::pool(AVH2O_3));
        specs
    }

    /// Solve one pixel from its gathered values, writing outputs in
    /// `output_specs` order. Returns `false` for an unknown site code.
    fn solve_pixel(&self, values: &[f64], out: &mut [f64]) -> bool {
        let mut cursor = Cursor::new(values);
        let [precip, tave, pet, shwave, code] = cursor.array();
        let Some(site) = site_parameters(&self.sites, code) else {
            return false;
        };
        let [snow, snlq, strucc_1, metabc_1] = cursor.array();

        let adep = site.adep();
        let mut asmos = [0.0; MAX_SOIL_LAYERS];
        let mut field_capacity = [0.0; MAX_SOIL_LAYERS];
        let mut wilting_point = [0.0; MAX_SOIL_LAYERS];
        for lyr in 0..self.n_layers {
            let [moisture, afiel, awilt] = cursor.array();
            asmos[lyr] = moisture;
            field_capacity[lyr] = afiel * adep[lyr];
            wilting_point[lyr] = awilt * adep[lyr];
        }

        let pfts: Vec<(u32, [f64; 3])> = self
            .pfts
            .keys()
            .into_iter()
            .map(|pft| (pft, cursor.array()))
            .collect();
        let live: f64 = pfts.iter().map(|(_, [_, aglivc, _])| aglivc).sum();
        let dead: f64 = pfts.iter().map(|(_, [_, _, stdedc])| stdedc).sum();

        let pixel = SoilWaterPixel {
            precip,
            tave,
            pet,
            shwave,
            snow,
            snlq,
            asmos,
            field_capacity,
            wilting_point,
            awtl: site.awtl(),
            n_layers: site.n_layers().min(self.n_layers),
            cover: SurfaceCover {
                litter: (strucc_1 + metabc_1) * BIOMASS_PER_CARBON,
                standing: (live + dead) * BIOMASS_PER_CARBON,
            },
            live_biomass: live * BIOMASS_PER_CARBON,
        };
        let outcome = self.calculate(&pixel, site);

        let mut sink = Sink::new(out);
        sink.extend(outcome.asmos.iter().take(self.n_layers).copied());
        sink.push(outcome.snow);
        sink.push(outcome.snlq);
        for (pft, [cover, _, _]) in &pfts {
            let nlaypg = self
                .pfts
                .get(*pft)
                .map(|p| p.nlaypg())
                .unwrap_or(pixel.n_layers)
                .min(pixel.n_layers);
            sink.push(available_water(&outcome.asmos, &wilting_point, nlaypg) * cover);
        }
        sink.extend(outcome.amov.iter().take(self.n_layers).copied());
        sink.push(outcome.snowmelt);
        sink.push(outcome.avh2o_2);
        sink.push(outcome.avh2o_3);
        true
    }

    /// Water balance of one pixel.
    pub fn calculate(&self, pixel: &SoilWaterPixel, site: &SiteParameters) -> SoilWaterOutcome {
        let params = WaterParameters {
            tmelt: [site.tmelt_1, site.tmelt_2],
            fracro: site.fracro,
            precro: site.precro,
            fwloss: [site.fwloss_1, site.fwloss_2],
        };
        soil_water_month(pixel, &params)
    }
}

#[typetag::serde]
impl Component for SoilWater {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let mut definitions = vec![
            RequirementDefinition::driver(PRECIP, "cm"),
            RequirementDefinition::input(TAVE, "degC"),
            RequirementDefinition::input(PET, "cm"),
            RequirementDefinition::input(SHWAVE, "langley / day"),
            RequirementDefinition::persistent(SITE_INDEX, "1"),
            RequirementDefinition::previous("strucc_1", "g C / m^2"),
            RequirementDefinition::previous("metabc_1", "g C / m^2"),
            RequirementDefinition::state("snow", "cm"),
            RequirementDefinition::state("snlq", "cm"),
        ];
        for lyr in self.layers() {
            definitions.push(RequirementDefinition::persistent(&names::afiel(lyr), "1"));
            definitions.push(RequirementDefinition::persistent(&names::awilt(lyr), "1"));
            definitions.push(RequirementDefinition::state(
                &variable_name("asmos", Some(lyr), None),
                "cm",
            ));
            definitions.push(RequirementDefinition::output(&names::amov(lyr), "cm"));
        }
        for pft in self.pfts.keys() {
            definitions.push(RequirementDefinition::persistent(&names::pft_cover(pft), "1"));
            definitions.push(RequirementDefinition::previous(
                &pft_variable("aglivc", pft),
                "g C / m^2",
            ));
            definitions.push(RequirementDefinition::previous(
                &pft_variable("stdedc", pft),
                "g C / m^2",
            ));
            definitions.push(RequirementDefinition::state(&names::avh2o_1(pft), "cm"));
        }
        definitions.push(RequirementDefinition::output(SNOWMELT, "cm"));
        definitions.push(RequirementDefinition::output(AVH2O_2, "cm"));
        definitions.push(RequirementDefinition::output(AVH2O_3, "cm"));
        definitions
    }

    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        let shape = inputs.shape()?;
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
