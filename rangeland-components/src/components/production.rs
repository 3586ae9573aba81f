//! Plant production and grazing for every plant functional type.
//!
//! PFTs are grown one after another at each pixel, in ascending PFT id.
//! They share the pixel's mineral nutrient layers and litter pools, so a PFT
//! grown later sees the nutrients left by those grown before it.

use super::{gather, named_outputs, pool_names, site_parameters, Cursor, Sink, Source};
use crate::kernels::plant::{fraction_removed, grow, GrowthEnvironment, LitterPools, PlantPools};
use crate::kernels::ratios::BIOMASS_PER_CARBON;
use crate::names::{
    self, ANIMAL_DENSITY, ANNUAL_PRECIP, AVH2O_2, FLGREM, MAX_TEMP, MIN_TEMP, PET, PRECIP,
    SHWAVE, SITE_INDEX, WC,
};
use rangeland_core::component::{Component, OutputRasters, RequirementDefinition};
use rangeland_core::errors::RangelandResult;
use rangeland_core::raster::{compute_rasters, OutputSpec};
use rangeland_core::state::MonthInputs;
use rangeland_core::tables::{AnimalParameters, ParameterTable, PftParameters, SiteParameters};
use rangeland_core::variable::{pft_variable, variable_name, Element, MAX_SOIL_LAYERS};
use serde::{Deserialize, Serialize};

/// Production, nutrient uptake, senescence and grazing offtake.
///
/// Without an animal the fraction removed by grazing is zero everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Production {
    sites: ParameterTable<SiteParameters>,
    pfts: ParameterTable<PftParameters>,
    animal: Option<AnimalParameters>,
    n_layers: usize,
}

impl Production {
    pub fn from_parameters(
        sites: ParameterTable<SiteParameters>,
        pfts: ParameterTable<PftParameters>,
        animal: Option<AnimalParameters>,
        n_layers: usize,
    ) -> Self {
        Self {
            sites,
            pfts,
            animal,
            n_layers: n_layers.clamp(1, MAX_SOIL_LAYERS),
        }
    }

    fn litter_names() -> Vec<(String, &'static str)> {
        let mut litter = Vec::new();
        for depth in [1, 2] {
            let [c, n, p] = pool_names("strucc", "struce", Some(depth));
            litter.extend([(c, "g C / m^2"), (n, "g / m^2"), (p, "g / m^2")]);
            litter.push((variable_name("strlig", Some(depth), None), "1"));
            let [c, n, p] = pool_names("metabc", "metabe", Some(depth));
            litter.extend([(c, "g C / m^2"), (n, "g / m^2"), (p, "g / m^2")]);
        }
        litter
    }

    fn mineral_names(&self) -> Vec<String> {
        (1..=self.n_layers)
            .flat_map(|lyr| Element::ALL.map(|e| variable_name("minerl", Some(lyr), Some(e))))
            .collect()
    }

    /// Live and standing dead pool names for one PFT, in `PlantPools` order.
    fn plant_names(pft: u32) -> Vec<(String, &'static str)> {
        [("aglivc", "aglive"), ("bglivc", "bglive"), ("stdedc", "stdede")]
            .into_iter()
            .flat_map(|(carbon, nutrient)| {
                let [c, n, p] = pool_names(carbon, nutrient, None);
                [(c, "g C / m^2"), (n, "g / m^2"), (p, "g / m^2")]
            })
            .map(|(name, unit)| (pft_variable(&name, pft), unit))
            .collect()
    }

    fn gathered(&self) -> Vec<(Source, String)> {
        let mut gathered = vec![
            (Source::Driver, PRECIP.to_string()),
            (Source::Driver, ANNUAL_PRECIP.to_string()),
            (Source::Driver, MIN_TEMP.to_string()),
            (Source::Driver, MAX_TEMP.to_string()),
            (Source::Input, PET.to_string()),
            (Source::Input, SHWAVE.to_string()),
            (Source::Input, AVH2O_2.to_string()),
            (Source::Persistent, SITE_INDEX.to_string()),
            (Source::Persistent, WC.to_string()),
        ];
        if self.animal.is_some() {
            gathered.push((Source::Persistent, ANIMAL_DENSITY.to_string()));
        }
        gathered.extend(Self::litter_names().into_iter().map(|(n, _)| (Source::Latest, n)));
        gathered.extend(self.mineral_names().into_iter().map(|n| (Source::Latest, n)));
        for pft in self.pfts.keys() {
            gathered.push((Source::Persistent, names::pft_cover(pft)));
            gathered.push((Source::Input, names::avh2o_1(pft)));
            gathered.extend(Self::plant_names(pft).into_iter().map(|(n, _)| (Source::Latest, n)));
        }
        gathered
    }

    fn output_specs(&self) -> Vec<OutputSpec> {
        let mut specs: Vec<OutputSpec> = Self::litter_names()
            .into_iter()
            .map(|(n, _)| OutputSpec::pool(n))
            .collect();
        specs.extend(self.mineral_names().into_iter().map(OutputSpec::pool));
        for pft in self.pfts.keys() {
            specs.extend(Self::plant_names(pft).into_iter().map(|(n, _)| OutputSpec::pool(n)));
        }
        for pft in self.pfts.keys() {
            specs.push(OutputSpec::pool(names::tgprod(pft)));
            specs.push(OutputSpec::pool(names::fracrc(pft)));
        }
        specs.push(OutputSpec::pool(FLGREM));
        specs
    }

    /// Fraction of shoots removed by grazing, from the total on offer.
    pub fn flgrem(&self, density: f64, plants: &[PlantPools]) -> f64 {
        match &self.animal {
            Some(animal) => {
                let available: f64 = plants
                    .iter()
                    .map(|p| (p.aglive.c + p.stdead.c) * BIOMASS_PER_CARBON)
                    .sum();
                fraction_removed(density, animal.intake_kg_per_day, available, animal.max_removal)
            }
            None => 0.0,
        }
    }

    fn solve_pixel(&self, values: &[f64], out: &mut [f64], month: u32) -> bool {
        let mut cursor = Cursor::new(values);
        let [precip, annual_precip, min_temp, max_temp, pet, shwave, avh2o_2, code, wc] =
            cursor.array();
        let Some(site) = site_parameters(&self.sites, code) else {
            return false;
        };
        let density = if self.animal.is_some() {
            cursor.next()
        } else {
            0.0
        };

        let mut litter = LitterPools::default();
        for depth in 0..2 {
            litter.structural[depth] = cursor.pool();
            litter.strlig[depth] = cursor.next();
            litter.metabolic[depth] = cursor.pool();
        }
        let mut minerl = [[0.0; 2]; MAX_SOIL_LAYERS];
        for layer in minerl.iter_mut().take(self.n_layers) {
            *layer = cursor.array();
        }

        let pfts = self.pfts.keys();
        let mut plants = Vec::with_capacity(pfts.len());
        let mut water = Vec::with_capacity(pfts.len());
        for _ in &pfts {
            let [cover, avh2o_1] = cursor.array();
            water.push((cover, avh2o_1));
            plants.push(PlantPools {
                aglive: cursor.pool(),
                bglive: cursor.pool(),
                stdead: cursor.pool(),
            });
        }

        let flgrem = self.flgrem(density, &plants);
        let env = GrowthEnvironment {
            month,
            precip,
            annual_precip,
            min_temp,
            max_temp,
            pet,
            shwave,
            wc,
            avh2o_2,
        };

        let mut summaries = Vec::with_capacity(pfts.len());
        for ((pft, plant), (cover, avh2o_1)) in pfts.iter().zip(plants.iter_mut()).zip(&water) {
            let Some(traits) = self.pfts.get(*pft) else {
                return false;
            };
            summaries.push(grow(
                plant,
                &mut minerl,
                &mut litter,
                traits,
                site,
                &env,
                *cover,
                *avh2o_1,
                flgrem,
            ));
        }

        let mut sink = Sink::new(out);
        for depth in 0..2 {
            sink.pool(&litter.structural[depth]);
            sink.push(litter.strlig[depth]);
            sink.pool(&litter.metabolic[depth]);
        }
        for layer in minerl.iter().take(self.n_layers) {
            sink.extend(*layer);
        }
        for plant in &plants {
            sink.pool(&plant.aglive);
            sink.pool(&plant.bglive);
            sink.pool(&plant.stdead);
        }
        for summary in &summaries {
            sink.push(summary.tgprod);
            sink.push(summary.fracrc);
        }
        sink.push(flgrem);
        true
    }
}

#[typetag::serde]
impl Component for Production {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let mut definitions = vec![
            RequirementDefinition::driver(PRECIP, "cm"),
            RequirementDefinition::driver(ANNUAL_PRECIP, "cm"),
            RequirementDefinition::driver(MIN_TEMP, "degC"),
            RequirementDefinition::driver(MAX_TEMP, "degC"),
            RequirementDefinition::input(PET, "cm"),
            RequirementDefinition::input(SHWAVE, "langley / day"),
            RequirementDefinition::input(AVH2O_2, "cm"),
            RequirementDefinition::persistent(SITE_INDEX, "1"),
            RequirementDefinition::persistent(WC, "1"),
        ];
        if self.animal.is_some() {
            definitions.push(RequirementDefinition::persistent(ANIMAL_DENSITY, "animals / ha"));
        }
        for (name, unit) in Self::litter_names() {
            definitions.push(RequirementDefinition::state(&name, unit));
        }
        for name in self.mineral_names() {
            definitions.push(RequirementDefinition::state(&name, "g / m^2"));
        }
        for pft in self.pfts.keys() {
            definitions.push(RequirementDefinition::persistent(&names::pft_cover(pft), "1"));
            definitions.push(RequirementDefinition::input(&names::avh2o_1(pft), "cm"));
            for (name, unit) in Self::plant_names(pft) {
                definitions.push(RequirementDefinition::state(&name, unit));
            }
            definitions.push(RequirementDefinition::output(&names::tgprod(pft), "g / m^2"));
            definitions.push(RequirementDefinition::output(&names::fracrc(pft), "1"));
        }
        definitions.push(RequirementDefinition::output(FLGREM, "1"));
        definitions
    }

    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        let shape = inputs.shape()?;
        let month = inputs.step.month;
        let wanted = self.gathered();
        let rasters = gather(inputs, &wanted)?;
        let specs = self.output_specs();

        let computed = compute_rasters(shape, &specs, |idx, out| {
            let mut values = vec![0.0; wanted.len()];
            rasters.read(idx, &mut values) && self.solve_pixel(&values, out, month)
        });
        Ok(named_outputs(&specs, computed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::flows::Pool;

    fn component(animal: Option<AnimalParameters>) -> Production {
        Production::from_parameters(
            ParameterTable::from_records("sites", [(1, SiteParameters::default())]),
            ParameterTable::from_records(
                "pfts",
                [(1, PftParameters::default()), (2, PftParameters::default())],
            ),
            animal,
            3,
        )
    }

    #[test]
    fn plant_names_carry_the_pft_last() {
        let names: Vec<String> = Production::plant_names(4).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names[0], "aglivc_4");
        assert_eq!(names[1], "aglive_1_4");
        assert_eq!(names[8], "stdede_2_4");
    }

    #[test]
    fn animal_density_is_only_read_with_an_animal() {
        let without = component(None);
        let with = component(Some(AnimalParameters::default()));
        assert_eq!(with.gathered().len(), without.gathered().len() + 1);
        assert!(!without.input_names().contains(&ANIMAL_DENSITY.to_string()));
    }

    #[test]
    fn grazing_fraction_uses_all_pfts() {
        let plant = PlantPools {
            aglive: Pool::new(40.0, 1.0, 0.1),
            bglive: Pool::default(),
            stdead: Pool::new(8.64, 0.1, 0.01),
        };
        let production = component(Some(AnimalParameters::default()));
        // 2 x 121.6 g / m^2 on offer, 24.32 g / m^2 demanded
        let flgrem = production.flgrem(1.0, &[plant, plant]);
        approx::assert_abs_diff_eq!(flgrem, 0.1, epsilon = 1e-12);
        assert_eq!(component(None).flgrem(1.0, &[plant]), 0.0);
    }

    #[test]
    fn pixel_conserves_nitrogen_without_grazing() {
        let production = component(None);
        let wanted = production.gathered();
        let specs = production.output_specs();
        let mut values = vec![0.0; wanted.len()];
        // precip, annual, tmin, tmax, pet, shwave, avh2o_2, site, wc
        values[..9].copy_from_slice(&[6.0, 45.0, 8.0, 24.0, 10.0, 600.0, 4.0, 1.0, 0.2]);
        let mut cursor = 9;
        // litter: structural (c, n, p), strlig, metabolic (c, n, p), twice
        for _ in 0..2 {
            values[cursor..cursor + 7].copy_from_slice(&[50.0, 0.25, 0.05, 0.2, 10.0, 0.5, 0.05]);
            cursor += 7;
        }
        // three mineral layers
        for _ in 0..3 {
            values[cursor..cursor + 2].copy_from_slice(&[3.0, 1.0]);
            cursor += 2;
        }
        for _ in 0..2 {
            values[cursor..cursor + 2].copy_from_slice(&[0.5, 3.0]);
            cursor += 2;
            values[cursor..cursor + 9]
                .copy_from_slice(&[80.0, 2.0, 0.2, 200.0, 3.0, 0.4, 40.0, 0.5, 0.05]);
            cursor += 9;
        }
        assert_eq!(cursor, wanted.len());

        let n_of = |slots: &[f64], offset: usize| -> f64 {
            // litter N at positions 1, 5, 8, 12 then minerals and plants
            let mut total = slots[offset + 1] + slots[offset + 5] + slots[offset + 8] + slots[offset + 12];
            for lyr in 0..3 {
                total += slots[offset + 14 + 2 * lyr];
            }
            total
        };
        let before_litter_mineral = n_of(&values, 9);
        let before_plants: f64 = (0..2)
            .map(|k| {
                let base = 9 + 14 + 6 + k * 11 + 2;
                values[base + 1] + values[base + 4] + values[base + 7]
            })
            .sum();

        let mut out = vec![0.0; specs.len()];
        assert!(production.solve_pixel(&values, &mut out, 7));
        let after_litter_mineral = n_of(&out, 0);
        let after_plants: f64 = (0..2)
            .map(|k| {
                let base = 14 + 6 + k * 9;
                out[base + 1] + out[base + 4] + out[base + 7]
            })
            .sum();

        approx::assert_abs_diff_eq!(
            before_litter_mineral + before_plants,
            after_litter_mineral + after_plants,
            epsilon = 1e-9
        );
        let tgprod = specs.iter().position(|s| s.name == "tgprod_1").unwrap();
        assert!(out[tgprod] > 0.0);
    }
}
