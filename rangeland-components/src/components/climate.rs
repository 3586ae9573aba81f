//! Monthly climate working values.
//!
//! # Drivers
//!
//! - `min_temp`, `max_temp` (°C)
//!
//! # Outputs
//!
//! - `tave` (°C) average temperature
//! - `shwave` (langleys / day) shortwave radiation at the surface
//! - `pet` (cm) reference evapotranspiration

use super::{gather, named_outputs, site_parameters, Source};
use crate::kernels::climate::{pet, shortwave_radiation, tave};
use crate::names::{LATITUDE, MAX_TEMP, MIN_TEMP, PET, SHWAVE, SITE_INDEX, TAVE};
use rangeland_core::component::{Component, OutputRasters, RequirementDefinition};
use rangeland_core::errors::RangelandResult;
use rangeland_core::raster::{compute_rasters, OutputSpec};
use rangeland_core::state::MonthInputs;
use rangeland_core::tables::{ParameterTable, SiteParameters};
use serde::{Deserialize, Serialize};

/// Temperature, radiation and reference evapotranspiration for the month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Climate {
    sites: ParameterTable<SiteParameters>,
}

impl Climate {
    pub fn from_parameters(sites: ParameterTable<SiteParameters>) -> Self {
        Self { sites }
    }

    /// Values at one pixel: average temperature, shortwave radiation and PET.
    pub fn calculate(
        &self,
        site: &SiteParameters,
        min_temp: f64,
        max_temp: f64,
        latitude: f64,
        month: u32,
    ) -> [f64; 3] {
        let shwave = shortwave_radiation(latitude, month);
        [
            tave(min_temp, max_temp),
            shwave,
            pet(min_temp, max_temp, shwave, site.fwloss_4),
        ]
    }
}

#[typetag::serde]
impl Component for Climate {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::driver(MIN_TEMP, "degC"),
            RequirementDefinition::driver(MAX_TEMP, "degC"),
            RequirementDefinition::persistent(SITE_INDEX, "1"),
            RequirementDefinition::persistent(LATITUDE, "degrees"),
            RequirementDefinition::output(TAVE, "degC"),
            RequirementDefinition::output(SHWAVE, "langley / day"),
            RequirementDefinition::output(PET, "cm"),
        ]
    }

    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        let shape = inputs.shape()?;
        let month = inputs.step.month;
        let rasters = gather(
            inputs,
            &[
                (Source::Driver, MIN_TEMP.to_string()),
                (Source::Driver, MAX_TEMP.to_string()),
                (Source::Persistent, SITE_INDEX.to_string()),
                (Source::Persistent, LATITUDE.to_string()),
            ],
        )?;
        let specs = [
            OutputSpec::signed(TAVE),
            OutputSpec::pool(SHWAVE),
            OutputSpec::pool(PET),
        ];

        let computed = compute_rasters(shape, &specs, |idx, out| {
            let mut values = [0.0; 4];
            if !rasters.read(idx, &mut values) {
                return false;
            }
            let [min_temp, max_temp, code, latitude] = values;
            let Some(site) = site_parameters(&self.sites, code) else {
                return false;
            };
            out.copy_from_slice(&self.calculate(site, min_temp, max_temp, latitude, month));
            true
        });
        Ok(named_outputs(&specs, computed))
    }
}
