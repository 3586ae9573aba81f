//! Names of the rasters exchanged between components.
//!
//! State variables are named by the registry in
//! [`rangeland_core::variable`]. The names here cover drivers, time-invariant
//! inputs, derived persistent parameters and the working values that live
//! only within one month.

use rangeland_core::variable::{pft_variable, variable_name, Element};

// Monthly drivers
pub const PRECIP: &str = "precip";
pub const MIN_TEMP: &str = "min_temp";
pub const MAX_TEMP: &str = "max_temp";
/// Precipitation summed over the twelve month window
pub const ANNUAL_PRECIP: &str = "annual_precip";

// Time-invariant inputs
pub const SITE_INDEX: &str = "site_index";
pub const LATITUDE: &str = "latitude";
pub const BULK_DENSITY: &str = "bulk_d";
pub const PH: &str = "ph";
pub const SAND: &str = "sand";
pub const SILT: &str = "silt";
pub const CLAY: &str = "clay";
pub const ANIMAL_DENSITY: &str = "animal_density";

// Derived persistent parameters
pub const WC: &str = "wc";
pub const EFTEXT: &str = "eftext";
pub const P1CO2_2: &str = "p1co2_2";
pub const FPS1S3: &str = "fps1s3";
pub const FPS2S3: &str = "fps2s3";
pub const ORGLCH: &str = "orglch";
pub const VLOSSG: &str = "vlossg";
pub const PHEFF_STRUC: &str = "pheff_struc";
pub const PHEFF_METAB: &str = "pheff_metab";

// Working values within a month
pub const TAVE: &str = "tave";
pub const SHWAVE: &str = "shwave";
pub const PET: &str = "pet";
pub const SNOWMELT: &str = "snowmelt";
pub const AVH2O_2: &str = "avh2o_2";
pub const AVH2O_3: &str = "avh2o_3";
pub const DEFAC: &str = "defac";
pub const ANERB: &str = "anerb";
pub const GROMIN: &str = "gromin_1";
pub const FLGREM: &str = "flgrem";

/// Fractional cover of one plant functional type.
pub fn pft_cover(pft: u32) -> String {
    pft_variable("pft_cover", pft)
}

/// Field capacity of a soil layer (volumetric fraction).
pub fn afiel(layer: usize) -> String {
    variable_name("afiel", Some(layer), None)
}

/// Wilting point of a soil layer (volumetric fraction).
pub fn awilt(layer: usize) -> String {
    variable_name("awilt", Some(layer), None)
}

/// Water moving out of a soil layer during the month.
pub fn amov(layer: usize) -> String {
    variable_name("amov", Some(layer), None)
}

/// Mineral leaching fraction for an element.
pub fn fleach(element: Element) -> String {
    variable_name("fleach", None, Some(element))
}

/// Required C:E ratio of surface structural material entering SOM1 (`receiver` 1)
/// or SOM2 (`receiver` 2).
pub fn rnewas(element: Element, receiver: usize) -> String {
    format!("rnewas_{}_{}", element.code(), receiver)
}

/// Same as [`rnewas`] for soil structural material.
pub fn rnewbs(element: Element, receiver: usize) -> String {
    format!("rnewbs_{}_{}", element.code(), receiver)
}

pub fn avh2o_1(pft: u32) -> String {
    pft_variable("avh2o_1", pft)
}

pub fn tgprod(pft: u32) -> String {
    pft_variable("tgprod", pft)
}

pub fn fracrc(pft: u32) -> String {
    pft_variable("fracrc", pft)
}
