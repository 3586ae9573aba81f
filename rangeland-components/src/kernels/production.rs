//! Plant production, root allocation and nutrient limitation.
//!
//! # Units
//!
//! Production and biomass are g biomass / m^2 of pixel; carbon is
//! 0.4 of biomass. Nutrients are g / m^2.

use super::ratios::BIOMASS_PER_CARBON;
use rangeland_core::tables::PftParameters;
use rangeland_core::variable::{Element, MAX_SOIL_LAYERS};

/// Aboveground biomass above which standing dead no longer shades the soil.
const SHADING_CAP: f64 = 800.0;

/// Soil surface temperature used for potential production (°C).
pub fn surface_temperature(
    min_temp: f64,
    max_temp: f64,
    aglivc: f64,
    stdedc: f64,
    pmxbio: f64,
    pmxtmp: f64,
    pmntmp: f64,
) -> f64 {
    let bio = ((aglivc + stdedc) * BIOMASS_PER_CARBON).min(pmxbio);
    let tmxs = max_temp + (25.4 / (1.0 + 18.0 * (-0.2 * max_temp).exp())) * ((pmxtmp * bio).exp() - 0.13);
    let tmns = min_temp + pmntmp * bio - 1.78;
    (tmxs + tmns) / 2.0
}

/// Skewed unimodal response of production to temperature.
///
/// `ppdf` holds the optimum, the maximum, and the left and right shape
/// parameters.
pub fn potprd(ctemp: f64, ppdf: [f64; 4]) -> f64 {
    let span = ppdf[1] - ppdf[0];
    if span == 0.0 {
        return 0.0;
    }
    let frac = (ppdf[1] - ctemp) / span;
    if frac <= 0.0 {
        return 0.0;
    }
    (ppdf[2] / ppdf[3] * (1.0 - frac.powf(ppdf[3]))).exp() * frac.powf(ppdf[2])
}

/// Water limitation on production.
///
/// `wc` is the difference between field capacity and wilting point of the
/// top layer. The ratio falls back to 0.01 when `pet` is too small to define
/// it, and the result never drops below 0.01.
pub fn h2ogef(avh2o_1: f64, precip: f64, pet: f64, wc: f64, pprpts: [f64; 3]) -> f64 {
    let ratio = if pet >= 0.01 {
        (avh2o_1 + precip) / pet
    } else {
        0.01
    };
    let intercept = pprpts[0] + pprpts[1] * wc;
    if ratio < intercept {
        return 0.01;
    }
    let width = pprpts[2] - intercept;
    if width <= 0.0 {
        return 1.0;
    }
    (1.0 + (ratio - pprpts[2]) / width).clamp(0.01, 1.0)
}

/// Reduction of production by shading from standing dead and surface litter,
/// and by a large live canopy.
pub fn biof(aglivc: f64, stdedc: f64, strucc_1: f64, pmxbio: f64, biok5: f64) -> f64 {
    let shading = if pmxbio > 0.0 {
        let dead = ((stdedc + 0.1 * strucc_1) * BIOMASS_PER_CARBON).min(pmxbio).min(SHADING_CAP);
        1.0 - 0.5 * dead / pmxbio
    } else {
        1.0
    };
    let live = aglivc * BIOMASS_PER_CARBON;
    let crowding = if biok5 > 0.0 && live > biok5 {
        biok5 / live
    } else {
        1.0
    };
    (shading * crowding).clamp(0.0, 1.0)
}

/// Potential total production for one PFT over the pixel (g / m^2).
pub fn potential_production(
    prdx_1: f64,
    shwave: f64,
    potprd: f64,
    h2ogef: f64,
    biof: f64,
    cover: f64,
) -> f64 {
    (prdx_1 * shwave * potprd * h2ogef * biof * cover).max(0.0)
}

/// Root fraction of production before nutrient and water feedback.
pub fn calc_provisional_fracrc(annual_precip: f64, pft: &PftParameters) -> f64 {
    if pft.frtcindx.round() == 0.0 {
        let belowground = pft.bgppa + annual_precip * pft.bgppb;
        let aboveground = pft.agppa + annual_precip * pft.agppb;
        let total = belowground + aboveground;
        if total <= 0.0 {
            return 0.5;
        }
        (belowground / total).clamp(0.0, 1.0)
    } else {
        (pft.cfrtcw_1 + pft.cfrtcw_2 + pft.cfrtcn_1 + pft.cfrtcn_2) / 4.0
    }
}

/// Root fraction revised for water stress and nutrient supply.
///
/// `supply_ratio` is available over demanded nutrient, per element.
pub fn calc_revised_fracrc(
    fracrc_p: f64,
    h2ogef: f64,
    supply_ratio: [f64; 2],
    pft: &PftParameters,
) -> f64 {
    if pft.frtcindx.round() == 0.0 {
        return fracrc_p;
    }
    let water = (pft.cfrtcw_2 - pft.cfrtcw_1) * h2ogef.clamp(0.0, 1.0) + pft.cfrtcw_1;
    let nutrient = supply_ratio
        .iter()
        .map(|r| (pft.cfrtcn_2 - pft.cfrtcn_1) * r.clamp(0.0, 1.0) + pft.cfrtcn_1)
        .fold(f64::MIN, f64::max);
    ((water + nutrient) / 2.0).clamp(0.01, 0.99)
}

/// Aboveground production after the grazing response.
pub fn grazing_effect_on_aboveground_production(tgprod: f64, fracrc: f64, flgrem: f64, grzeff: u8) -> f64 {
    let agprod = tgprod * (1.0 - fracrc);
    match grzeff {
        1 | 6 => (agprod * (1.0 - 2.21 * flgrem)).max(0.02),
        2 | 5 => (agprod * (1.0 + 2.6 * flgrem - 5.83 * flgrem * flgrem)).max(0.02),
        _ => agprod,
    }
}

/// Root:shoot ratio after the grazing response.
pub fn grazing_effect_on_root_shoot(fracrc: f64, flgrem: f64, grzeff: u8, gremb: f64) -> f64 {
    match grzeff {
        3 | 5 => (ungrazed_root_shoot(fracrc) + 3.05 * flgrem - 11.78 * flgrem * flgrem).max(0.01),
        4 | 6 => (1.0 - flgrem * gremb).max(0.01),
        _ => ungrazed_root_shoot(fracrc),
    }
}

fn ungrazed_root_shoot(fracrc: f64) -> f64 {
    if fracrc >= 1.0 {
        f64::MAX
    } else {
        fracrc / (1.0 - fracrc)
    }
}

/// Aboveground C:E ratio bound, interpolated on live shoot biomass.
pub fn aboveground_ratio(bounds: [f64; 2], aglivc: f64, biomax: f64) -> f64 {
    let biomass = aglivc * BIOMASS_PER_CARBON;
    if biomax <= 0.0 || biomass >= biomax {
        bounds[1]
    } else {
        bounds[0] + (bounds[1] - bounds[0]) * biomass / biomax
    }
}

/// Belowground C:E ratio bound from annual precipitation.
pub fn belowground_ratio(bounds: [f64; 2], annual_precip: f64) -> f64 {
    (bounds[0] + bounds[1] * annual_precip).max(1.0)
}

/// Minimum and maximum C:E ratios of new growth, above and belowground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TissueRatios {
    pub above_min: [f64; 2],
    pub above_max: [f64; 2],
    pub below_min: [f64; 2],
    pub below_max: [f64; 2],
}

impl TissueRatios {
    pub fn new(pft: &PftParameters, aglivc: f64, annual_precip: f64) -> Self {
        let mut ratios = Self {
            above_min: [0.0; 2],
            above_max: [0.0; 2],
            below_min: [0.0; 2],
            below_max: [0.0; 2],
        };
        for element in Element::ALL {
            let e = element.index();
            ratios.above_min[e] = aboveground_ratio(pft.pramn(element), aglivc, pft.biomax);
            ratios.above_max[e] = aboveground_ratio(pft.pramx(element), aglivc, pft.biomax);
            ratios.below_min[e] = belowground_ratio(pft.prbmn(element), annual_precip);
            ratios.below_max[e] = belowground_ratio(pft.prbmx(element), annual_precip);
        }
        ratios
    }

    /// Nutrient needed per unit of carbon produced with the given root fraction.
    fn nutrient_per_carbon(above: f64, below: f64, fracrc: f64) -> f64 {
        let mut per_c = 0.0;
        if above > 0.0 {
            per_c += (1.0 - fracrc) / above;
        }
        if below > 0.0 {
            per_c += fracrc / below;
        }
        per_c
    }

    /// Nutrient needed per unit of carbon at the richest tissue composition.
    pub fn max_demand_per_carbon(&self, element: Element, fracrc: f64) -> f64 {
        let e = element.index();
        Self::nutrient_per_carbon(self.above_min[e], self.below_min[e], fracrc)
    }

    /// Nutrient needed per unit of carbon at the poorest tissue composition.
    pub fn min_demand_per_carbon(&self, element: Element, fracrc: f64) -> f64 {
        let e = element.index();
        Self::nutrient_per_carbon(self.above_max[e], self.below_max[e], fracrc)
    }
}

/// Nutrient demand of carbon production `cprodc` (g C / m^2).
pub fn nutrient_demand(cprodc: f64, fracrc: f64, ratios: &TissueRatios) -> [f64; 2] {
    Element::ALL.map(|e| cprodc * ratios.max_demand_per_carbon(e, fracrc))
}

/// Effect of root biomass on the fraction of mineral nutrient accessible.
pub fn root_intensity(bglivc: f64, riint: f64, rictrl: f64) -> f64 {
    (1.0 - riint * (-rictrl * bglivc * BIOMASS_PER_CARBON).exp()).clamp(0.0, 1.0)
}

/// Mineral nutrient available to one PFT within its rooting depth.
pub fn available_nutrient(
    minerl: &[[f64; 2]; MAX_SOIL_LAYERS],
    element: Element,
    nlaypg: usize,
    favail: f64,
    rimpct: f64,
    cover: f64,
) -> f64 {
    let e = element.index();
    let in_reach: f64 = minerl
        .iter()
        .take(nlaypg.min(MAX_SOIL_LAYERS))
        .map(|layer| layer[e].max(0.0))
        .sum();
    in_reach * favail * rimpct * cover
}

/// Production after nutrient limitation and the nutrients taken up to build it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NutrientLimited {
    /// Carbon produced (g C / m^2)
    pub cprodl: f64,
    /// Total uptake per element, including fixation
    pub uptake: [f64; 2],
    /// Nitrogen supplied by fixation
    pub fixation: f64,
}

/// Limit carbon production by nutrient supply.
///
/// Production may proceed with tissue as poor as the maximum C:E ratios
/// allow; the uptake is whatever the limited production needs at the
/// richest composition, bounded by supply.
pub fn nutrient_limitation(
    cprodc: f64,
    fracrc: f64,
    eavail: [f64; 2],
    max_fixation: f64,
    ratios: &TissueRatios,
) -> NutrientLimited {
    let mut cprodl = cprodc.max(0.0);
    for element in Element::ALL {
        let per_c = ratios.min_demand_per_carbon(element, fracrc);
        if per_c > 0.0 {
            cprodl = cprodl.min(eavail[element.index()].max(0.0) / per_c);
        }
    }

    let uptake = Element::ALL.map(|element| {
        let wanted = cprodl * ratios.max_demand_per_carbon(element, fracrc);
        wanted.min(eavail[element.index()].max(0.0))
    });
    let fixation = max_fixation.min(uptake[Element::Nitrogen.index()]).max(0.0);

    NutrientLimited {
        cprodl,
        uptake,
        fixation,
    }
}

/// Remove `amount` of one element from the layers within rooting depth, in
/// proportion to each layer's content.
pub fn take_up_from_layers(
    minerl: &mut [[f64; 2]; MAX_SOIL_LAYERS],
    element: Element,
    nlaypg: usize,
    amount: f64,
) {
    let e = element.index();
    let layers = nlaypg.min(MAX_SOIL_LAYERS);
    let total: f64 = minerl[..layers].iter().map(|l| l[e].max(0.0)).sum();
    if total <= 0.0 || amount <= 0.0 {
        return;
    }
    let fraction = (amount / total).min(1.0);
    for layer in minerl[..layers].iter_mut() {
        if layer[e] > 0.0 {
            layer[e] -= layer[e] * fraction;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_grazing_effect_on_aboveground_production() {
        let linear = grazing_effect_on_aboveground_production(500.0, 0.62, 0.16, 1);
        assert_abs_diff_eq!(linear, 122.816, epsilon = 0.0001);
        let none = grazing_effect_on_aboveground_production(500.0, 0.62, 0.16, 4);
        assert_abs_diff_eq!(none, 190.0, epsilon = 1e-9);
        let quadratic = grazing_effect_on_aboveground_production(500.0, 0.62, 0.16, 2);
        assert_abs_diff_eq!(quadratic, 240.68288, epsilon = 0.0001);
        for grzeff in [3, 4] {
            assert_abs_diff_eq!(
                grazing_effect_on_aboveground_production(500.0, 0.62, 0.16, grzeff),
                190.0,
                epsilon = 1e-9
            );
        }
        assert_abs_diff_eq!(
            grazing_effect_on_aboveground_production(500.0, 0.62, 0.16, 5),
            quadratic,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            grazing_effect_on_aboveground_production(500.0, 0.62, 0.16, 6),
            linear,
            epsilon = 1e-9
        );
    }

    #[test]
    fn heavy_grazing_floors_aboveground_production() {
        for grzeff in [1, 6] {
            let agprod = grazing_effect_on_aboveground_production(500.0, 0.62, 0.5, grzeff);
            assert_eq!(agprod, 0.02);
        }
        for grzeff in [2, 5] {
            let agprod = grazing_effect_on_aboveground_production(500.0, 0.62, 0.8, grzeff);
            assert_eq!(agprod, 0.02);
        }
        let ungrazed = grazing_effect_on_aboveground_production(500.0, 0.62, 0.8, 3);
        assert_abs_diff_eq!(ungrazed, 190.0, epsilon = 1e-9);
    }

    #[test]
    fn test_grazing_effect_on_root_shoot() {
        let rtsh = grazing_effect_on_root_shoot(0.62, 0.16, 4, 0.02);
        assert_abs_diff_eq!(rtsh, 0.9968, epsilon = 0.0001);
        let ungrazed = grazing_effect_on_root_shoot(0.5, 0.16, 1, 0.02);
        assert_abs_diff_eq!(ungrazed, 1.0, epsilon = 1e-12);
        let linear = grazing_effect_on_root_shoot(0.62, 0.16, 6, 0.02);
        assert_abs_diff_eq!(linear, 0.9968, epsilon = 0.0001);
        let unchanged = grazing_effect_on_root_shoot(0.62, 0.16, 2, 0.02);
        assert_abs_diff_eq!(unchanged, 0.62 / 0.38, epsilon = 1e-12);
        for grzeff in [3, 5] {
            let quadratic = grazing_effect_on_root_shoot(0.62, 0.16, grzeff, 0.02);
            assert_abs_diff_eq!(quadratic, 1.81801, epsilon = 0.0001);
        }
    }

    #[test]
    fn heavy_grazing_floors_root_shoot() {
        for grzeff in [3, 5] {
            let rtsh = grazing_effect_on_root_shoot(0.2, 0.9, grzeff, 0.02);
            assert_eq!(rtsh, 0.01);
        }
        let linear = grazing_effect_on_root_shoot(0.62, 0.5, 4, 0.02);
        assert_abs_diff_eq!(linear, 0.99, epsilon = 1e-12);
    }

    #[test]
    fn test_calc_provisional_fracrc() {
        let mut pft = PftParameters {
            bgppa: 101.0,
            bgppb: 4.2,
            agppa: -12.0,
            agppb: 3.2,
            cfrtcw_1: 0.4,
            cfrtcw_2: 0.33,
            cfrtcn_1: 0.76,
            cfrtcn_2: 0.02,
            frtcindx: 0.0,
            ..Default::default()
        };
        assert_abs_diff_eq!(calc_provisional_fracrc(42.0, &pft), 0.69385, epsilon = 0.0001);
        pft.frtcindx = 1.0;
        assert_abs_diff_eq!(calc_provisional_fracrc(42.0, &pft), 0.3775, epsilon = 0.0001);
    }

    #[test]
    fn revised_fracrc_responds_to_stress() {
        let pft = PftParameters {
            frtcindx: 1.0,
            ..Default::default()
        };
        let stressed = calc_revised_fracrc(0.3775, 0.0, [0.0, 0.0], &pft);
        let relaxed = calc_revised_fracrc(0.3775, 1.0, [1.0, 1.0], &pft);
        assert_abs_diff_eq!(stressed, 0.58, epsilon = 1e-12);
        assert_abs_diff_eq!(relaxed, 0.175, epsilon = 1e-12);
        let fixed = PftParameters::default();
        assert_eq!(calc_revised_fracrc(0.6, 0.0, [0.0, 0.0], &fixed), 0.6);
    }

    #[test]
    fn potprd_peaks_at_optimum() {
        let ppdf = [30.0, 45.0, 1.0, 2.5];
        assert_abs_diff_eq!(potprd(30.0, ppdf), 1.0, epsilon = 1e-12);
        assert!(potprd(15.0, ppdf) < 1.0);
        assert_eq!(potprd(50.0, ppdf), 0.0);
    }

    #[test]
    fn h2ogef_is_a_fraction() {
        let pprpts = [0.0, 1.0, 0.8];
        assert_eq!(h2ogef(0.0, 0.0, 5.0, 0.1, pprpts), 0.01);
        assert_eq!(h2ogef(5.0, 5.0, 5.0, 0.1, pprpts), 1.0);
        let mid = h2ogef(1.0, 1.0, 5.0, 0.1, pprpts);
        assert!(mid > 0.01 && mid < 1.0);
        // just above the intercept the linear ramp is below the floor
        assert_eq!(h2ogef(0.55, 0.0, 5.0, 0.1, [0.0, 1.0, 2.0]), 0.01);
        assert_eq!(h2ogef(1.0, 1.0, 0.0, 0.1, [0.5, 0.0, 0.8]), 0.01);
    }

    #[test]
    fn nutrient_limits_production() {
        let pft = PftParameters::default();
        let ratios = TissueRatios::new(&pft, 50.0, 40.0);
        let unlimited = nutrient_limitation(100.0, 0.5, [100.0, 100.0], 0.0, &ratios);
        assert_eq!(unlimited.cprodl, 100.0);
        let limited = nutrient_limitation(100.0, 0.5, [0.5, 100.0], 0.0, &ratios);
        assert!(limited.cprodl < 100.0);
        assert_abs_diff_eq!(limited.uptake[0], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn uptake_is_proportional_to_layer_content() {
        let mut minerl = [[0.0; 2]; MAX_SOIL_LAYERS];
        minerl[0] = [2.0, 1.0];
        minerl[1] = [2.0, 1.0];
        minerl[2] = [4.0, 1.0];
        take_up_from_layers(&mut minerl, Element::Nitrogen, 2, 1.0);
        assert_eq!(minerl[0][0], 1.5);
        assert_eq!(minerl[1][0], 1.5);
        assert_eq!(minerl[2][0], 4.0);
        assert_eq!(minerl[0][1], 1.0);
    }
}
