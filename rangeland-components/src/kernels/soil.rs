//! Soil properties derived once from texture, bulk density and organic matter.
//!
//! # Inputs
//!
//! - sand, silt, clay: mass fractions (0-1)
//! - bulk density: g / cm^3
//! - organic matter pools: g C / m^2

use rangeland_core::variable::MAX_SOIL_LAYERS;
use std::f64::consts::PI;

/// Decay of organic matter with each soil layer below the first.
pub const OMPC_LAYER_DECAY: f64 = 0.85;

/// Organic matter content of the surface soil (percent).
///
/// Returns `None` when bulk density or organic layer depth is not positive.
pub fn ompc(som1c_2: f64, som2c_2: f64, som3c: f64, bulkd: f64, edepth: f64) -> Option<f64> {
    if bulkd <= 0.0 || edepth <= 0.0 {
        return None;
    }
    Some((som1c_2 + som2c_2 + som3c) * 1.724 / (10000.0 * bulkd * edepth))
}

/// Field capacity (volumetric fraction) from texture, organic matter and bulk density.
pub fn afiel(sand: f64, silt: f64, clay: f64, ompc: f64, bulkd: f64) -> f64 {
    0.3075 * sand + 0.5886 * silt + 0.8039 * clay + 2.208e-3 * ompc - 0.1434 * bulkd
}

/// Wilting point (volumetric fraction) from texture, organic matter and bulk density.
pub fn awilt(sand: f64, silt: f64, clay: f64, ompc: f64, bulkd: f64) -> f64 {
    -0.0059 * sand + 0.1142 * silt + 0.5766 * clay + 2.228e-3 * ompc + 0.02671 * bulkd
}

/// Field capacity and wilting point for every soil layer.
///
/// Organic matter declines geometrically with depth. Returns `None` when
/// any texture fraction or bulk density is not positive.
pub fn layer_water_limits(
    sand: f64,
    silt: f64,
    clay: f64,
    ompc: f64,
    bulkd: f64,
) -> Option<([f64; MAX_SOIL_LAYERS], [f64; MAX_SOIL_LAYERS])> {
    if sand <= 0.0 || silt <= 0.0 || clay <= 0.0 || bulkd <= 0.0 || ompc < 0.0 {
        return None;
    }
    let mut fc = [0.0; MAX_SOIL_LAYERS];
    let mut wp = [0.0; MAX_SOIL_LAYERS];
    let mut om = ompc;
    for lyr in 0..MAX_SOIL_LAYERS {
        fc[lyr] = afiel(sand, silt, clay, om, bulkd);
        wp[lyr] = awilt(sand, silt, clay, om, bulkd);
        om *= OMPC_LAYER_DECAY;
    }
    Some((fc, wp))
}

/// Effect of soil texture on the decomposition of soil SOM1.
pub fn eftext(peftxa: f64, peftxb: f64, sand: f64) -> f64 {
    peftxa + peftxb * sand
}

/// Texture-dependent respiration fraction for soil SOM1 decomposition.
pub fn p1co2_2(p1co2a_2: f64, p1co2b_2: f64, sand: f64) -> f64 {
    p1co2a_2 + p1co2b_2 * sand
}

/// Fraction of decomposing soil SOM1 or SOM2 that becomes SOM3.
pub fn fraction_to_som3(intercept: f64, slope: f64, clay: f64) -> f64 {
    intercept + slope * clay
}

/// Organic matter leaching fraction.
pub fn orglch(omlech_1: f64, omlech_2: f64, sand: f64) -> f64 {
    omlech_1 + omlech_2 * sand
}

/// Fraction of gross N mineralization lost as gas, scaled by the site multiplier.
pub fn vlossg(clay: f64, multiplier: f64) -> f64 {
    let base = if clay < 0.1 {
        0.015
    } else if clay > 0.3 {
        0.001
    } else {
        -0.07 * clay + 0.022
    };
    base * multiplier
}

/// pH effect on decomposition of structural material and SOM3.
pub fn pheff_struc(ph: f64) -> f64 {
    (0.5 + (1.1 / PI) * (PI * 0.7 * (ph - 3.0)).atan()).clamp(0.0, 1.0)
}

/// pH effect on decomposition of metabolic material.
pub fn pheff_metab(ph: f64) -> f64 {
    (0.5 + (1.14 / PI) * (PI * 0.7 * (ph - 4.8)).atan()).clamp(0.0, 1.0)
}

/// Mineral leaching fractions for N and P.
pub fn fleach(fleach: [f64; 4], sand: f64) -> [f64; 2] {
    let base = fleach[0] + fleach[1] * sand;
    [base * fleach[2], base * fleach[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_calc_ompc() {
        let value = ompc(42.109, 959.1091, 588.0574, 1.5, 0.2).unwrap();
        assert_abs_diff_eq!(value, 0.913304, epsilon = 0.0001);
        assert!(ompc(42.1, 959.1, 588.0, 0.0, 0.2).is_none());
    }

    #[test]
    fn test_calc_afiel() {
        let value = afiel(0.39, 0.41, 0.2, 0.913304, 1.5);
        assert_abs_diff_eq!(value, 0.30895, epsilon = 0.0001);
    }

    #[test]
    fn test_calc_awilt() {
        let value = awilt(0.39, 0.41, 0.2, 0.913304, 1.5);
        assert_abs_diff_eq!(value, 0.201988, epsilon = 0.0001);
    }

    #[test]
    fn water_limits_decline_with_depth() {
        let (fc, wp) = layer_water_limits(0.39, 0.41, 0.2, 0.913304, 1.5).unwrap();
        assert_abs_diff_eq!(fc[0], 0.30895, epsilon = 0.0001);
        assert!(fc.windows(2).all(|w| w[1] < w[0]));
        assert!(wp.iter().zip(fc.iter()).all(|(w, f)| w < f));
        assert!(layer_water_limits(0.0, 0.41, 0.2, 0.9, 1.5).is_none());
    }

    #[test]
    fn ph_effects_are_bounded() {
        for ph in [0.0, 3.0, 4.8, 7.0, 14.0] {
            assert!((0.0..=1.0).contains(&pheff_struc(ph)));
            assert!((0.0..=1.0).contains(&pheff_metab(ph)));
        }
        assert_abs_diff_eq!(pheff_struc(3.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn gaseous_loss_by_clay() {
        assert_eq!(vlossg(0.05, 1.0), 0.015);
        assert_eq!(vlossg(0.4, 2.0), 0.002);
        assert_abs_diff_eq!(vlossg(0.2, 1.0), 0.008, epsilon = 1e-12);
    }
}
