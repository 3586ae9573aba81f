//! Carbon to nutrient ratios of material entering organic pools and
//! availability of mineral phosphorus.

/// Ratio of carbon to biomass used to express nutrient concentrations.
pub const BIOMASS_PER_CARBON: f64 = 2.5;

/// Required C:E ratio for material entering a surface pool.
///
/// `anps` is the nutrient content and `tca` the total carbon of the donor.
/// `pcemic` holds the maximum ratio, minimum ratio, and the nutrient
/// concentration at and above which the minimum applies.
pub fn agdrat(anps: f64, tca: f64, pcemic: [f64; 3]) -> f64 {
    let biomass = tca * BIOMASS_PER_CARBON;
    let econt = if biomass > 1e-10 { anps / biomass } else { 0.0 };
    if econt > pcemic[2] {
        pcemic[1]
    } else {
        pcemic[0] - econt * (pcemic[0] - pcemic[1]) / pcemic[2]
    }
}

/// Required C:E ratio for material entering a belowground pool.
///
/// Interpolates linearly between the maximum ratio `varat[0]` with no
/// mineral nutrient and the minimum `varat[1]` once `aminrl` reaches
/// `varat[2]`.
pub fn bgdrat(aminrl: f64, varat: [f64; 3]) -> f64 {
    if aminrl <= 0.0 {
        varat[0]
    } else if aminrl > varat[2] {
        varat[1]
    } else {
        (1.0 - aminrl / varat[2]) * (varat[0] - varat[1]) + varat[1]
    }
}

/// Fraction of surface mineral P in solution, from Langmuir sorption.
///
/// `pslsrb` sets the slope of the sorption curve and `sorpmx` the maximum
/// sorbed P (g / m^2).
pub fn fsfunc(minerl_1_2: f64, pslsrb: f64, sorpmx: f64) -> f64 {
    let half_saturation = sorpmx * (2.0 - pslsrb) / 2.0;
    if sorpmx <= 0.0 {
        return 1.0;
    }
    if half_saturation <= 0.0 {
        return 0.0;
    }
    if minerl_1_2 <= 1e-7 {
        return half_saturation / (half_saturation + sorpmx);
    }
    let b = half_saturation + sorpmx - minerl_1_2;
    let solution =
        (-b + (b * b + 4.0 * minerl_1_2 * half_saturation).sqrt()) / 2.0;
    (solution / minerl_1_2).clamp(0.0, 1.0)
}

/// Fraction of surface mineral P available to plants.
pub fn favail_p(minerl_1_2: f64, favail_4: f64, favail_5: f64, favail_6: f64) -> f64 {
    if favail_6 <= 0.0 {
        return favail_5;
    }
    let fraction = favail_4 + minerl_1_2 * (favail_5 - favail_4) / favail_6;
    fraction.min(favail_5)
}

/// C:E ratio of material moving from surface structural litter into surface SOM2.
pub fn rnewas_som2(rnewas_som1: f64, rad1p: [f64; 3], pcemic_min: f64) -> f64 {
    let radds1 = rad1p[0] + rad1p[1] * (rnewas_som1 - pcemic_min);
    (rnewas_som1 + radds1).max(rad1p[2])
}
