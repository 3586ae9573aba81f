//! Monthly climate quantities and the climate factors on decomposition.

use std::f64::consts::PI;

/// Julian day of the middle of each calendar month.
const MID_MONTH_DAY: [f64; 12] = [
    15.0, 46.0, 75.0, 106.0, 136.0, 167.0, 197.0, 228.0, 259.0, 289.0, 320.0, 350.0,
];

/// Atmospheric transmission applied to extraterrestrial radiation.
const TRANSMISSION: f64 = 0.8;

/// Average temperature (°C).
pub fn tave(min_temp: f64, max_temp: f64) -> f64 {
    (min_temp + max_temp) / 2.0
}

/// Daily shortwave radiation at the surface in the middle of `month`
/// (langleys / day).
///
/// `month` is the calendar month, 1..=12.
pub fn shortwave_radiation(latitude_deg: f64, month: u32) -> f64 {
    let day = MID_MONTH_DAY[((month.clamp(1, 12)) - 1) as usize];
    let rlatitude = latitude_deg.to_radians();
    let declination = 0.401426 * (2.0 * PI * (day - 77.0) / 365.0).sin();

    let x = -rlatitude.tan() * declination.tan();
    let ahou = (1.0 - x * x).max(0.0).sqrt().atan2(x).max(0.0);

    let extraterrestrial = 917.0
        * (ahou * rlatitude.sin() * declination.sin()
            + rlatitude.cos() * declination.cos() * ahou.sin());
    (extraterrestrial * TRANSMISSION).max(0.0)
}

/// Monthly reference evapotranspiration (cm), Hargreaves form.
pub fn pet(min_temp: f64, max_temp: f64, shwave: f64, fwloss_4: f64) -> f64 {
    let avg = tave(min_temp, max_temp);
    let range = (max_temp - min_temp).max(0.0);
    // langleys / day to equivalent mm of evaporation
    let radiation = shwave * 0.041868 / 2.45;
    let daily_mm = 0.0023 * (avg + 17.8) * range.sqrt() * radiation;
    (daily_mm * 30.0 / 10.0 * fwloss_4).max(0.0)
}

/// Ratio of available water to reference evapotranspiration.
///
/// Uses snowmelt alone in a month where snow melted. Returns `None` when
/// reference evapotranspiration is not positive.
pub fn rprpet(pet: f64, snowmelt: f64, avh2o_3: f64, precip: f64) -> Option<f64> {
    if pet <= 0.0 {
        return None;
    }
    if snowmelt > 0.0 {
        Some(snowmelt / pet)
    } else {
        Some((avh2o_3 + precip) / pet)
    }
}

/// Temperature response of decomposition.
pub fn temperature_factor(tave: f64, teff: [f64; 4]) -> f64 {
    let value = teff[1] + (teff[2] / PI) * (PI * teff[3] * (tave - teff[0])).atan();
    (value / 18.0).max(0.01)
}

/// Moisture response of decomposition.
pub fn moisture_factor(rprpet: f64) -> f64 {
    if rprpet > 9.0 {
        1.0
    } else {
        1.0 / (1.0 + 30.0 * (-8.5 * rprpet).exp())
    }
}

/// Decomposition factor combining temperature and moisture responses.
pub fn defac(tave: f64, rprpet: f64, teff: [f64; 4]) -> f64 {
    (temperature_factor(tave, teff) * moisture_factor(rprpet)).max(0.0)
}

/// Effect of anaerobic conditions on decomposition.
///
/// `aneref` holds the ratio above which anaerobic conditions start, the
/// ratio at which the effect is strongest, and the strongest effect.
pub fn anerb(rprpet: f64, pet: f64, drain: f64, aneref: [f64; 3]) -> f64 {
    if rprpet <= aneref[0] {
        return 1.0;
    }
    let xh2o = (rprpet - aneref[0]) * pet * (1.0 - drain);
    if xh2o <= 0.0 {
        return 1.0;
    }
    let newrat = aneref[0] + xh2o / pet;
    let slope = (1.0 - aneref[2]) / (aneref[0] - aneref[1]);
    (1.0 + slope * (newrat - aneref[0])).max(aneref[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn radiation_follows_the_seasons() {
        let june = shortwave_radiation(45.0, 6);
        let december = shortwave_radiation(45.0, 12);
        assert!(june > december);
        assert!(shortwave_radiation(-45.0, 12) > shortwave_radiation(-45.0, 6));
        // polar night
        assert_eq!(shortwave_radiation(80.0, 12), 0.0);
        let equator = shortwave_radiation(0.0, 3);
        assert!(equator > 650.0 && equator < 750.0, "{equator}");
    }

    #[test]
    fn pet_is_positive_for_warm_months() {
        let value = pet(10.0, 24.0, shortwave_radiation(40.0, 7), 0.9);
        assert!(value > 5.0 && value < 25.0, "{value}");
        assert_eq!(pet(-30.0, -20.0, 100.0, 0.9), 0.0);
    }

    #[test]
    fn rprpet_prefers_snowmelt() {
        assert_eq!(rprpet(4.0, 2.0, 10.0, 10.0), Some(0.5));
        assert_eq!(rprpet(4.0, 0.0, 1.0, 3.0), Some(1.0));
        assert_eq!(rprpet(0.0, 0.0, 1.0, 3.0), None);
    }

    #[test]
    fn defac_is_bounded() {
        let teff = [15.4, 11.75, 29.7, 0.031];
        for tave in [-20.0, 0.0, 15.0, 35.0] {
            for ratio in [0.0, 0.5, 2.0, 10.0] {
                let value = defac(tave, ratio, teff);
                assert!(value >= 0.0 && value < 2.0);
            }
        }
        assert_eq!(moisture_factor(10.0), 1.0);
        assert_abs_diff_eq!(temperature_factor(-100.0, teff), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn anerb_declines_with_excess_water() {
        let aneref = [1.5, 3.0, 0.3];
        assert_eq!(anerb(1.0, 5.0, 0.0, aneref), 1.0);
        assert_eq!(anerb(2.0, 5.0, 1.0, aneref), 1.0);
        assert_abs_diff_eq!(anerb(2.25, 5.0, 0.0, aneref), 0.65, epsilon = 1e-12);
        assert_eq!(anerb(20.0, 5.0, 0.0, aneref), 0.3);
    }
}
