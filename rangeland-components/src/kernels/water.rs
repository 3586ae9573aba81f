//! Monthly soil water balance for one pixel.
//!
//! Stages run in a fixed order, each consuming what the previous one left:
//! snow, runoff and surface evaporation, potential transpiration, the layer
//! cascade, transpiration removal and finally evaporation from the top layer.
//! All water quantities are in cm.

use rangeland_core::variable::MAX_SOIL_LAYERS;

/// Fraction of reference ET available to sublimate the snowpack.
const SNOW_EVAPORATION_LIMIT: f64 = 0.87;
/// Fraction of remaining reference ET available for surface losses.
const SURFACE_LOSS_LIMIT: f64 = 0.4;
/// Smallest potential transpiration carried to the layer calculations.
const MIN_TRANSPIRATION: f64 = 0.01;

/// Snowpack after accumulation, sublimation and melt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnowOutcome {
    pub snow: f64,
    pub snlq: f64,
    pub snowmelt: f64,
    pub sublimation: f64,
    /// Liquid water reaching the soil surface
    pub inputs: f64,
    /// Reference ET left after sublimation
    pub pet_remaining: f64,
}

/// Update the snowpack for one month.
///
/// `tmelt` holds the melt threshold temperature and the melt rate per degree
/// per langley.
pub fn snow(
    tave: f64,
    precip: f64,
    snow: f64,
    snlq: f64,
    pet: f64,
    tmelt: [f64; 2],
    shwave: f64,
) -> SnowOutcome {
    let (mut snow, mut snlq) = (snow.max(0.0), snlq.max(0.0));
    let mut inputs = 0.0;
    let mut pet_remaining = pet;
    let mut snowmelt = 0.0;
    let mut sublimation = 0.0;

    if tave <= 0.0 {
        snow += precip;
    } else if snow > 0.0 {
        snlq += precip;
    } else {
        inputs = precip;
    }

    if snow > 0.0 {
        let pack = snow + snlq;
        let evsnow = pack.min(pet * SNOW_EVAPORATION_LIMIT);
        if evsnow >= pack {
            snow = 0.0;
            snlq = 0.0;
        } else {
            snow -= evsnow * snow / pack;
            snlq -= evsnow * snlq / pack;
        }
        pet_remaining = (pet - evsnow / SNOW_EVAPORATION_LIMIT).max(0.0);
        sublimation = evsnow;

        if tave >= tmelt[0] {
            snowmelt = (tmelt[1] * (tave - tmelt[0]) * shwave).max(0.0).min(snow.max(0.0));
            snow -= snowmelt;
            snlq += snowmelt;
            if snlq > 0.5 * snow {
                inputs += snlq - 0.5 * snow;
                snlq = 0.5 * snow;
            }
        }
    }

    SnowOutcome {
        snow: snow.max(0.0),
        snlq: snlq.max(0.0),
        snowmelt,
        sublimation,
        inputs,
        pet_remaining,
    }
}

/// Water removed at the surface before it enters the soil.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceLosses {
    pub inputs: f64,
    pub runoff: f64,
    /// Interception and bare soil evaporation
    pub evaporation: f64,
    pub pet_remaining: f64,
}

/// Biomass that shelters the surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceCover {
    /// Surface litter biomass (g / m^2)
    pub litter: f64,
    /// Live and standing dead shoot biomass (g / m^2)
    pub standing: f64,
}

/// Subtract runoff and, without a snowpack, interception and bare soil evaporation.
#[allow(clippy::too_many_arguments)]
pub fn subtract_surface_losses(
    inputs: f64,
    pet_remaining: f64,
    snow_present: bool,
    fracro: f64,
    precro: f64,
    fwloss: [f64; 2],
    cover: SurfaceCover,
) -> SurfaceLosses {
    let runoff = (fracro * (inputs - precro)).max(0.0);
    let mut inputs = inputs - runoff;
    let mut pet_remaining = pet_remaining;
    let mut evaporation = 0.0;

    if !snow_present {
        let litter = cover.litter.min(400.0);
        let standing = cover.standing.min(800.0);
        let interception = (0.0003 * litter + 0.0006 * standing) * fwloss[0];
        let bare_soil = 0.5 * (-0.002 * litter - 0.004 * standing).exp() * fwloss[1];
        evaporation = ((interception + bare_soil) * inputs)
            .min(SURFACE_LOSS_LIMIT * pet_remaining)
            .clamp(0.0, inputs.max(0.0));
        inputs -= evaporation;
        pet_remaining = (pet_remaining - evaporation).max(0.0);
    }

    SurfaceLosses {
        inputs,
        runoff,
        evaporation,
        pet_remaining,
    }
}

/// Potential transpiration from live shoot biomass (g / m^2).
pub fn potential_transpiration(tave: f64, pet_remaining: f64, live_biomass: f64) -> f64 {
    let pttr = if tave < 2.0 {
        0.0
    } else {
        pet_remaining * 0.65 * (1.0 - (-0.02 * live_biomass).exp())
    };
    pttr.min(pet_remaining).max(MIN_TRANSPIRATION)
}

/// Cascade `inputs` through the soil layers, filling each to field capacity.
///
/// Returns the water moving out of each layer and the water draining out of
/// the bottom of the profile.
pub fn distribute_water(
    inputs: f64,
    asmos: &mut [f64; MAX_SOIL_LAYERS],
    field_capacity: &[f64; MAX_SOIL_LAYERS],
    n_layers: usize,
) -> ([f64; MAX_SOIL_LAYERS], f64) {
    let mut amov = [0.0; MAX_SOIL_LAYERS];
    let mut moving = inputs.max(0.0);
    for lyr in 0..n_layers {
        asmos[lyr] += moving;
        if asmos[lyr] > field_capacity[lyr] {
            amov[lyr] = asmos[lyr] - field_capacity[lyr];
            asmos[lyr] = field_capacity[lyr];
            moving = amov[lyr];
        } else {
            moving = 0.0;
        }
    }
    (amov, moving)
}

/// Remove transpiration from each layer in proportion to weighted available water.
///
/// Returns the water actually transpired.
pub fn remove_transpiration(
    asmos: &mut [f64; MAX_SOIL_LAYERS],
    wilting_point: &[f64; MAX_SOIL_LAYERS],
    awtl: &[f64; MAX_SOIL_LAYERS],
    n_layers: usize,
    trap: f64,
) -> f64 {
    let mut available = [0.0; MAX_SOIL_LAYERS];
    let mut weighted = [0.0; MAX_SOIL_LAYERS];
    for lyr in 0..n_layers {
        available[lyr] = (asmos[lyr] - wilting_point[lyr]).max(0.0);
        weighted[lyr] = available[lyr] * awtl[lyr];
    }
    let total: f64 = available[..n_layers].iter().sum();
    let total_weighted: f64 = weighted[..n_layers].iter().sum();
    if total <= 0.0 || total_weighted <= 0.0 {
        return 0.0;
    }

    let trap = trap.min(total);
    let mut removed = 0.0;
    for lyr in 0..n_layers {
        let tran = (trap * weighted[lyr] / total_weighted).min(available[lyr]);
        asmos[lyr] -= tran;
        removed += tran;
    }
    removed
}

/// Evaporation from the top layer, scaled by its relative water content.
///
/// Layer quantities are totals for the layer (cm), not fractions.
pub fn evaporation_loss(asmos_1: f64, field_capacity_1: f64, wilting_point_1: f64, pevp: f64) -> f64 {
    let range = field_capacity_1 - wilting_point_1;
    let rwc = if range > 0.0 {
        ((asmos_1 - wilting_point_1) / range).max(0.0)
    } else {
        0.0
    };
    let evmt = ((rwc - 0.25) / (1.0 - 0.25)).clamp(0.01, 1.0);
    let available = (asmos_1 - wilting_point_1).max(0.0);
    (evmt * pevp).min(pevp).min(available).max(0.0)
}

/// Water available above wilting point, summed over the first `n_layers`.
pub fn available_water(
    asmos: &[f64; MAX_SOIL_LAYERS],
    wilting_point: &[f64; MAX_SOIL_LAYERS],
    n_layers: usize,
) -> f64 {
    (0..n_layers.min(MAX_SOIL_LAYERS))
        .map(|lyr| (asmos[lyr] - wilting_point[lyr]).max(0.0))
        .sum()
}

/// Everything the water balance needs at one pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilWaterPixel {
    pub precip: f64,
    pub tave: f64,
    pub pet: f64,
    pub shwave: f64,
    pub snow: f64,
    pub snlq: f64,
    pub asmos: [f64; MAX_SOIL_LAYERS],
    /// Field capacity per layer (cm)
    pub field_capacity: [f64; MAX_SOIL_LAYERS],
    /// Wilting point per layer (cm)
    pub wilting_point: [f64; MAX_SOIL_LAYERS],
    pub awtl: [f64; MAX_SOIL_LAYERS],
    pub n_layers: usize,
    pub cover: SurfaceCover,
    /// Live shoot biomass (g / m^2)
    pub live_biomass: f64,
}

/// Site parameters used by the water balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterParameters {
    pub tmelt: [f64; 2],
    pub fracro: f64,
    pub precro: f64,
    pub fwloss: [f64; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoilWaterOutcome {
    pub asmos: [f64; MAX_SOIL_LAYERS],
    pub amov: [f64; MAX_SOIL_LAYERS],
    pub snow: f64,
    pub snlq: f64,
    pub snowmelt: f64,
    pub runoff: f64,
    pub drainage: f64,
    pub transpiration: f64,
    pub evaporation: f64,
    /// Available water in the whole profile
    pub avh2o_2: f64,
    /// Available water in the top two layers
    pub avh2o_3: f64,
}

/// Run every stage of the water balance for one month.
pub fn soil_water_month(pixel: &SoilWaterPixel, params: &WaterParameters) -> SoilWaterOutcome {
    let n_layers = pixel.n_layers.clamp(1, MAX_SOIL_LAYERS);
    let snowpack = snow(
        pixel.tave,
        pixel.precip,
        pixel.snow,
        pixel.snlq,
        pixel.pet,
        params.tmelt,
        pixel.shwave,
    );

    let surface = subtract_surface_losses(
        snowpack.inputs,
        snowpack.pet_remaining,
        snowpack.snow > 0.0,
        params.fracro,
        params.precro,
        params.fwloss,
        pixel.cover,
    );

    let trap = potential_transpiration(pixel.tave, surface.pet_remaining, pixel.live_biomass);
    let pevp = (surface.pet_remaining - trap).max(0.0);

    let mut asmos = pixel.asmos;
    let (amov, drainage) =
        distribute_water(surface.inputs, &mut asmos, &pixel.field_capacity, n_layers);

    let transpiration =
        remove_transpiration(&mut asmos, &pixel.wilting_point, &pixel.awtl, n_layers, trap);

    let evlos = evaporation_loss(
        asmos[0],
        pixel.field_capacity[0],
        pixel.wilting_point[0],
        pevp,
    );
    asmos[0] -= evlos;

    SoilWaterOutcome {
        avh2o_2: available_water(&asmos, &pixel.wilting_point, n_layers),
        avh2o_3: available_water(&asmos, &pixel.wilting_point, n_layers.min(2)),
        asmos,
        amov,
        snow: snowpack.snow,
        snlq: snowpack.snlq,
        snowmelt: snowpack.snowmelt,
        runoff: surface.runoff,
        drainage,
        transpiration,
        evaporation: snowpack.sublimation + surface.evaporation + evlos,
    }
}
