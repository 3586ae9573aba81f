//! Plant pools through one month: grazing offtake, growth, death and
//! litterfall.

use super::flows::Pool;
use super::production::{
    biof, calc_provisional_fracrc, calc_revised_fracrc, grazing_effect_on_aboveground_production,
    grazing_effect_on_root_shoot, h2ogef, nutrient_demand, nutrient_limitation, potential_production,
    potprd, root_intensity, surface_temperature, take_up_from_layers, available_nutrient,
    TissueRatios,
};
use super::ratios::{favail_p, BIOMASS_PER_CARBON};
use rangeland_core::tables::{PftParameters, SiteParameters};
use rangeland_core::variable::{Element, MAX_SOIL_LAYERS};

/// Days in an average month.
const DAYS_PER_MONTH: f64 = 30.4;
/// Largest fraction of live shoots dying in one month.
const MAX_SHOOT_DEATH: f64 = 0.95;

/// Live and standing dead pools of one PFT.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlantPools {
    pub aglive: Pool,
    pub bglive: Pool,
    pub stdead: Pool,
}

/// Surface (index 0) and soil (index 1) litter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LitterPools {
    pub structural: [Pool; 2],
    pub metabolic: [Pool; 2],
    /// Lignin fraction of structural litter
    pub strlig: [f64; 2],
}

/// Lignin fraction of dead shoots and roots, from annual precipitation.
pub fn lignin_fractions(pft: &PftParameters, annual_precip: f64) -> [f64; 2] {
    [
        (pft.fligni_1_1 + pft.fligni_2_1 * annual_precip).clamp(0.02, 0.5),
        (pft.fligni_1_2 + pft.fligni_2_2 * annual_precip).clamp(0.02, 0.5),
    ]
}

/// Partition dead plant material between structural and metabolic litter.
///
/// `cpart` is the carbon added, `recres` its E:C ratios, `frlign` its
/// lignin fraction and `depth` 0 for surface or 1 for soil. All lignin goes
/// to structural litter, whose nutrient content is capped by `rcestr`.
pub fn partit(
    litter: &mut LitterPools,
    site: &SiteParameters,
    depth: usize,
    cpart: f64,
    recres: [f64; 2],
    frlign: f64,
) {
    if cpart < 1e-7 {
        return;
    }
    let n_fraction = recres[Element::Nitrogen.index()] * BIOMASS_PER_CARBON;
    let frmet = if n_fraction > 0.0 {
        site.spl_1 - site.spl_2 * frlign / n_fraction
    } else {
        0.0
    };
    let mut frmet = frmet.max(0.2);
    if frlign > 1.0 - frmet {
        frmet = 1.0 - frlign;
    }
    let frmet = frmet.clamp(0.0, 1.0);

    let caddm = cpart * frmet;
    let cadds = cpart - caddm;

    let structural = &mut litter.structural[depth];
    let old_c = structural.c;
    let new_c = old_c + cadds;
    if new_c > 0.0 {
        let lignin = litter.strlig[depth] * old_c + frlign * cpart;
        litter.strlig[depth] = (lignin / new_c).clamp(0.0, 1.0);
    }
    structural.c = new_c;

    for element in Element::ALL {
        let e = element.index();
        let total = cpart * recres[e];
        let rcestr = site.rcestr(element);
        let to_structural = if rcestr > 0.0 {
            total.min(cadds / rcestr)
        } else {
            0.0
        };
        litter.structural[depth].e[e] += to_structural;
        litter.metabolic[depth].e[e] += total - to_structural;
    }
    litter.metabolic[depth].c += caddm;
}

/// E:C ratios of a pool, zero where the pool holds no carbon.
fn residue_ratios(pool: &Pool) -> [f64; 2] {
    if pool.c > 0.0 {
        [pool.e[0] / pool.c, pool.e[1] / pool.c]
    } else {
        [0.0, 0.0]
    }
}

/// Move `fraction` of `pool` out and return what moved.
fn remove_fraction(pool: &mut Pool, fraction: f64) -> Pool {
    let fraction = fraction.clamp(0.0, 1.0);
    let moved = Pool {
        c: pool.c * fraction,
        e: [pool.e[0] * fraction, pool.e[1] * fraction],
    };
    pool.c -= moved.c;
    pool.e[0] -= moved.e[0];
    pool.e[1] -= moved.e[1];
    moved
}

/// Fraction of shoot biomass removed by grazing this month.
///
/// `density` is animals / ha, `intake` kg dry matter per animal per day and
/// `available` the shoot biomass on offer (g / m^2).
pub fn fraction_removed(density: f64, intake: f64, available: f64, max_removal: f64) -> f64 {
    if available <= 0.0 || density <= 0.0 {
        return 0.0;
    }
    // kg / ha / month to g / m^2 / month
    let demand = density * intake * DAYS_PER_MONTH * 1000.0 / 10000.0;
    (demand / available).min(max_removal).clamp(0.0, 1.0)
}

/// Remove grazed shoots and return a share of their nutrients to the
/// surface mineral pool. Returns the carbon removed.
pub fn grazing_offtake(
    plant: &mut PlantPools,
    minerl_surface: &mut [f64; 2],
    flgrem: f64,
    site: &SiteParameters,
) -> f64 {
    if flgrem <= 0.0 {
        return 0.0;
    }
    let live = remove_fraction(&mut plant.aglive, flgrem);
    let dead = remove_fraction(&mut plant.stdead, flgrem);
    for element in Element::ALL {
        let e = element.index();
        minerl_surface[e] += site.gret(element) * (live.e[e] + dead.e[e]);
    }
    live.c + dead.c
}

/// Fraction of live shoots dying this month.
pub fn shoot_death_fraction(pft: &PftParameters, avh2o: f64, deck5: f64, month: u32, aglivc: f64) -> f64 {
    let dryness = if deck5 + avh2o > 0.0 {
        1.0 - avh2o / (deck5 + avh2o)
    } else {
        1.0
    };
    let mut fdeth = pft.fsdeth_1 * dryness;
    if pft.senescence_month.round() as i64 == month as i64 {
        fdeth += pft.fsdeth_2;
    }
    if aglivc * BIOMASS_PER_CARBON > pft.fsdeth_4 {
        fdeth += pft.fsdeth_3;
    }
    fdeth.clamp(0.0, MAX_SHOOT_DEATH)
}

/// Fraction of live roots dying this month.
pub fn root_death_fraction(pft: &PftParameters, avh2o: f64, deck5: f64) -> f64 {
    let dryness = if deck5 + avh2o > 0.0 {
        1.0 - avh2o / (deck5 + avh2o)
    } else {
        1.0
    };
    (pft.rdr * dryness).clamp(0.0, 1.0)
}

/// Shoot death, standing dead fall and root death, with litter partitioning.
pub fn senescence(
    plant: &mut PlantPools,
    litter: &mut LitterPools,
    pft: &PftParameters,
    site: &SiteParameters,
    avh2o: f64,
    month: u32,
    annual_precip: f64,
) {
    let lignin = lignin_fractions(pft, annual_precip);

    let fdeth = shoot_death_fraction(pft, avh2o, site.deck5, month, plant.aglive.c);
    let dead_shoots = remove_fraction(&mut plant.aglive, fdeth);
    plant.stdead.c += dead_shoots.c;
    plant.stdead.e[0] += dead_shoots.e[0];
    plant.stdead.e[1] += dead_shoots.e[1];

    let fallen = remove_fraction(&mut plant.stdead, pft.fallrt);
    partit(litter, site, 0, fallen.c, residue_ratios(&fallen), lignin[0]);

    let dead_roots = remove_fraction(&mut plant.bglive, root_death_fraction(pft, avh2o, site.deck5));
    partit(litter, site, 1, dead_roots.c, residue_ratios(&dead_roots), lignin[1]);
}

/// Weather and water shared by every PFT in a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthEnvironment {
    pub month: u32,
    pub precip: f64,
    pub annual_precip: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub pet: f64,
    pub shwave: f64,
    /// Difference between field capacity and wilting point of the top layer
    pub wc: f64,
    /// Available water in the whole profile
    pub avh2o_2: f64,
}

/// Summary of one PFT's month.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrowthSummary {
    /// Total production (g biomass / m^2)
    pub tgprod: f64,
    /// Root fraction of production
    pub fracrc: f64,
    pub uptake: [f64; 2],
    /// Carbon removed by grazing
    pub grazed: f64,
}

/// One PFT's month: offtake, production, uptake and senescence.
///
/// `minerl` and `litter` are shared with the other PFTs of the pixel and are
/// updated in place.
#[allow(clippy::too_many_arguments)]
pub fn grow(
    plant: &mut PlantPools,
    minerl: &mut [[f64; 2]; MAX_SOIL_LAYERS],
    litter: &mut LitterPools,
    pft: &PftParameters,
    site: &SiteParameters,
    env: &GrowthEnvironment,
    cover: f64,
    avh2o_1: f64,
    flgrem: f64,
) -> GrowthSummary {
    let grazed = grazing_offtake(plant, &mut minerl[0], flgrem, site);

    // potential production
    let ctemp = surface_temperature(
        env.min_temp,
        env.max_temp,
        plant.aglive.c,
        plant.stdead.c,
        pft.pmxbio,
        pft.pmxtmp,
        pft.pmntmp,
    );
    let temperature = potprd(ctemp, [pft.ppdf_1, pft.ppdf_2, pft.ppdf_3, pft.ppdf_4]);
    let water = h2ogef(
        avh2o_1,
        env.precip,
        env.pet,
        env.wc,
        [pft.pprpts_1, pft.pprpts_2, pft.pprpts_3],
    );
    let shading = biof(
        plant.aglive.c,
        plant.stdead.c,
        litter.structural[0].c,
        pft.pmxbio,
        pft.biok5,
    );
    let tgprod_pot = potential_production(pft.prdx_1, env.shwave, temperature, water, shading, cover);

    // root allocation
    let ratios = TissueRatios::new(pft, plant.aglive.c, env.annual_precip);
    let fracrc_p = calc_provisional_fracrc(env.annual_precip, pft);
    let rimpct = root_intensity(plant.bglive.c, pft.riint, pft.rictrl);
    let nlaypg = pft.nlaypg();
    let favail = [
        site.favail_1,
        favail_p(minerl[0][Element::Phosphorus.index()], site.favail_4, site.favail_5, site.favail_6),
    ];
    let cprod_pot = tgprod_pot / BIOMASS_PER_CARBON;
    let max_fixation = pft.snfxmx_1 * cprod_pot;
    let mut eavail = Element::ALL
        .map(|e| available_nutrient(minerl, e, nlaypg, favail[e.index()], rimpct, cover));
    eavail[Element::Nitrogen.index()] += max_fixation;

    let demand = nutrient_demand(cprod_pot, fracrc_p, &ratios);
    let supply_ratio = Element::ALL.map(|e| {
        let d = demand[e.index()];
        if d > 0.0 {
            eavail[e.index()] / d
        } else {
            1.0
        }
    });
    let fracrc_r = calc_revised_fracrc(fracrc_p, water, supply_ratio, pft);

    // grazing response
    let grzeff = pft.grazing_effect();
    let agprod = grazing_effect_on_aboveground_production(tgprod_pot, fracrc_r, flgrem, grzeff);
    let rtsh = grazing_effect_on_root_shoot(fracrc_r, flgrem, grzeff, pft.gremb);
    let (tgprod, fracrc) = if rtsh >= f64::MAX {
        (tgprod_pot, 1.0)
    } else {
        (agprod * (1.0 + rtsh), rtsh / (1.0 + rtsh))
    };

    // nutrient limitation and uptake
    let limited = nutrient_limitation(tgprod / BIOMASS_PER_CARBON, fracrc, eavail, max_fixation, &ratios);
    for element in Element::ALL {
        let mut from_soil = limited.uptake[element.index()];
        if element == Element::Nitrogen {
            from_soil -= limited.fixation;
        }
        take_up_from_layers(minerl, element, nlaypg, from_soil);
    }

    let above_c = limited.cprodl * (1.0 - fracrc);
    let below_c = limited.cprodl * fracrc;
    plant.aglive.c += above_c;
    plant.bglive.c += below_c;
    for element in Element::ALL {
        let e = element.index();
        let above_weight = if ratios.above_min[e] > 0.0 {
            (1.0 - fracrc) / ratios.above_min[e]
        } else {
            0.0
        };
        let below_weight = if ratios.below_min[e] > 0.0 {
            fracrc / ratios.below_min[e]
        } else {
            0.0
        };
        let total = above_weight + below_weight;
        if total > 0.0 {
            plant.aglive.e[e] += limited.uptake[e] * above_weight / total;
            plant.bglive.e[e] += limited.uptake[e] * below_weight / total;
        }
    }

    senescence(plant, litter, pft, site, env.avh2o_2, env.month, env.annual_precip);

    GrowthSummary {
        tgprod: limited.cprodl * BIOMASS_PER_CARBON,
        fracrc,
        uptake: limited.uptake,
        grazed,
    }
}
