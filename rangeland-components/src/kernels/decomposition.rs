//! Monthly decomposition of litter and soil organic matter at one pixel.
//!
//! Each sub-step applies the pool-pair transfers in a fixed order, threading
//! a [`MineralContext`] through them so that later steps see the mineral
//! nutrient released or immobilized by earlier ones. Phosphorus geochemistry
//! closes each sub-step. Leaching and volatilization are applied once after
//! the last sub-step.

use super::flows::{declig, proportional_move, schedule_transfer, Destination, MineralContext, Pool};
use super::plant::LitterPools;
use super::ratios::{agdrat, bgdrat, fsfunc, rnewas_som2};
use rangeland_core::tables::SiteParameters;
use rangeland_core::variable::{Element, MAX_SOIL_LAYERS};

/// Length of one decomposition sub-step (years).
pub const DECOMPOSITION_TIMESTEP: f64 = 1.0 / 48.0;

/// Precipitation above which N deposition no longer increases (cm).
const DEPOSITION_PRECIP_CAP: f64 = 80.0;

const SURFACE: usize = 0;
const SOIL: usize = 1;
const N: usize = 0;
const P: usize = 1;

/// Every pool decomposition reads or writes at one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SoilOrganicPools {
    pub litter: LitterPools,
    pub som1: [Pool; 2],
    pub som2: [Pool; 2],
    pub som3: Pool,
    /// Mineral N and P by soil layer
    pub minerl: [[f64; 2]; MAX_SOIL_LAYERS],
    pub parent_p: f64,
    pub secondary_p: f64,
    pub occluded_p: f64,
}

/// Time-invariant site quantities derived from soil properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteFactors {
    pub eftext: f64,
    pub p1co2_2: f64,
    pub fps1s3: f64,
    pub fps2s3: f64,
    pub orglch: f64,
    pub vlossg: f64,
    pub pheff_struc: f64,
    pub pheff_metab: f64,
    /// Mineral leaching fraction per element
    pub fleach: [f64; 2],
    /// C:E ratios for surface structural material entering SOM1 and SOM2,
    /// indexed `[element][receiver]`
    pub rnewas: [[f64; 2]; 2],
    /// Same for soil structural material
    pub rnewbs: [[f64; 2]; 2],
}

impl SiteFactors {
    fn structural_ratios(table: &[[f64; 2]; 2], receiver: usize) -> [f64; 2] {
        [table[N][receiver], table[P][receiver]]
    }
}

/// Weather and water for the month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecompositionDrivers {
    pub defac: f64,
    pub anerb: f64,
    pub precip: f64,
    pub annual_precip: f64,
    /// Water moving out of each soil layer
    pub amov: [f64; MAX_SOIL_LAYERS],
    pub n_layers: usize,
}

/// Fluxes accumulated over the month.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecompositionSummary {
    pub co2: f64,
    pub gromin: f64,
    pub deposition: f64,
    pub volatilized: f64,
    pub leached_organic_c: f64,
    /// Mineral nutrient leached below the last layer
    pub leached_mineral: [f64; 2],
}

/// Wet N deposition for the month (g / m^2).
pub fn n_deposition(epnfa: [f64; 2], precip: f64, annual_precip: f64) -> f64 {
    if annual_precip <= 0.0 {
        return 0.0;
    }
    let annual = epnfa[0] + epnfa[1] * annual_precip.min(DEPOSITION_PRECIP_CAP);
    (annual * precip / annual_precip).max(0.0)
}

/// Leaching intensity from the water leaving a layer.
fn leaching_intensity(threshold: f64, amov: f64) -> f64 {
    if amov <= 0.0 || threshold <= 0.0 {
        return 0.0;
    }
    (1.0 - (threshold - amov) / threshold).clamp(0.0, 1.0)
}

/// Run the ordered pool-pair transfers for one sub-step.
fn decompose_step(
    pools: &mut SoilOrganicPools,
    site: &SiteParameters,
    factors: &SiteFactors,
    drivers: &DecompositionDrivers,
    summary: &mut DecompositionSummary,
) {
    let dtm = DECOMPOSITION_TIMESTEP;
    let defac = drivers.defac;
    let anerb = drivers.anerb;
    let fsol = fsfunc(pools.minerl[0][P], site.pslsrb, site.sorpmx);
    let mut ctx = MineralContext::new(pools.minerl[0], fsol);

    let rnewas_som1 = SiteFactors::structural_ratios(&factors.rnewas, 0);
    let rnewas_som2_ratio = SiteFactors::structural_ratios(&factors.rnewas, 1);
    let rnewbs_som1 = SiteFactors::structural_ratios(&factors.rnewbs, 0);
    let rnewbs_som2 = SiteFactors::structural_ratios(&factors.rnewbs, 1);

    // structural litter, surface then soil
    for (depth, rate, pligst, strmax, ps1co2, anaerobic, som1_ratio, som2_ratio) in [
        (SURFACE, site.dec1_1, site.pligst_1, site.strmax_1, site.ps1co2_1, 1.0, rnewas_som1, rnewas_som2_ratio),
        (SOIL, site.dec1_2, site.pligst_2, site.strmax_2, site.ps1co2_2, anerb, rnewbs_som1, rnewbs_som2),
    ] {
        let donor = pools.litter.structural[depth];
        let lignin = pools.litter.strlig[depth];
        let tcflow = (donor.c.min(strmax)
            * defac
            * rate
            * (-pligst * lignin).exp()
            * anaerobic
            * dtm
            * factors.pheff_struc)
            .min(donor.c);
        if let Some(transfer) = declig(
            &ctx, &donor, lignin, tcflow, site.rsplig, ps1co2, som1_ratio, som2_ratio,
        ) {
            let mut donor = donor;
            transfer.apply(
                &mut donor,
                [&mut pools.som1[depth], &mut pools.som2[depth]],
                &mut ctx,
            );
            pools.litter.structural[depth] = donor;
            summary.co2 += transfer.co2;
        }
    }

    // metabolic litter to SOM1
    {
        let donor = pools.litter.metabolic[SURFACE];
        let tcflow = (donor.c * defac * site.dec2_1 * dtm * factors.pheff_metab).min(donor.c);
        let ratio = Element::ALL.map(|e| agdrat(donor.e[e.index()], donor.c, site.pcemic1(e)));
        let co2 = tcflow * site.pmco2_1;
        let destination = Destination { c: tcflow - co2, ratio };
        if let Some(transfer) = schedule_transfer(&ctx, &donor, tcflow, co2, 0.0, [destination]) {
            let mut donor = donor;
            transfer.apply(&mut donor, [&mut pools.som1[SURFACE]], &mut ctx);
            pools.litter.metabolic[SURFACE] = donor;
            summary.co2 += co2;
        }
    }
    {
        let donor = pools.litter.metabolic[SOIL];
        let tcflow = (donor.c * defac * site.dec2_2 * anerb * dtm * factors.pheff_metab).min(donor.c);
        let ratio = Element::ALL.map(|e| bgdrat(ctx.aminrl[e.index()], site.varat1(e)));
        let co2 = tcflow * site.pmco2_2;
        let destination = Destination { c: tcflow - co2, ratio };
        if let Some(transfer) = schedule_transfer(&ctx, &donor, tcflow, co2, 0.0, [destination]) {
            let mut donor = donor;
            transfer.apply(&mut donor, [&mut pools.som1[SOIL]], &mut ctx);
            pools.litter.metabolic[SOIL] = donor;
            summary.co2 += co2;
        }
    }

    // surface SOM1 to surface SOM2
    {
        let donor = pools.som1[SURFACE];
        let ratio = Element::ALL.map(|e| {
            donor
                .ratio(e)
                .map(|current| rnewas_som2(current, site.rad1p(e), site.pcemic1(e)[1]))
        });
        if let [Some(ratio_n), Some(ratio_p)] = ratio {
            let tcflow = (donor.c * defac * site.dec3_1 * dtm).min(donor.c);
            let co2 = tcflow * site.p1co2_1;
            let destination = Destination {
                c: tcflow - co2,
                ratio: [ratio_n, ratio_p],
            };
            if let Some(transfer) = schedule_transfer(&ctx, &donor, tcflow, co2, 0.0, [destination]) {
                let mut donor = donor;
                transfer.apply(&mut donor, [&mut pools.som2[SURFACE]], &mut ctx);
                pools.som1[SURFACE] = donor;
                summary.co2 += co2;
            }
        }
    }

    // soil SOM1 to SOM2 and SOM3, with organic leaching
    {
        let donor = pools.som1[SOIL];
        let tcflow = (donor.c * defac * site.dec3_2 * factors.eftext * anerb * dtm).min(donor.c);
        let co2 = tcflow * factors.p1co2_2;
        let linten = leaching_intensity(site.omlech_3, drivers.amov[1]);
        let leached = (tcflow * factors.orglch * linten).min((tcflow - co2).max(0.0));
        let netc = tcflow - co2 - leached;
        let to_som3 = (netc * factors.fps1s3 * (1.0 + site.animpt * (1.0 - anerb))).max(0.0).min(netc.max(0.0));
        let to_som2 = netc - to_som3;
        let som2_ratio = Element::ALL.map(|e| bgdrat(ctx.aminrl[e.index()], site.varat22(e)));
        let som3_ratio = Element::ALL.map(|e| bgdrat(ctx.aminrl[e.index()], site.varat3(e)));
        let destinations = [
            Destination {
                c: to_som2,
                ratio: som2_ratio,
            },
            Destination {
                c: to_som3,
                ratio: som3_ratio,
            },
        ];
        if let Some(transfer) = schedule_transfer(&ctx, &donor, tcflow, co2, leached, destinations) {
            let mut donor = donor;
            transfer.apply(&mut donor, [&mut pools.som2[SOIL], &mut pools.som3], &mut ctx);
            pools.som1[SOIL] = donor;
            summary.co2 += co2;
            summary.leached_organic_c += transfer.leached_c;
        }
    }

    // surface SOM2 to surface SOM1, then mixing into soil SOM2
    {
        let donor = pools.som2[SURFACE];
        let tcflow = (donor.c * defac * site.dec5_1 * dtm).min(donor.c);
        let ratio = Element::ALL.map(|e| agdrat(donor.e[e.index()], donor.c, site.pcemic2(e)));
        let co2 = tcflow * site.p2co2_1;
        let destination = Destination { c: tcflow - co2, ratio };
        if let Some(transfer) = schedule_transfer(&ctx, &donor, tcflow, co2, 0.0, [destination]) {
            let mut donor = donor;
            transfer.apply(&mut donor, [&mut pools.som1[SURFACE]], &mut ctx);
            pools.som2[SURFACE] = donor;
            summary.co2 += co2;
        }

        let mixed = proportional_move(&pools.som2[SURFACE], site.cmix * defac * dtm);
        let [surface, soil] = &mut pools.som2;
        surface.c -= mixed.c;
        soil.c += mixed.c;
        for e in 0..2 {
            surface.e[e] -= mixed.e[e];
            soil.e[e] += mixed.e[e];
        }
    }

    // soil SOM2 to soil SOM1 and SOM3
    {
        let donor = pools.som2[SOIL];
        let tcflow = (donor.c * defac * site.dec5_2 * anerb * dtm).min(donor.c);
        let co2 = tcflow * site.p2co2_2;
        let netc = tcflow - co2;
        let to_som3 = (netc * factors.fps2s3 * (1.0 + site.animpt * (1.0 - anerb))).max(0.0).min(netc.max(0.0));
        let to_som1 = netc - to_som3;
        let som1_ratio = Element::ALL.map(|e| bgdrat(ctx.aminrl[e.index()], site.varat1(e)));
        let som3_ratio = Element::ALL.map(|e| bgdrat(ctx.aminrl[e.index()], site.varat3(e)));
        let destinations = [
            Destination {
                c: to_som1,
                ratio: som1_ratio,
            },
            Destination {
                c: to_som3,
                ratio: som3_ratio,
            },
        ];
        if let Some(transfer) = schedule_transfer(&ctx, &donor, tcflow, co2, 0.0, destinations) {
            let mut donor = donor;
            transfer.apply(&mut donor, [&mut pools.som1[SOIL], &mut pools.som3], &mut ctx);
            pools.som2[SOIL] = donor;
            summary.co2 += co2;
        }
    }

    // SOM3 to soil SOM1
    {
        let donor = pools.som3;
        let tcflow = (donor.c * defac * site.dec4 * anerb * dtm * factors.pheff_struc).min(donor.c);
        let co2 = tcflow * site.p3co2;
        let ratio = Element::ALL.map(|e| bgdrat(ctx.aminrl[e.index()], site.varat1(e)));
        let destination = Destination { c: tcflow - co2, ratio };
        if let Some(transfer) = schedule_transfer(&ctx, &donor, tcflow, co2, 0.0, [destination]) {
            let mut donor = donor;
            transfer.apply(&mut donor, [&mut pools.som1[SOIL]], &mut ctx);
            pools.som3 = donor;
            summary.co2 += co2;
        }
    }

    pools.minerl[0] = ctx.minerl;
    summary.gromin += ctx.gromin[N];

    phosphorus_chemistry(pools, site, defac, fsol, dtm);
}

/// Exchange of P among parent, secondary, occluded and surface mineral pools.
pub fn phosphorus_chemistry(pools: &mut SoilOrganicPools, site: &SiteParameters, defac: f64, fsol: f64, dtm: f64) {
    let weathered = (pools.parent_p * site.pparmn_2 * defac * dtm).clamp(0.0, pools.parent_p.max(0.0));
    pools.parent_p -= weathered;
    pools.minerl[0][P] += weathered;

    let released = (pools.secondary_p * site.psecmn_2 * defac * dtm).clamp(0.0, pools.secondary_p.max(0.0));
    pools.secondary_p -= released;
    pools.minerl[0][P] += released;

    if pools.minerl[0][P] > 0.0 {
        let sorbed = (site.pmnsec_2 * pools.minerl[0][P] * (1.0 - fsol) * defac * dtm)
            .clamp(0.0, pools.minerl[0][P].max(0.0));
        pools.minerl[0][P] -= sorbed;
        pools.secondary_p += sorbed;
    }

    let occluded = (site.psecoc1 * pools.secondary_p * defac * dtm).clamp(0.0, pools.secondary_p.max(0.0));
    pools.secondary_p -= occluded;
    pools.occluded_p += occluded;

    let freed = (site.psecoc2 * pools.occluded_p * defac * dtm).clamp(0.0, pools.occluded_p.max(0.0));
    pools.occluded_p -= freed;
    pools.secondary_p += freed;
}

/// Move mineral nutrient down the profile with draining water.
///
/// Returns what leaves the bottom of the last layer.
pub fn leach_mineral(
    minerl: &mut [[f64; 2]; MAX_SOIL_LAYERS],
    amov: &[f64; MAX_SOIL_LAYERS],
    n_layers: usize,
    fleach: [f64; 2],
    minlch: f64,
) -> [f64; 2] {
    let n_layers = n_layers.min(MAX_SOIL_LAYERS);
    let mut lost = [0.0; 2];
    for lyr in 0..n_layers {
        let linten = leaching_intensity(minlch, amov[lyr]);
        if linten <= 0.0 {
            continue;
        }
        for e in 0..2 {
            if minerl[lyr][e] <= 0.0 {
                continue;
            }
            let strm = minerl[lyr][e] * linten * fleach[e].clamp(0.0, 1.0);
            minerl[lyr][e] -= strm;
            if lyr + 1 < n_layers {
                minerl[lyr + 1][e] += strm;
            } else {
                lost[e] += strm;
            }
        }
    }
    lost
}

/// Decompose one month at one pixel.
pub fn decompose_month(
    pools: &mut SoilOrganicPools,
    site: &SiteParameters,
    factors: &SiteFactors,
    drivers: &DecompositionDrivers,
    iterations: usize,
) -> DecompositionSummary {
    let mut summary = DecompositionSummary::default();

    let deposition = n_deposition([site.epnfa_1, site.epnfa_2], drivers.precip, drivers.annual_precip);
    pools.minerl[0][N] += deposition;
    summary.deposition = deposition;

    for _ in 0..iterations.max(1) {
        decompose_step(pools, site, factors, drivers, &mut summary);
    }

    summary.leached_mineral = leach_mineral(
        &mut pools.minerl,
        &drivers.amov,
        drivers.n_layers,
        factors.fleach,
        site.minlch,
    );

    let volatilized = (factors.vlossg * summary.gromin).clamp(0.0, pools.minerl[0][N].max(0.0));
    pools.minerl[0][N] -= volatilized;
    summary.volatilized = volatilized;

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    pub(crate) fn factors() -> SiteFactors {
        SiteFactors {
            eftext: 0.5,
            p1co2_2: 0.4,
            fps1s3: 0.01,
            fps2s3: 0.005,
            orglch: 0.07,
            vlossg: 0.01,
            pheff_struc: 0.9,
            pheff_metab: 0.8,
            fleach: [0.4, 0.04],
            rnewas: [[15.0, 25.0], [150.0, 200.0]],
            rnewbs: [[18.0, 20.0], [150.0, 400.0]],
        }
    }

    pub(crate) fn pools() -> SoilOrganicPools {
        let mut pools = SoilOrganicPools {
            litter: LitterPools {
                structural: [Pool::new(120.0, 0.6, 0.1), Pool::new(150.0, 0.75, 0.12)],
                metabolic: [Pool::new(30.0, 1.5, 0.2), Pool::new(40.0, 2.0, 0.25)],
                strlig: [0.25, 0.3],
            },
            som1: [Pool::new(10.0, 1.0, 0.1), Pool::new(60.0, 6.0, 0.5)],
            som2: [Pool::new(50.0, 2.5, 0.3), Pool::new(900.0, 45.0, 4.0)],
            som3: Pool::new(600.0, 60.0, 5.0),
            minerl: [[0.0; 2]; MAX_SOIL_LAYERS],
            parent_p: 50.0,
            secondary_p: 20.0,
            occluded_p: 10.0,
        };
        for layer in pools.minerl.iter_mut().take(4) {
            *layer = [2.0, 1.0];
        }
        pools
    }

    fn drivers() -> DecompositionDrivers {
        DecompositionDrivers {
            defac: 0.6,
            anerb: 1.0,
            precip: 5.0,
            annual_precip: 40.0,
            amov: [0.0; MAX_SOIL_LAYERS],
            n_layers: 4,
        }
    }

    fn total_c(pools: &SoilOrganicPools) -> f64 {
        pools.litter.structural.iter().map(|p| p.c).sum::<f64>()
            + pools.litter.metabolic.iter().map(|p| p.c).sum::<f64>()
            + pools.som1.iter().map(|p| p.c).sum::<f64>()
            + pools.som2.iter().map(|p| p.c).sum::<f64>()
            + pools.som3.c
    }

    fn total_n(pools: &SoilOrganicPools) -> f64 {
        pools.litter.structural.iter().map(|p| p.e[0]).sum::<f64>()
            + pools.litter.metabolic.iter().map(|p| p.e[0]).sum::<f64>()
            + pools.som1.iter().map(|p| p.e[0]).sum::<f64>()
            + pools.som2.iter().map(|p| p.e[0]).sum::<f64>()
            + pools.som3.e[0]
            + pools.minerl.iter().map(|l| l[0]).sum::<f64>()
    }

    #[test]
    fn deposition_scales_with_monthly_share() {
        assert_abs_diff_eq!(n_deposition([0.21, 0.0028], 10.0, 40.0), (0.21 + 0.112) / 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            n_deposition([0.21, 0.0028], 10.0, 100.0),
            (0.21 + 0.224) / 10.0,
            epsilon = 1e-12
        );
        assert_eq!(n_deposition([0.21, 0.0028], 10.0, 0.0), 0.0);
    }

    #[test]
    fn carbon_is_conserved_up_to_respiration() {
        let site = SiteParameters::default();
        let mut p = pools();
        let before = total_c(&p);
        let summary = decompose_month(&mut p, &site, &factors(), &drivers(), 1);
        assert!(summary.co2 > 0.0);
        assert_abs_diff_eq!(total_c(&p) + summary.co2 + summary.leached_organic_c, before, epsilon = 1e-8);
    }

    #[test]
    fn nitrogen_is_conserved_up_to_external_fluxes() {
        let site = SiteParameters::default();
        let mut p = pools();
        let before = total_n(&p);
        let summary = decompose_month(&mut p, &site, &factors(), &drivers(), 4);
        let external = summary.deposition - summary.volatilized - summary.leached_mineral[0];
        // organic leaching carries nutrient too; none here because nothing drains
        assert_abs_diff_eq!(total_n(&p), before + external, epsilon = 1e-8);
        assert!(summary.gromin > 0.0);
    }

    #[test]
    fn respiration_above_one_does_not_panic() {
        let site = SiteParameters {
            p2co2_2: 1.2,
            ..Default::default()
        };
        let factors = SiteFactors {
            p1co2_2: 1.3,
            ..factors()
        };
        let mut p = pools();
        let before = total_c(&p);
        let summary = decompose_month(&mut p, &site, &factors, &drivers(), 4);
        assert!(summary.co2.is_finite() && summary.co2 > 0.0);
        assert!(p.som3.c.is_finite());
        assert_abs_diff_eq!(total_c(&p) + summary.co2 + summary.leached_organic_c, before, epsilon = 1e-8);
    }

    #[test]
    fn pools_stay_non_negative() {
        let site = SiteParameters::default();
        let mut p = pools();
        let mut d = drivers();
        d.defac = 2.0;
        d.amov = [3.0; MAX_SOIL_LAYERS];
        for _ in 0..24 {
            decompose_month(&mut p, &site, &factors(), &d, 4);
        }
        assert!(total_c(&p) > 0.0);
        for pool in p.som1.iter().chain(p.som2.iter()).chain([p.som3].iter()) {
            assert!(pool.c >= 0.0 && pool.e[0] >= 0.0 && pool.e[1] >= 0.0);
        }
        assert!(p.minerl.iter().all(|l| l[0] >= 0.0 && l[1] >= 0.0));
    }

    #[test]
    fn mineral_leaching_moves_nutrient_down() {
        let mut minerl = [[0.0; 2]; MAX_SOIL_LAYERS];
        minerl[0] = [2.0, 1.0];
        let mut amov = [0.0; MAX_SOIL_LAYERS];
        amov[0] = 9.0;
        amov[1] = 18.0;
        let lost = leach_mineral(&mut minerl, &amov, 2, [0.5, 0.1], 18.0);
        // half intensity in layer 1, full intensity in layer 2
        assert_abs_diff_eq!(minerl[0][0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(minerl[1][0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(lost[0], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn weathering_feeds_mineral_p() {
        let site = SiteParameters {
            pparmn_2: 0.5,
            ..Default::default()
        };
        let mut p = pools();
        let before = p.parent_p + p.secondary_p + p.occluded_p + p.minerl[0][P];
        phosphorus_chemistry(&mut p, &site, 1.0, 0.5, DECOMPOSITION_TIMESTEP);
        assert!(p.parent_p < 50.0);
        let after = p.parent_p + p.secondary_p + p.occluded_p + p.minerl[0][P];
        assert_abs_diff_eq!(before, after, epsilon = 1e-12);
    }
}
