//! Scheduling of carbon and nutrient flows between organic pools.
//!
//! Every decomposition step moves carbon out of a donor pool into one or two
//! receivers, respiring part of it. The nutrient that travels with the carbon
//! is scheduled by [`esched`]: surplus nutrient is mineralized, a shortfall is
//! immobilized from the mineral pool. When the mineral pool cannot cover an
//! immobilization the whole step is blocked, for both elements.

use rangeland_core::variable::Element;

/// Carbon and nutrient content of one organic pool (g / m^2).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pool {
    pub c: f64,
    /// Nitrogen and phosphorus, indexed by [`Element::index`]
    pub e: [f64; 2],
}

impl Pool {
    pub fn new(c: f64, n: f64, p: f64) -> Self {
        Self { c, e: [n, p] }
    }

    /// C:E ratio, or `None` when the pool holds no nutrient.
    pub fn ratio(&self, element: Element) -> Option<f64> {
        let e = self.e[element.index()];
        if e > 0.0 {
            Some(self.c / e)
        } else {
            None
        }
    }
}

/// Result of scheduling the nutrient that accompanies a carbon flow.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NutrientFlow {
    /// Removed from the donor pool
    pub from_donor: f64,
    /// Added to the receiving pool
    pub to_receiver: f64,
    /// Net flow to the mineral pool, negative when immobilizing
    pub to_mineral: f64,
    /// Immobilization was needed but the mineral pool could not supply it
    pub blocked: bool,
}

/// Schedule the nutrient flow accompanying `cflow` of carbon.
///
/// - `tca`: total carbon in the donor
/// - `rcetob`: C:E ratio required by the receiver
/// - `anps`: nutrient content of the donor
/// - `labile`: nutrient in the mineral pool that can be immobilized
pub fn esched(cflow: f64, tca: f64, rcetob: f64, anps: f64, labile: f64) -> NutrientFlow {
    if cflow <= 0.0 || tca <= 0.0 {
        return NutrientFlow::default();
    }
    if rcetob <= 0.0 {
        return NutrientFlow {
            blocked: true,
            ..Default::default()
        };
    }
    let outofa = anps * (cflow / tca);
    let required = cflow / rcetob;
    if required > outofa {
        let immflo = required - outofa;
        if labile - immflo > 0.0 {
            NutrientFlow {
                from_donor: outofa,
                to_receiver: outofa + immflo,
                to_mineral: -immflo,
                blocked: false,
            }
        } else {
            NutrientFlow {
                blocked: true,
                ..Default::default()
            }
        }
    } else {
        NutrientFlow {
            from_donor: outofa,
            to_receiver: required,
            to_mineral: outofa - required,
            blocked: false,
        }
    }
}

/// Whether a donor may decompose given mineral availability.
///
/// Decomposition proceeds while mineral nutrient is available, or when the
/// donor is already at least as rich as the receiver requires.
pub fn candec(aminrl: f64, tca: f64, anps: f64, rceto: f64) -> bool {
    if aminrl > 1e-7 {
        return true;
    }
    anps > 0.0 && tca / anps <= rceto
}

/// Running mineral nutrient state threaded through the ordered decomposition
/// steps of one month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MineralContext {
    /// Surface mineral N and P (g / m^2)
    pub minerl: [f64; 2],
    /// Availability used for ratios and gating; P is scaled by the solution fraction
    pub aminrl: [f64; 2],
    /// Solution fraction of surface mineral P
    pub fsol: f64,
    /// Gross mineralization accumulated so far
    pub gromin: [f64; 2],
}

impl MineralContext {
    pub fn new(minerl: [f64; 2], fsol: f64) -> Self {
        Self {
            minerl,
            aminrl: [minerl[0], minerl[1] * fsol],
            fsol,
            gromin: [0.0, 0.0],
        }
    }

    fn add(&mut self, element: usize, amount: f64) {
        self.minerl[element] += amount;
        self.aminrl[element] += if element == Element::Phosphorus.index() {
            amount * self.fsol
        } else {
            amount
        };
    }
}

/// Carbon and nutrient received by one destination of a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReceiverFlow {
    pub c: f64,
    pub e: [f64; 2],
}

/// A fully scheduled, ungated transfer out of one donor pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer<const N: usize> {
    /// Total carbon leaving the donor
    pub tcflow: f64,
    pub co2: f64,
    /// Carbon lost by leaching
    pub leached_c: f64,
    pub leached_e: [f64; 2],
    /// Nutrient leaving the donor for any destination
    pub donor_e: [f64; 2],
    pub receivers: [ReceiverFlow; N],
    /// Net change of the mineral pool
    pub mineral: [f64; 2],
    /// Mineralization, counting only additions to the mineral pool
    pub gross_mineral: [f64; 2],
}

impl<const N: usize> Transfer<N> {
    /// Move the scheduled amounts between pools.
    pub fn apply(&self, donor: &mut Pool, receivers: [&mut Pool; N], context: &mut MineralContext) {
        donor.c -= self.tcflow;
        for e in 0..2 {
            donor.e[e] -= self.donor_e[e];
        }
        for (pool, flow) in receivers.into_iter().zip(self.receivers.iter()) {
            pool.c += flow.c;
            for e in 0..2 {
                pool.e[e] += flow.e[e];
            }
        }
        for e in 0..2 {
            context.add(e, self.mineral[e]);
            context.gromin[e] += self.gross_mineral[e];
        }
    }
}

/// Destination of part of a transfer: carbon received and required C:E ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    pub c: f64,
    pub ratio: [f64; 2],
}

/// Schedule a transfer of `tcflow` carbon out of `donor`.
///
/// `co2` and `leached` are the parts of `tcflow` respired and leached; the
/// remainder is split among `destinations`. Returns `None` when decomposition
/// is blocked for either element, in which case nothing moves.
pub fn schedule_transfer<const N: usize>(
    context: &MineralContext,
    donor: &Pool,
    tcflow: f64,
    co2: f64,
    leached: f64,
    destinations: [Destination; N],
) -> Option<Transfer<N>> {
    if tcflow <= 0.0 || donor.c <= 0.0 {
        return None;
    }
    let gate_ratio = destinations.first().map(|d| d.ratio)?;
    for e in 0..2 {
        if !candec(context.aminrl[e], donor.c, donor.e[e], gate_ratio[e]) {
            return None;
        }
    }

    let mut transfer = Transfer {
        tcflow,
        co2,
        leached_c: leached,
        leached_e: [0.0; 2],
        donor_e: [0.0; 2],
        receivers: [ReceiverFlow::default(); N],
        mineral: [0.0; 2],
        gross_mineral: [0.0; 2],
    };

    for e in 0..2 {
        let per_carbon = donor.e[e] / donor.c;
        let respired = co2 * per_carbon;
        let leached_e = leached * per_carbon;
        transfer.leached_e[e] = leached_e;
        transfer.donor_e[e] = respired + leached_e;
        transfer.mineral[e] = respired;
        transfer.gross_mineral[e] = respired;

        let mut labile = context.minerl[e] + respired;
        for (receiver, destination) in transfer.receivers.iter_mut().zip(destinations.iter()) {
            let flow = esched(destination.c, donor.c, destination.ratio[e], donor.e[e], labile);
            if flow.blocked {
                return None;
            }
            receiver.c = destination.c;
            receiver.e[e] = flow.to_receiver;
            transfer.donor_e[e] += flow.from_donor;
            transfer.mineral[e] += flow.to_mineral;
            if flow.to_mineral > 0.0 {
                transfer.gross_mineral[e] += flow.to_mineral;
            }
            labile += flow.to_mineral;
        }
    }
    Some(transfer)
}

/// Decompose structural material.
///
/// The lignin fraction of `tcflow` goes to SOM2 and the rest to SOM1; each
/// part respires its own fraction. Receivers are ordered SOM1, SOM2.
#[allow(clippy::too_many_arguments)]
pub fn declig(
    context: &MineralContext,
    donor: &Pool,
    lignin: f64,
    tcflow: f64,
    rsplig: f64,
    ps1co2: f64,
    ratio_som1: [f64; 2],
    ratio_som2: [f64; 2],
) -> Option<Transfer<2>> {
    let lignin = lignin.clamp(0.0, 1.0);
    let to_som2 = tcflow * lignin;
    let to_som1 = tcflow - to_som2;
    let co2_som2 = to_som2 * rsplig;
    let co2_som1 = to_som1 * ps1co2;
    schedule_transfer(
        context,
        donor,
        tcflow,
        co2_som1 + co2_som2,
        0.0,
        [
            Destination {
                c: to_som1 - co2_som1,
                ratio: ratio_som1,
            },
            Destination {
                c: to_som2 - co2_som2,
                ratio: ratio_som2,
            },
        ],
    )
}

/// Move a fraction of a pool's carbon and nutrients unchanged.
pub fn proportional_move(donor: &Pool, fraction: f64) -> Pool {
    let fraction = fraction.clamp(0.0, 1.0);
    Pool {
        c: donor.c * fraction,
        e: [donor.e[0] * fraction, donor.e[1] * fraction],
    }
}
