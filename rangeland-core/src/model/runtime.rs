//! Model struct and monthly execution.

use crate::component::RequirementType;
use crate::drivers::MonthStep;
use crate::errors::{RangelandError, RangelandResult};
use crate::state::{MonthInputs, StateSnapshot};
use log::debug;
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::types::{CGraph, C};

/// A coupled set of components solved once per month.
///
/// Each month reads an immutable snapshot of the previous month's state and
/// produces a new snapshot. Components communicate within a month through a
/// register of rasters written earlier in the same month. Values that are
/// not state variables are dropped from the register at month end.
#[derive(Debug, Serialize, Deserialize)]
pub struct Model {
    /// A directed graph with components as nodes and the edges defining the
    /// dependencies between nodes.
    components: CGraph,
    /// Solve order within a month.
    order: Vec<NodeIndex>,
    /// Every variable declared as state by some component.
    state_variables: BTreeSet<String>,
}

/// Everything produced by one month.
#[derive(Debug, Clone)]
pub struct MonthResult {
    /// Finalized state, the previous state for the next month
    pub state: StateSnapshot,
    /// Every raster written during the month, including working values
    pub register: StateSnapshot,
}

impl Model {
    pub fn new(
        components: CGraph,
        order: Vec<NodeIndex>,
        state_variables: BTreeSet<String>,
    ) -> Self {
        Self {
            components,
            order,
            state_variables,
        }
    }

    /// Components in the order they are solved.
    pub fn components(&self) -> Vec<C> {
        self.order
            .iter()
            .map(|n| self.components[*n].clone())
            .collect()
    }

    pub fn state_variables(&self) -> &BTreeSet<String> {
        &self.state_variables
    }

    /// Names of every variable declared with `requirement_type`.
    pub fn required(&self, requirement_type: RequirementType) -> BTreeSet<String> {
        self.components()
            .iter()
            .flat_map(|c| c.definitions())
            .filter(|d| d.requirement_type == requirement_type)
            .map(|d| d.name)
            .collect()
    }

    /// Solve every component for one month.
    ///
    /// `previous` is never modified; the returned state is a new snapshot that
    /// shares unchanged rasters with it.
    pub fn solve_month(
        &self,
        step: MonthStep,
        previous: &StateSnapshot,
        persistent: &StateSnapshot,
        drivers: &StateSnapshot,
    ) -> RangelandResult<MonthResult> {
        let shape = previous
            .shape()
            .or_else(|| persistent.shape())
            .ok_or_else(|| RangelandError::Error("The model has no grid to run on".into()))?;
        let mut register = StateSnapshot::new();

        for node in &self.order {
            let component = &self.components[*node];
            let name = component.name();
            debug!("{}: solving {}", step.label(), name);

            let outputs = {
                let inputs = MonthInputs::new(step, previous, persistent, drivers, &register);
                component.solve(&inputs)?
            };

            let declared: HashSet<String> = component.output_names().into_iter().collect();
            for (variable, raster) in outputs {
                if !declared.contains(&variable) {
                    return Err(RangelandError::UndeclaredOutput {
                        component: name,
                        variable,
                    });
                }
                raster.check_shape(&variable, shape)?;
                register.insert(variable, raster);
            }
        }

        let state = previous.overlay(&register, |name| self.state_variables.contains(name));
        Ok(MonthResult { state, register })
    }

    /// Create a diagram that represents the component graph.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &CGraph> {
        Dot::with_attr_getters(
            &self.components,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| format!("label = {:?}", er.weight().name),
            &|_, (_, component)| format!("label = \"{}\"", component.name()),
        )
    }
}
