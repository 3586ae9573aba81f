//! Components solved once per month.
//!
//! A component declares what it reads and writes through
//! [`RequirementDefinition`]s. The [`ModelBuilder`](crate::model::ModelBuilder)
//! uses those declarations to order components within a month.

use crate::errors::RangelandResult;
use crate::raster::Raster;
use crate::state::MonthInputs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// How a component uses a variable.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum RequirementType {
    /// Exogenous monthly raster such as precipitation
    Driver,
    /// Time-invariant raster such as soil texture or a derived parameter
    Persistent,
    /// A state variable as it stood at the start of the month
    Previous,
    /// Produced earlier in the same month by another component
    Input,
    /// Read at its latest version and written back
    State,
    /// Produced for later components in the same month and then discarded
    Output,
    /// Links a component without dependencies to the root of the graph
    EmptyLink,
}

#[derive(Debug, Eq, PartialEq, Clone, Hash, Serialize, Deserialize)]
pub struct RequirementDefinition {
    pub name: String,
    pub unit: String,
    pub requirement_type: RequirementType,
}

impl RequirementDefinition {
    pub fn new(name: &str, unit: &str, requirement_type: RequirementType) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            requirement_type,
        }
    }

    pub fn driver(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Driver)
    }

    pub fn persistent(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Persistent)
    }

    pub fn previous(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Previous)
    }

    pub fn input(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Input)
    }

    pub fn state(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::State)
    }

    pub fn output(name: &str, unit: &str) -> Self {
        Self::new(name, unit, RequirementType::Output)
    }

    /// Whether the variable is read from within the month.
    pub fn is_read(&self) -> bool {
        matches!(
            self.requirement_type,
            RequirementType::Input | RequirementType::State
        )
    }

    /// Whether the component writes the variable.
    pub fn is_written(&self) -> bool {
        matches!(
            self.requirement_type,
            RequirementType::State | RequirementType::Output
        )
    }
}

/// Rasters written by a component during one month.
pub type OutputRasters = HashMap<String, Raster>;

/// Component of a monthly model.
///
/// Components are serialisable through `typetag` so that a built model can
/// be stored and restored.
#[typetag::serde(tag = "type")]
pub trait Component: Debug + Send + Sync {
    fn definitions(&self) -> Vec<RequirementDefinition>;

    /// Variables whose same-month version is read.
    fn inputs(&self) -> Vec<RequirementDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| d.is_read())
            .collect()
    }

    fn input_names(&self) -> Vec<String> {
        self.inputs().into_iter().map(|d| d.name).collect()
    }

    /// Variables written by the component.
    fn outputs(&self) -> Vec<RequirementDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| d.is_written())
            .collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs().into_iter().map(|d| d.name).collect()
    }

    /// Short name used in logs and errors.
    fn name(&self) -> String {
        let debug = format!("{:?}", self);
        debug
            .split(['{', ' ', '('])
            .next()
            .unwrap_or("UnknownComponent")
            .to_string()
    }

    /// Solve the component for one month.
    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters>;
}
