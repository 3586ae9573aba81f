//! Ordering and month execution of the component graph.

use crate::component::{Component, OutputRasters, RequirementDefinition, RequirementType};
use crate::drivers::MonthStep;
use crate::errors::{RangelandError, RangelandResult};
use crate::model::{Model, ModelBuilder};
use crate::raster::{Raster, TARGET_NODATA};
use crate::state::{MonthInputs, StateSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Adds a constant to the latest version of a state variable.
#[derive(Debug, Serialize, Deserialize)]
struct AddToState {
    variable: String,
    amount: f32,
}

#[typetag::serde]
impl Component for AddToState {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![RequirementDefinition::state(&self.variable, "g / m^2")]
    }

    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        let current = inputs.latest(&self.variable)?;
        let data = current.data().mapv(|v| v + self.amount);
        let mut out = OutputRasters::new();
        out.insert(self.variable.clone(), Raster::new(data, current.nodata()));
        Ok(out)
    }
}

/// Writes a working value derived from a driver.
#[derive(Debug, Serialize, Deserialize)]
struct DoubleDriver {}

#[typetag::serde]
impl Component for DoubleDriver {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::driver("precip", "cm"),
            RequirementDefinition::output("precip_x2", "cm"),
        ]
    }

    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        let precip = inputs.driver("precip")?;
        let mut out = OutputRasters::new();
        out.insert(
            "precip_x2".to_string(),
            Raster::new(precip.data().mapv(|v| v * 2.0), TARGET_NODATA),
        );
        Ok(out)
    }
}

/// Copies a same-month working value into state.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDoubled {}

#[typetag::serde]
impl Component for StoreDoubled {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![
            RequirementDefinition::input("precip_x2", "cm"),
            RequirementDefinition::state("snow", "cm"),
        ]
    }

    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        let mut out = OutputRasters::new();
        out.insert("snow".to_string(), inputs.input("precip_x2")?.clone());
        Ok(out)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Rogue {}

#[typetag::serde]
impl Component for Rogue {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![]
    }

    fn solve(&self, inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        let mut out = OutputRasters::new();
        out.insert("snow".to_string(), inputs.previous("snow")?.clone());
        Ok(out)
    }
}

fn snapshot(entries: &[(&str, f32)]) -> StateSnapshot {
    entries
        .iter()
        .map(|(n, v)| (n.to_string(), Raster::filled((2, 2), *v, TARGET_NODATA)))
        .collect()
}

fn names(model: &Model) -> Vec<String> {
    model.components().iter().map(|c| c.name()).collect()
}

#[test]
fn producers_run_before_consumers() {
    let model = ModelBuilder::new()
        .with_component(Arc::new(StoreDoubled {}))
        .with_component(Arc::new(DoubleDriver {}))
        .build()
        .unwrap();
    assert_eq!(names(&model), vec!["DoubleDriver", "StoreDoubled"]);
    assert!(model.state_variables().contains("snow"));
    assert!(model.required(RequirementType::Driver).contains("precip"));
}

#[test]
fn shared_state_rewrites_follow_registration_order() {
    let model = ModelBuilder::new()
        .with_component(Arc::new(AddToState {
            variable: "minerl_1_1".into(),
            amount: 1.0,
        }))
        .with_component(Arc::new(AddToState {
            variable: "minerl_1_1".into(),
            amount: 10.0,
        }))
        .build()
        .unwrap();

    let previous = snapshot(&[("minerl_1_1", 2.0), ("snow", 0.0)]);
    let empty = StateSnapshot::new();
    let result = model
        .solve_month(MonthStep::new(0, 2016, 1), &previous, &empty, &empty)
        .unwrap();

    assert_eq!(result.state.get("minerl_1_1").unwrap().value(0), Some(13.0));
    assert_eq!(previous.get("minerl_1_1").unwrap().value(0), Some(2.0));
    assert_eq!(result.state.get("snow").unwrap().value(3), Some(0.0));
}

#[test]
fn working_values_are_discarded_at_month_end() {
    let model = ModelBuilder::new()
        .with_component(Arc::new(DoubleDriver {}))
        .with_component(Arc::new(StoreDoubled {}))
        .build()
        .unwrap();
    let previous = snapshot(&[("snow", 0.0)]);
    let drivers = snapshot(&[("precip", 1.5)]);
    let result = model
        .solve_month(MonthStep::new(0, 2016, 1), &previous, &StateSnapshot::new(), &drivers)
        .unwrap();
    assert_eq!(result.state.get("snow").unwrap().value(0), Some(3.0));
    assert!(!result.state.contains("precip_x2"));
    assert!(result.register.contains("precip_x2"));
}

#[test]
fn missing_producer_is_an_error() {
    let err = ModelBuilder::new()
        .with_component(Arc::new(StoreDoubled {}))
        .build()
        .unwrap_err();
    assert!(matches!(err, RangelandError::MissingProducer { .. }));
}

#[test]
fn undeclared_output_is_an_error() {
    let model = ModelBuilder::new()
        .with_component(Arc::new(Rogue {}))
        .build()
        .unwrap();
    let previous = snapshot(&[("snow", 0.0)]);
    let empty = StateSnapshot::new();
    let err = model
        .solve_month(MonthStep::new(0, 2016, 1), &previous, &empty, &empty)
        .unwrap_err();
    assert!(matches!(err, RangelandError::UndeclaredOutput { .. }));
}

#[test]
fn serialises_round_trip() {
    let model = ModelBuilder::new()
        .with_component(Arc::new(DoubleDriver {}))
        .with_component(Arc::new(StoreDoubled {}))
        .build()
        .unwrap();
    let serialised = serde_json::to_string(&model).unwrap();
    let restored: Model = serde_json::from_str(&serialised).unwrap();
    assert_eq!(names(&restored), names(&model));
}

#[test]
fn dot_lists_components() {
    let model = ModelBuilder::new()
        .with_component(Arc::new(DoubleDriver {}))
        .with_component(Arc::new(StoreDoubled {}))
        .build()
        .unwrap();
    let dot = format!("{:?}", model.as_dot());
    assert!(dot.contains("NullComponent"));
    assert!(dot.contains("label = \"precip_x2\""));
}
