//! Root node of the component graph.

use crate::component::{Component, OutputRasters, RequirementDefinition};
use crate::errors::RangelandResult;
use crate::state::MonthInputs;
use serde::{Deserialize, Serialize};

/// Writes nothing. Components with no same-month dependencies hang off this
/// node so every component is reachable from one root.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct NullComponent {}

#[typetag::serde]
impl Component for NullComponent {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        vec![]
    }

    fn solve(&self, _inputs: &MonthInputs) -> RangelandResult<OutputRasters> {
        Ok(OutputRasters::new())
    }
}
