use crate::component::{Component, RequirementDefinition};
use petgraph::Graph;
use std::sync::Arc;

/// A shared component node.
pub type C = Arc<dyn Component>;

/// Components as nodes, edges labelled with the variable that links them.
pub type CGraph = Graph<C, RequirementDefinition>;
