//! Model builder for constructing models from components.

use crate::component::{Component, RequirementDefinition, RequirementType};
use crate::errors::{RangelandError, RangelandResult};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::null_component::NullComponent;
use super::runtime::Model;
use super::types::{CGraph, C};

/// Build a new model from a set of components.
///
/// The builder generates a graph that defines the inter-component dependencies
/// within a month. This graph is used by the model to define the order in which
/// components are solved.
#[derive(Default)]
pub struct ModelBuilder {
    components: Vec<C>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with the builder.
    ///
    /// Registration order decides which component rewrites a shared state
    /// variable first.
    pub fn with_component(&mut self, component: Arc<dyn Component>) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Builds the component graph for the registered components and creates a concrete model.
    ///
    /// Returns an error if a component reads a same-month value that nothing
    /// produces, or if the dependencies form a cycle.
    pub fn build(&self) -> RangelandResult<Model> {
        let mut graph: CGraph = Graph::new();
        let initial_node = graph.add_node(Arc::new(NullComponent {}));
        let nodes: Vec<NodeIndex> = self
            .components
            .iter()
            .map(|c| graph.add_node(c.clone()))
            .collect();

        // Writers of each variable, in registration order
        let mut writers: HashMap<String, Vec<usize>> = HashMap::new();
        let mut state_variables = BTreeSet::new();
        for (i, component) in self.components.iter().enumerate() {
            for definition in component.outputs() {
                if definition.requirement_type == RequirementType::State {
                    state_variables.insert(definition.name.clone());
                }
                let entry = writers.entry(definition.name.clone()).or_default();
                if !entry.contains(&i) {
                    entry.push(i);
                }
            }
        }

        for (i, component) in self.components.iter().enumerate() {
            let mut has_dependencies = false;
            let mut linked: BTreeSet<(usize, String)> = BTreeSet::new();

            for definition in component.definitions() {
                let producers = writers.get(&definition.name);
                let sources: Vec<usize> = match definition.requirement_type {
                    RequirementType::Input => {
                        let producers: Vec<usize> = producers
                            .map(|p| p.iter().copied().filter(|&w| w != i).collect())
                            .unwrap_or_default();
                        if producers.is_empty() {
                            return Err(RangelandError::MissingProducer {
                                component: component.name(),
                                variable: definition.name.clone(),
                            });
                        }
                        producers
                    }
                    // Rewrites chain in registration order
                    RequirementType::State | RequirementType::Output => producers
                        .and_then(|p| p.iter().copied().filter(|&w| w < i).max())
                        .into_iter()
                        .collect(),
                    _ => vec![],
                };

                for source in sources {
                    if linked.insert((source, definition.name.clone())) {
                        graph.add_edge(nodes[source], nodes[i], definition.clone());
                        has_dependencies = true;
                    }
                }
            }

            if !has_dependencies {
                // Keep a single connected graph rooted at the initial node
                graph.add_edge(
                    initial_node,
                    nodes[i],
                    RequirementDefinition::new("", "", RequirementType::EmptyLink),
                );
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            RangelandError::ComponentCycle(graph[cycle.node_id()].name())
        })?;
        let order: Vec<NodeIndex> = order.into_iter().filter(|n| *n != initial_node).collect();

        Ok(Model::new(graph, order, state_variables))
    }
}
