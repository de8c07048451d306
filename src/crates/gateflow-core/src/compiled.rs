//! Immutable, validated graph shared by every run

use crate::error::{GraphError, Result};
use crate::graph::{Graph, Transition};
use crate::node::Node;
use crate::state::WorkflowState;
use std::sync::Arc;

/// A frozen [`Graph`]; cheap to share behind an `Arc` across threads
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    name: String,
    graph: Graph,
}

impl CompiledGraph {
    pub(crate) fn new(name: String, graph: Graph) -> Self {
        Self { name, graph }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        self.graph.entry.as_deref().unwrap_or_default()
    }

    pub fn node(&self, id: &str) -> Option<&Arc<dyn Node>> {
        self.graph.nodes.get(id)
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.graph.node_names()
    }

    /// Transition function: which node runs after `from` given `state`
    pub fn next(&self, from: &str, state: &WorkflowState) -> Result<Transition> {
        self.graph.resolve(from, state).map_err(GraphError::Execution)
    }
}
