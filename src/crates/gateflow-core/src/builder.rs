//! [`StateGraph`] builder
//!
//! ```rust,ignore
//! use gateflow_core::{StateGraph, END};
//!
//! let mut graph = StateGraph::new("review");
//! graph
//!     .add_node(classify)
//!     .add_node(approval)
//!     .add_node(execute)
//!     .add_node(cancelled)
//!     .set_entry("classify")
//!     .add_edge("classify", "approval")
//!     .add_conditional_edge("approval", route, [("execute", "execute"), ("cancelled", "cancelled")])
//!     .add_finish("execute")
//!     .add_finish("cancelled");
//! let compiled = graph.compile()?;
//! ```
//!
//! Builder methods chain through `&mut Self`. Mistakes such as a duplicate
//! node name are remembered and reported by [`StateGraph::compile`], which
//! also runs full structural validation.

use crate::compiled::CompiledGraph;
use crate::error::{GraphError, Result};
use crate::graph::{Edge, Graph, END};
use crate::node::{Node, NodeId};
use crate::state::WorkflowState;
use std::sync::Arc;

pub struct StateGraph {
    name: String,
    graph: Graph,
    errors: Vec<String>,
}

impl StateGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: Graph::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: impl Node + 'static) -> &mut Self {
        self.add_shared_node(Arc::new(node))
    }

    pub fn add_shared_node(&mut self, node: Arc<dyn Node>) -> &mut Self {
        if let Err(err) = self.graph.add_node(node) {
            self.errors.push(err);
        }
        self
    }

    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> &mut Self {
        self.push_edge(from.into(), Edge::Direct(to.into()))
    }

    /// Route out of `from` by branch key
    ///
    /// `branches` maps every key `router` can return to a target node (or
    /// [`END`]).
    pub fn add_conditional_edge<F, B, K, T>(
        &mut self,
        from: impl Into<NodeId>,
        router: F,
        branches: B,
    ) -> &mut Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
        B: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<NodeId>,
    {
        let branches = branches
            .into_iter()
            .map(|(key, target)| (key.into(), target.into()))
            .collect();
        self.push_edge(
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                branches,
            },
        )
    }

    pub fn set_entry(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.graph.set_entry(node.into());
        self
    }

    /// Add an edge from `node` to [`END`]
    pub fn add_finish(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.push_edge(node.into(), Edge::Direct(END.to_string()))
    }

    fn push_edge(&mut self, from: NodeId, edge: Edge) -> &mut Self {
        if let Err(err) = self.graph.add_edge(from, edge) {
            self.errors.push(err);
        }
        self
    }

    /// Validate and freeze the graph
    pub fn compile(self) -> Result<CompiledGraph> {
        self.check_errors()?;
        self.graph.validate().map_err(GraphError::Validation)?;
        self.graph.check_acyclic().map_err(GraphError::Validation)?;

        let unreachable = self.graph.unreachable_nodes();
        if !unreachable.is_empty() {
            tracing::warn!(graph = %self.name, nodes = ?unreachable, "graph has unreachable nodes");
        }

        Ok(CompiledGraph::new(self.name, self.graph))
    }

    /// Freeze the graph without the acyclicity check
    ///
    /// Cyclic graphs rely on the controller's step limit to terminate. Every
    /// other structural check still applies.
    pub fn compile_unchecked(self) -> Result<CompiledGraph> {
        self.check_errors()?;
        self.graph.validate().map_err(GraphError::Validation)?;
        Ok(CompiledGraph::new(self.name, self.graph))
    }

    fn check_errors(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Validation(self.errors.join("; ")))
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}
