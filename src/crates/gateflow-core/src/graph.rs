//! Graph structure: nodes, edges and structural validation
//!
//! A [`Graph`] is a set of named [`Node`]s, one designated entry node, and at
//! most one outgoing [`Edge`] per node. An edge either always leads to the
//! same target or consults a router over the current [`WorkflowState`]. The
//! pseudo-node [`END`] marks termination.
//!
//! ```text
//!   classify ──> approval ──┬─(approved)──> execute ───> END
//!                           └─(rejected)──> cancelled ─> END
//! ```
//!
//! Validation (run by [`StateGraph::compile`](crate::StateGraph::compile))
//! requires the entry node to exist, every edge endpoint to exist, every node
//! to have an outgoing edge, and the graph to be acyclic so that every run
//! terminates.

use crate::node::{Node, NodeId};
use crate::state::WorkflowState;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Pseudo-node that terminates a run
pub const END: &str = "__end__";

/// Router for a conditional edge; returns a branch key
pub type Router = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Edge {
    /// Always continue to this node
    Direct(NodeId),

    /// Pick the target by branch key
    Conditional {
        router: Router,
        /// Branch key to target node; every key the router may return
        branches: HashMap<String, NodeId>,
    },
}

impl Edge {
    /// Every node this edge can lead to
    pub fn targets(&self) -> Vec<&NodeId> {
        match self {
            Edge::Direct(to) => vec![to],
            Edge::Conditional { branches, .. } => branches.values().collect(),
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<function>")
                .field("branches", branches)
                .finish(),
        }
    }
}

/// Where a run goes after a node completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(NodeId),
    End,
}

impl Transition {
    fn to(target: &str) -> Self {
        if target == END {
            Transition::End
        } else {
            Transition::Next(target.to_string())
        }
    }

    pub fn node(&self) -> Option<&str> {
        match self {
            Transition::Next(node) => Some(node),
            Transition::End => None,
        }
    }
}

#[derive(Clone, Default)]
pub struct Graph {
    pub(crate) nodes: HashMap<NodeId, Arc<dyn Node>>,
    pub(crate) edges: HashMap<NodeId, Edge>,
    pub(crate) entry: Option<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Arc<dyn Node>) -> Result<(), String> {
        let id = node.name().to_string();
        if id.is_empty() || id == END {
            return Err(format!("Invalid node name '{}'", id));
        }
        if self.nodes.contains_key(&id) {
            return Err(format!("Node {} is already defined", id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    pub fn add_edge(&mut self, from: NodeId, edge: Edge) -> Result<(), String> {
        if self.edges.contains_key(&from) {
            return Err(format!("Node {} already has an outgoing edge", from));
        }
        self.edges.insert(from, edge);
        Ok(())
    }

    pub fn set_entry(&mut self, node: NodeId) {
        self.entry = Some(node);
    }

    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check endpoints and edge coverage; cycles are checked separately
    pub fn validate(&self) -> Result<(), String> {
        let entry = self.entry.as_ref().ok_or("Graph has no entry point")?;
        if !self.nodes.contains_key(entry) {
            return Err(format!("Entry point {} does not exist", entry));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(format!("Edge source {} does not exist", from));
            }
            if let Edge::Conditional { branches, .. } = edge {
                if branches.is_empty() {
                    return Err(format!("Conditional edge from {} has no branches", from));
                }
            }
            for to in edge.targets() {
                if !self.nodes.contains_key(to) && to != END {
                    return Err(format!("Edge target {} does not exist", to));
                }
            }
        }

        for id in self.node_names() {
            if !self.edges.contains_key(id) {
                return Err(format!("Node {} has no outgoing edge", id));
            }
        }

        let reaches_end = self
            .edges
            .values()
            .any(|edge| edge.targets().iter().any(|to| *to == END));
        if !reaches_end {
            return Err("Graph has no edge to END".to_string());
        }

        Ok(())
    }

    /// Reject any cycle reachable through declared edges
    pub fn check_acyclic(&self) -> Result<(), String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a Graph,
            id: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Result<(), String> {
            match marks.get(id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    path.push(id);
                    return Err(format!("Graph contains a cycle: {}", path.join(" -> ")));
                }
                None => {}
            }

            marks.insert(id, Mark::Visiting);
            path.push(id);
            if let Some(edge) = graph.edges.get(id) {
                for to in edge.targets() {
                    if to != END {
                        visit(graph, to, marks, path)?;
                    }
                }
            }
            path.pop();
            marks.insert(id, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        for id in ids {
            visit(self, id, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    /// Nodes not reachable from the entry point
    pub fn unreachable_nodes(&self) -> Vec<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = self.entry.iter().map(String::as_str).collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(edge) = self.edges.get(id) {
                stack.extend(edge.targets().into_iter().map(String::as_str).filter(|to| *to != END));
            }
        }
        let mut unreachable: Vec<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|id| !seen.contains(id))
            .collect();
        unreachable.sort_unstable();
        unreachable
    }

    /// Resolve the transition out of `from` for the given state
    pub(crate) fn resolve(&self, from: &str, state: &WorkflowState) -> Result<Transition, String> {
        match self.edges.get(from) {
            None => Err(format!("Node {} has no outgoing edge", from)),
            Some(Edge::Direct(to)) => Ok(Transition::to(to)),
            Some(Edge::Conditional { router, branches }) => {
                let key = router(state);
                branches
                    .get(&key)
                    .map(|to| Transition::to(to))
                    .ok_or_else(|| format!("Router for {} returned unknown branch '{}'", from, key))
            }
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_names())
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .finish()
    }
}
