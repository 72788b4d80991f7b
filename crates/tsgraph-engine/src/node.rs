//! Node identity and the per-node compute contract.

use std::fmt;

use crate::clock::EngineTimeNow;
use crate::error::GraphResult;
use crate::graph::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    NotStarted,
    Started,
    Stopped,
}

/// What a node implementation does each time it's scheduled.
///
/// `start`/`stop` bracket the graph's lifetime; `eval` runs once per
/// tick the node is scheduled on. Implementations read their inputs and
/// write their outputs through the `Graph` handle rather than holding
/// direct references, since outputs live in the graph's node table
/// alongside every other node.
pub trait NodeCompute: Send {
    fn start(&mut self, _graph: &Graph, _id: NodeId) -> GraphResult<()> {
        Ok(())
    }

    /// Structural step run once per tick, before any node's `eval`: add
    /// or remove graph nodes to match the current shape of an input
    /// (sub-graph instances keyed off a `TSD`, mesh dependency edges).
    /// Most nodes have nothing to restructure and accept the default.
    fn restructure(&mut self, _graph: &mut Graph, _id: NodeId, _now: EngineTimeNow) -> GraphResult<()> {
        Ok(())
    }

    fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTimeNow) -> GraphResult<()>;

    fn stop(&mut self, _graph: &Graph, _id: NodeId) -> GraphResult<()> {
        Ok(())
    }
}

pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub state: NodeState,
    pub compute: Box<dyn NodeCompute>,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, compute: Box<dyn NodeCompute>) -> Self {
        Node {
            id,
            name: name.into(),
            state: NodeState::NotStarted,
            compute,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Placeholder compute swapped into a node's slot while it's being
/// evaluated, so the real compute can be moved out and called with
/// `&mut self` plus a shared `&Graph` without aliasing `Vec<Node>`.
pub(crate) struct EvaluatingPlaceholder;

impl NodeCompute for EvaluatingPlaceholder {
    fn eval(&mut self, _graph: &Graph, _id: NodeId, _now: EngineTimeNow) -> GraphResult<()> {
        Ok(())
    }
}
