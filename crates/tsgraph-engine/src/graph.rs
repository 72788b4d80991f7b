//! The node table and adjacency the scheduler walks each tick.

use std::collections::BTreeMap;
use std::sync::Mutex;

use rustc_hash::FxHashMap;

use crate::clock::EngineTimeNow;
use crate::error::{GraphError, GraphResult};
use crate::node::{EvaluatingPlaceholder, Node, NodeCompute, NodeId, NodeState};
use crate::tsvalue::TsValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

/// Owns every node's compute object plus its TSOutput storage, and the
/// forward adjacency used to wake subscribers after an output changes.
///
/// Evaluating a node needs `&mut` access to that node's compute while
/// still reading other nodes' outputs through `&Graph`. Rather than
/// reach for `Rc<RefCell<_>>` or `unsafe`, `eval_node` temporarily
/// swaps the node's compute out for a no-op placeholder, drops the
/// `&mut Vec<Node>` borrow, calls the real compute against `&Graph`,
/// then swaps it back.
pub struct Graph {
    pub id: GraphId,
    nodes: Vec<Node>,
    outputs: Vec<Mutex<TsValue>>,
    forward_edges: FxHashMap<NodeId, Vec<NodeId>>,
    rank: BTreeMap<NodeId, u32>,
}

impl Graph {
    pub fn new(id: GraphId) -> Self {
        Graph {
            id,
            nodes: Vec::new(),
            outputs: Vec::new(),
            forward_edges: FxHashMap::default(),
            rank: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, compute: Box<dyn NodeCompute>, output: TsValue) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, name, compute));
        self.outputs.push(Mutex::new(output));
        id
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        let subs = self.forward_edges.entry(from).or_default();
        if !subs.contains(&to) {
            subs.push(to);
        }
    }

    pub fn subscribers(&self, of: NodeId) -> &[NodeId] {
        self.forward_edges.get(&of).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        &self.nodes[id.0 as usize].name
    }

    pub fn rank_of(&self, id: NodeId) -> u32 {
        self.rank.get(&id).copied().unwrap_or(0)
    }

    pub fn set_rank(&mut self, id: NodeId, rank: u32) {
        self.rank.insert(id, rank);
    }

    pub fn with_output<R>(&self, id: NodeId, f: impl FnOnce(&TsValue) -> R) -> R {
        let guard = self.outputs[id.0 as usize].lock().expect("output mutex poisoned");
        f(&guard)
    }

    pub fn with_output_mut<R>(&self, id: NodeId, f: impl FnOnce(&mut TsValue) -> R) -> R {
        let mut guard = self.outputs[id.0 as usize].lock().expect("output mutex poisoned");
        f(&mut guard)
    }

    pub fn start_node(&mut self, id: NodeId) -> GraphResult<()> {
        let placeholder: Box<dyn NodeCompute> = Box::new(EvaluatingPlaceholder);
        let mut compute = std::mem::replace(&mut self.nodes[id.0 as usize].compute, placeholder);
        let result = compute.start(self, id);
        self.nodes[id.0 as usize].compute = compute;
        if result.is_ok() {
            self.nodes[id.0 as usize].state = NodeState::Started;
        }
        result
    }

    pub fn stop_node(&mut self, id: NodeId) -> GraphResult<()> {
        let placeholder: Box<dyn NodeCompute> = Box::new(EvaluatingPlaceholder);
        let mut compute = std::mem::replace(&mut self.nodes[id.0 as usize].compute, placeholder);
        let result = compute.stop(self, id);
        self.nodes[id.0 as usize].compute = compute;
        if result.is_ok() {
            self.nodes[id.0 as usize].state = NodeState::Stopped;
        }
        result
    }

    pub fn node_state(&self, id: NodeId) -> NodeState {
        self.nodes[id.0 as usize].state
    }

    pub fn restructure_node(&mut self, id: NodeId, now: EngineTimeNow) -> GraphResult<()> {
        let idx = id.0 as usize;
        let placeholder: Box<dyn NodeCompute> = Box::new(EvaluatingPlaceholder);
        let mut compute = std::mem::replace(&mut self.nodes[idx].compute, placeholder);
        let result = compute.restructure(self, id, now);
        self.nodes[idx].compute = compute;
        result
    }

    pub fn eval_node(&mut self, id: NodeId, now: EngineTimeNow) -> GraphResult<()> {
        let idx = id.0 as usize;
        if self.nodes[idx].state != NodeState::Started {
            return Err(GraphError::not_active().with_message(self.nodes[idx].name.clone()));
        }
        let placeholder: Box<dyn NodeCompute> = Box::new(EvaluatingPlaceholder);
        let mut compute = std::mem::replace(&mut self.nodes[idx].compute, placeholder);
        let result = compute.eval(self, id, now);
        self.nodes[idx].compute = compute;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TsMeta;
    use crate::value::{ScalarKind, ScalarValue};

    struct Echo;
    impl NodeCompute for Echo {
        fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTimeNow) -> GraphResult<()> {
            graph.with_output_mut(id, |out| out.set_scalar(now, ScalarValue::Int(1)))
        }
    }

    #[test]
    fn connect_records_a_subscriber_and_is_idempotent() {
        let mut graph = Graph::new(GraphId(0));
        let meta = std::sync::Arc::new(TsMeta::scalar(ScalarKind::Int));
        let a = graph.add_node("a", Box::new(Echo), TsValue::new(meta.clone()));
        let b = graph.add_node("b", Box::new(Echo), TsValue::new(meta));
        graph.connect(a, b);
        graph.connect(a, b);
        assert_eq!(graph.subscribers(a), &[b]);
    }

    #[test]
    fn eval_node_fails_when_not_started() {
        let mut graph = Graph::new(GraphId(0));
        let meta = std::sync::Arc::new(TsMeta::scalar(ScalarKind::Int));
        let a = graph.add_node("a", Box::new(Echo), TsValue::new(meta));
        let err = graph.eval_node(a, EngineTimeNow::from(1)).unwrap_err();
        assert_eq!(err.kind, crate::error::GraphErrorKind::NotActive);
    }

    #[test]
    fn start_then_eval_writes_the_output() {
        let mut graph = Graph::new(GraphId(0));
        let meta = std::sync::Arc::new(TsMeta::scalar(ScalarKind::Int));
        let a = graph.add_node("a", Box::new(Echo), TsValue::new(meta));
        graph.start_node(a).unwrap();
        graph.eval_node(a, EngineTimeNow::from(5)).unwrap();
        let value = graph.with_output(a, |out| out.as_scalar().cloned().unwrap());
        assert_eq!(value, ScalarValue::Int(1));
    }

    #[test]
    fn rank_defaults_to_zero_until_set() {
        let mut graph = Graph::new(GraphId(0));
        let meta = std::sync::Arc::new(TsMeta::scalar(ScalarKind::Int));
        let a = graph.add_node("a", Box::new(Echo), TsValue::new(meta));
        assert_eq!(graph.rank_of(a), 0);
        graph.set_rank(a, 3);
        assert_eq!(graph.rank_of(a), 3);
    }
}
