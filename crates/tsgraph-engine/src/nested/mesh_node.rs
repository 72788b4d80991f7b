//! A sub-graph whose internal dependency edges are discovered as nodes
//! run rather than declared up front, so rank order is recomputed
//! whenever a new edge appears instead of being fixed at build time.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tsgraph_common::EngineTime;

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::nested::context::GraphContext;
use crate::node::{NodeCompute, NodeId};
use crate::schema::TsMeta;
use crate::value::ScalarValue;

#[derive(Default)]
pub struct MeshNode {
    edges: FxHashSet<(NodeId, NodeId)>,
}

impl MeshNode {
    pub fn new() -> Self {
        MeshNode::default()
    }

    /// Register that `to` now depends on `from`'s output, recomputing
    /// ranks for everything reachable from the new edge. Rejects the
    /// edge (and leaves the graph's ranks unchanged) if it would close
    /// a cycle.
    pub fn add_dependency(&mut self, graph: &mut Graph, from: NodeId, to: NodeId) -> GraphResult<()> {
        if from == to || self.reaches(graph, to, from) {
            return Err(GraphError::cycle_detected());
        }
        self.edges.insert((from, to));
        graph.connect(from, to);
        self.recompute_ranks(graph);
        Ok(())
    }

    fn reaches(&self, graph: &Graph, from: NodeId, to: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = FxHashSet::default();
        while let Some(n) = stack.pop() {
            if n == to {
                return true;
            }
            if !seen.insert(n) {
                continue;
            }
            stack.extend(graph.subscribers(n).iter().copied());
        }
        false
    }

    /// Kahn's algorithm over the mesh's own edge set, assigning each
    /// node a rank equal to its longest-path distance from a source so
    /// the scheduler runs dependencies before dependents.
    fn recompute_ranks(&self, graph: &mut Graph) {
        let ids: Vec<NodeId> = graph.node_ids().collect();
        let mut indegree: rustc_hash::FxHashMap<NodeId, u32> = ids.iter().map(|&id| (id, 0)).collect();
        for &(_, to) in &self.edges {
            *indegree.entry(to).or_insert(0) += 1;
        }
        let mut queue: Vec<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| indegree.get(id).copied().unwrap_or(0) == 0)
            .collect();
        let mut rank = 0u32;
        let mut visited = FxHashSet::default();
        while !queue.is_empty() {
            let mut next = Vec::new();
            for id in queue.drain(..) {
                if !visited.insert(id) {
                    continue;
                }
                graph.set_rank(id, rank);
                for &(from, to) in &self.edges {
                    if from == id {
                        let d = indegree.entry(to).or_insert(0);
                        if *d > 0 {
                            *d -= 1;
                        }
                        if *d == 0 {
                            next.push(to);
                        }
                    }
                }
            }
            queue = next;
            rank += 1;
        }
    }
}

/// Built fresh for each key that appears in the driving `TSD`, plus the
/// other keys (if any) its sub-graph reads from — declared so
/// `MeshComputeNode::restructure` can register the dependency edge as
/// soon as both sides exist, before either is ever scheduled.
pub trait MeshNodeFactory: Send {
    fn build(&self, key: &ScalarValue, ctx: GraphContext) -> Box<dyn NodeCompute>;
    fn output_meta(&self) -> Arc<TsMeta>;
    fn dependencies(&self, _key: &ScalarValue) -> Vec<ScalarValue> {
        Vec::new()
    }
}

/// A `TsdMapNode`-shaped compute node whose per-key sub-graphs may
/// depend on each other. Dependency edges are registered through an
/// embedded `MeshNode` as keys are (re)discovered each tick, so the
/// ambient scheduler's rank-ordered ready queue naturally evaluates
/// dependencies before dependents.
pub struct MeshComputeNode {
    input: NodeId,
    factory: Box<dyn MeshNodeFactory>,
    ctx: GraphContext,
    mesh: MeshNode,
    instances: FxHashMap<ScalarValue, NodeId>,
    self_id: Option<NodeId>,
}

impl MeshComputeNode {
    pub fn new(input: NodeId, factory: Box<dyn MeshNodeFactory>, ctx: GraphContext) -> Self {
        MeshComputeNode {
            input,
            factory,
            ctx,
            mesh: MeshNode::new(),
            instances: FxHashMap::default(),
            self_id: None,
        }
    }

    pub fn instance_for(&self, key: &ScalarValue) -> Option<NodeId> {
        self.instances.get(key).copied()
    }

    fn spawn_for_key(&mut self, graph: &mut Graph, key: ScalarValue) -> NodeId {
        let compute = self.factory.build(&key, self.ctx);
        let meta = self.factory.output_meta();
        let name = format!("mesh[{key}]");
        let id = graph.add_node(name, compute, crate::tsvalue::TsValue::new(meta));
        graph.connect(self.input, id);
        if let Some(self_id) = self.self_id {
            graph.connect(id, self_id);
        }
        self.instances.insert(key, id);
        id
    }

    fn retire_for_key(&mut self, graph: &mut Graph, key: &ScalarValue) {
        if let Some(id) = self.instances.remove(key) {
            let _ = graph.stop_node(id);
        }
    }
}

impl NodeCompute for MeshComputeNode {
    fn start(&mut self, _graph: &Graph, id: NodeId) -> GraphResult<()> {
        self.self_id = Some(id);
        Ok(())
    }

    fn restructure(&mut self, graph: &mut Graph, id: NodeId, _now: EngineTime) -> GraphResult<()> {
        self.self_id = Some(id);
        let owned = crate::view::resolve(graph, &crate::path::ShortPath::new(self.input, crate::path::Port::Out))?;
        let keys = match owned.kind {
            crate::view::TsValueOwnedKind::Keys(keys) => keys,
            _ => return Ok(()),
        };

        let current: Vec<ScalarValue> = self.instances.keys().cloned().collect();
        for key in &current {
            if !keys.contains(key) {
                self.retire_for_key(graph, key);
            }
        }
        for key in &keys {
            if !self.instances.contains_key(key) {
                self.spawn_for_key(graph, key.clone());
            }
        }
        for key in &keys {
            let from_id = self.instances[key];
            for dep_key in self.factory.dependencies(key) {
                if let Some(&dep_id) = self.instances.get(&dep_key) {
                    if !self.mesh.edges.contains(&(dep_id, from_id)) {
                        self.mesh.add_dependency(graph, dep_id, from_id)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Republish every instance's output that ticked this cycle under
    /// its key in this node's own `TSD` output.
    fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
        let value_meta = self.factory.output_meta();
        for (key, instance_id) in self.instances.iter() {
            let owned = crate::view::resolve(graph, &crate::path::ShortPath::new(*instance_id, crate::path::Port::Out))?;
            if !owned.ticked(now) {
                continue;
            }
            let scalar = owned.as_scalar()?;
            graph.with_output_mut(id, |out| -> GraphResult<()> {
                out.dict_insert(now, key.clone(), &value_meta)?;
                if let Some(slot) = out.dict_get_mut(key)? {
                    slot.set_scalar(now, scalar.clone())?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}
