//! Maps a sub-graph factory over the live keys of a `TSD` input,
//! instantiating and tearing down one sub-graph per key as the key set
//! changes, and republishing each instance's output under its key in
//! this node's own `TSD` output.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tsgraph_common::EngineTime;

use crate::error::GraphResult;
use crate::graph::Graph;
use crate::node::{NodeCompute, NodeId};
use crate::nested::context::GraphContext;
use crate::schema::TsMeta;
use crate::value::ScalarValue;

/// Built fresh for each key that appears in the driving `TSD`.
pub trait MapNodeFactory: Send {
    fn build(&self, key: &ScalarValue, ctx: GraphContext) -> Box<dyn NodeCompute>;
    fn output_meta(&self) -> Arc<TsMeta>;
}

pub struct TsdMapNode {
    input: NodeId,
    factory: Box<dyn MapNodeFactory>,
    ctx: GraphContext,
    instances: FxHashMap<ScalarValue, NodeId>,
    self_id: Option<NodeId>,
}

impl TsdMapNode {
    pub fn new(input: NodeId, factory: Box<dyn MapNodeFactory>, ctx: GraphContext) -> Self {
        TsdMapNode {
            input,
            factory,
            ctx,
            instances: FxHashMap::default(),
            self_id: None,
        }
    }

    fn spawn_for_key(&mut self, graph: &mut Graph, key: ScalarValue) -> NodeId {
        let compute = self.factory.build(&key, self.ctx);
        let meta = self.factory.output_meta();
        let output = crate::tsvalue::TsValue::new(meta);
        let name = format!("map[{key}]");
        let id = graph.add_node(name, compute, output);
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

    /// Add/remove per-key sub-graphs to match a driving key set. Exposed
    /// directly (in addition to the `NodeCompute::restructure` hook the
    /// scheduler drives) so callers that manage the key set themselves
    /// can still restructure without a full graph tick.
    pub fn sync_instances(&mut self, graph: &mut Graph, live_keys: &[ScalarValue]) {
        let current: Vec<ScalarValue> = self.instances.keys().cloned().collect();
        for key in &current {
            if !live_keys.contains(key) {
                self.retire_for_key(graph, key);
            }
        }
        for key in live_keys {
            if !self.instances.contains_key(key) {
                self.spawn_for_key(graph, key.clone());
            }
        }
    }

    pub fn instance_for(&self, key: &ScalarValue) -> Option<NodeId> {
        self.instances.get(key).copied()
    }
}

impl NodeCompute for TsdMapNode {
    fn start(&mut self, _graph: &Graph, id: NodeId) -> GraphResult<()> {
        self.self_id = Some(id);
        Ok(())
    }

    fn restructure(&mut self, graph: &mut Graph, id: NodeId, _now: EngineTime) -> GraphResult<()> {
        self.self_id = Some(id);
        let owned = crate::view::resolve(graph, &crate::path::ShortPath::new(self.input, crate::path::Port::Out))?;
        if let crate::view::TsValueOwnedKind::Keys(keys) = owned.kind {
            self.sync_instances(graph, &keys);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphId;
    use crate::scheduler::{EvaluationEngine, NullObserver};
    use crate::tsvalue::TsValue;
    use crate::value::ScalarKind;

    struct DoubleFactory {
        meta: Arc<TsMeta>,
    }

    impl MapNodeFactory for DoubleFactory {
        fn build(&self, key: &ScalarValue, _ctx: GraphContext) -> Box<dyn NodeCompute> {
            struct Double(ScalarValue);
            impl NodeCompute for Double {
                fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
                    if let ScalarValue::Int(k) = self.0 {
                        graph.with_output_mut(id, |out| out.set_scalar(now, ScalarValue::Int(k * 2)))?;
                    }
                    Ok(())
                }
            }
            Box::new(Double(key.clone()))
        }

        fn output_meta(&self) -> Arc<TsMeta> {
            self.meta.clone()
        }
    }

    fn build_graph_with_input() -> (Graph, NodeId) {
        let mut graph = Graph::new(GraphId(0));
        let meta = Arc::new(TsMeta::dict(
            crate::value::TypeMeta::scalar(ScalarKind::Int),
            TsMeta::scalar(ScalarKind::Int),
        ));
        struct NoopCompute;
        impl NodeCompute for NoopCompute {
            fn eval(&mut self, _graph: &Graph, _id: NodeId, _now: EngineTime) -> GraphResult<()> {
                Ok(())
            }
        }
        let input = graph.add_node("keys", Box::new(NoopCompute), TsValue::new(meta));
        (graph, input)
    }

    #[test]
    fn sync_instances_spawns_an_instance_per_live_key() {
        let (mut graph, input) = build_graph_with_input();
        let factory = DoubleFactory {
            meta: Arc::new(TsMeta::scalar(ScalarKind::Int)),
        };
        let mut map_node = TsdMapNode::new(input, Box::new(factory), GraphContext::new(EngineTime(0), false));
        let keys = vec![ScalarValue::Int(1), ScalarValue::Int(2)];
        map_node.sync_instances(&mut graph, &keys);
        assert!(map_node.instance_for(&ScalarValue::Int(1)).is_some());
        assert!(map_node.instance_for(&ScalarValue::Int(2)).is_some());
        assert!(map_node.instance_for(&ScalarValue::Int(3)).is_none());
    }

    #[test]
    fn sync_instances_retires_instances_for_keys_no_longer_live() {
        let (mut graph, input) = build_graph_with_input();
        let factory = DoubleFactory {
            meta: Arc::new(TsMeta::scalar(ScalarKind::Int)),
        };
        let mut map_node = TsdMapNode::new(input, Box::new(factory), GraphContext::new(EngineTime(0), false));
        map_node.sync_instances(&mut graph, &[ScalarValue::Int(1), ScalarValue::Int(2)]);
        map_node.sync_instances(&mut graph, &[ScalarValue::Int(1)]);
        assert!(map_node.instance_for(&ScalarValue::Int(1)).is_some());
        assert!(map_node.instance_for(&ScalarValue::Int(2)).is_none());
    }

    /// End-to-end: a `TSS` of keys drives a `TsdMapNode` through a real
    /// `EvaluationEngine` run, each per-key sub-graph doubles its key,
    /// and the doubled values land in the map node's own `TSD` output.
    #[test]
    fn engine_run_spawns_instances_and_republishes_their_output_under_key() {
        let mut graph = Graph::new(GraphId(0));
        let key_meta = Arc::new(TsMeta::set(crate::value::TypeMeta::scalar(ScalarKind::Int)));

        struct EmitKeys;
        impl NodeCompute for EmitKeys {
            fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
                graph.with_output_mut(id, |out| -> GraphResult<()> {
                    out.set_insert(now, ScalarValue::Int(1))?;
                    out.set_insert(now, ScalarValue::Int(2))?;
                    Ok(())
                })
            }
        }
        let keys_node = graph.add_node("keys", Box::new(EmitKeys), TsValue::new(key_meta));

        let factory = DoubleFactory {
            meta: Arc::new(TsMeta::scalar(ScalarKind::Int)),
        };
        let map_node = TsdMapNode::new(keys_node, Box::new(factory), GraphContext::new(EngineTime(0), false));
        let out_meta = Arc::new(TsMeta::dict(
            crate::value::TypeMeta::scalar(ScalarKind::Int),
            TsMeta::scalar(ScalarKind::Int),
        ));
        let map_id = graph.add_node("doubled", Box::new(map_node), TsValue::new(out_meta));
        graph.connect(keys_node, map_id);
        graph.set_rank(keys_node, 0);
        graph.set_rank(map_id, 1);

        let clock = crate::clock::SimulationClock::unbounded();
        let mut engine = EvaluationEngine::new(graph, clock);
        engine.schedule_at(keys_node, EngineTime(1));
        let mut observer = NullObserver;
        engine.start(&mut observer).unwrap();
        engine.tick(&mut observer).unwrap();
        engine.tick(&mut observer).unwrap();

        engine.graph.with_output(map_id, |out| {
            assert_eq!(out.dict_get(&ScalarValue::Int(1)).unwrap().unwrap().as_scalar().unwrap(), &ScalarValue::Int(2));
            assert_eq!(out.dict_get(&ScalarValue::Int(2)).unwrap().unwrap().as_scalar().unwrap(), &ScalarValue::Int(4));
        });
    }
}
