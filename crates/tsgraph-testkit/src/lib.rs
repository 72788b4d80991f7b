//! Graph-building and assertion helpers shared by the engine's test
//! suites: trivial source/sink nodes and a recording lifecycle
//! observer, so individual module tests don't each reinvent them.

use std::sync::Arc;

use tsgraph_common::EngineTime;
use tsgraph_engine::clock::SimulationClock;
use tsgraph_engine::error::GraphResult;
use tsgraph_engine::graph::{Graph, GraphId};
use tsgraph_engine::node::{NodeCompute, NodeId};
use tsgraph_engine::scheduler::{EvalMode, EvaluationEngine, LifecycleObserver, NullObserver};
use tsgraph_engine::schema::TsMeta;
use tsgraph_engine::tsvalue::TsValue;
use tsgraph_engine::value::{ScalarKind, ScalarValue};

/// A node that ticks a fixed scalar at a fixed time and never again.
pub struct OnceNode {
    at: EngineTime,
    value: Option<ScalarValue>,
    fired: bool,
}

impl OnceNode {
    pub fn new(at: EngineTime, value: ScalarValue) -> Self {
        OnceNode {
            at,
            value: Some(value),
            fired: false,
        }
    }
}

impl NodeCompute for OnceNode {
    fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
        if !self.fired && now == self.at {
            if let Some(v) = self.value.take() {
                graph.with_output_mut(id, |out| out.set_scalar(now, v))?;
                self.fired = true;
            }
        }
        Ok(())
    }
}

/// A node that records every value it observes on its single upstream
/// input, for assertion after the run.
pub struct RecorderNode {
    upstream: NodeId,
    pub seen: Vec<(EngineTime, ScalarValue)>,
}

impl RecorderNode {
    pub fn new(upstream: NodeId) -> Self {
        RecorderNode {
            upstream,
            seen: Vec::new(),
        }
    }
}

impl NodeCompute for RecorderNode {
    fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
        let value = tsgraph_engine::view::read_scalar(graph, self.upstream)?;
        graph.with_output_mut(id, |out| out.set_scalar(now, value.clone()))?;
        self.seen.push((now, value));
        Ok(())
    }
}

/// Build a minimal two-node `source -> recorder` graph wired for tests.
pub fn source_recorder_graph(at: EngineTime, value: ScalarValue, kind: ScalarKind) -> (Graph, NodeId, NodeId) {
    let mut graph = Graph::new(GraphId(0));
    let meta = Arc::new(TsMeta::scalar(kind));
    let source = graph.add_node("source", Box::new(OnceNode::new(at, value)), TsValue::new(meta.clone()));
    let recorder_id = NodeId(source.0 + 1);
    let recorder = graph.add_node(
        "recorder",
        Box::new(RecorderNode::new(source)),
        TsValue::new(meta),
    );
    assert_eq!(recorder, recorder_id);
    graph.connect(source, recorder);
    (graph, source, recorder)
}

/// Run an engine with a `SimulationClock` until it has nothing left
/// scheduled, seeding the initial schedule with `seed`.
pub fn run_to_end(graph: Graph, seed: &[(NodeId, EngineTime)]) -> EvaluationEngine<SimulationClock> {
    let clock = SimulationClock::unbounded();
    let mut engine = EvaluationEngine::new(graph, clock);
    for &(id, at) in seed {
        engine.schedule_at(id, at);
    }
    let mut observer = NullObserver;
    engine.run(EvalMode::RunToEnd, &mut observer).expect("run_to_end failed");
    engine
}

/// A `LifecycleObserver` that records every tick for assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub ticks: Vec<(NodeId, EngineTime)>,
    pub errors: Vec<String>,
}

impl LifecycleObserver for RecordingObserver {
    fn on_tick(&mut self, _graph: &Graph, id: NodeId, now: EngineTime) {
        self.ticks.push((id, now));
    }

    fn on_error(&mut self, _graph: &Graph, _id: NodeId, err: &tsgraph_engine::error::GraphError) {
        self.errors.push(err.to_string());
    }
}
