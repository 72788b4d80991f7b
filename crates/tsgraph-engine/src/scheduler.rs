//! The tick loop: advance the clock, run every ready node once, repeat.

use std::collections::BinaryHeap;
use std::cmp::Reverse;

use rustc_hash::FxHashSet;
use tsgraph_common::EngineTime;

use crate::clock::EvaluationClock;
use crate::error::GraphResult;
use crate::graph::Graph;
use crate::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Run until the clock reports no more scheduled work.
    RunToEnd,
    /// Run a single tick and return.
    SingleTick,
}

/// Callbacks fired around node lifecycle transitions, e.g. for logging
/// or test instrumentation.
pub trait LifecycleObserver: Send {
    fn on_start(&mut self, _graph: &Graph, _id: NodeId) {}
    fn on_tick(&mut self, _graph: &Graph, _id: NodeId, _now: EngineTime) {}
    fn on_stop(&mut self, _graph: &Graph, _id: NodeId) {}
    fn on_error(&mut self, _graph: &Graph, _id: NodeId, _err: &crate::error::GraphError) {}
}

pub struct NullObserver;
impl LifecycleObserver for NullObserver {}

/// A single-threaded cooperative scheduler: one rank-ordered queue of
/// "dirty" nodes per tick, each run to completion before the next is
/// popped, so a node never observes a half-updated upstream output.
pub struct EvaluationEngine<C: EvaluationClock> {
    pub graph: Graph,
    clock: C,
    schedule: BinaryHeap<Reverse<(i64, u32, NodeId)>>,
    scheduled_set: FxHashSet<NodeId>,
}

impl<C: EvaluationClock> EvaluationEngine<C> {
    pub fn new(graph: Graph, clock: C) -> Self {
        EvaluationEngine {
            graph,
            clock,
            schedule: BinaryHeap::new(),
            scheduled_set: FxHashSet::default(),
        }
    }

    pub fn schedule_at(&mut self, node: NodeId, at: EngineTime) {
        if self.scheduled_set.insert(node) {
            let rank = self.graph.rank_of(node);
            self.schedule.push(Reverse((at.0, rank, node)));
        }
    }

    fn next_scheduled_time(&self) -> Option<EngineTime> {
        self.schedule.peek().map(|Reverse((t, _, _))| EngineTime(*t))
    }

    pub fn start(&mut self, observer: &mut dyn LifecycleObserver) -> GraphResult<()> {
        #[cfg(feature = "tracing")]
        tracing::info!(nodes = self.graph.node_count(), "starting graph");
        let ids: Vec<NodeId> = self.graph.node_ids().collect();
        for id in ids {
            self.graph.start_node(id)?;
            observer.on_start(&self.graph, id);
        }
        Ok(())
    }

    pub fn stop(&mut self, observer: &mut dyn LifecycleObserver) -> GraphResult<()> {
        #[cfg(feature = "tracing")]
        tracing::info!("stopping graph");
        let ids: Vec<NodeId> = self.graph.node_ids().collect();
        for id in ids {
            self.graph.stop_node(id)?;
            observer.on_stop(&self.graph, id);
        }
        Ok(())
    }

    /// Run one tick: advance the clock to the next scheduled time, pop
    /// every node scheduled at exactly that time (rank order), evaluate
    /// each, and propagate to subscribers that haven't already been
    /// scheduled this tick. Returns the tick's time, or `None` if the
    /// clock has nothing left to do.
    pub fn tick(&mut self, observer: &mut dyn LifecycleObserver) -> GraphResult<Option<EngineTime>> {
        let next = self.next_scheduled_time();
        let now = match self.clock.advance(next) {
            Some(t) => t,
            None => return Ok(None),
        };

        let mut ready = Vec::new();
        while let Some(Reverse((t, _, id))) = self.schedule.peek().copied() {
            if t != now.0 {
                break;
            }
            self.schedule.pop();
            self.scheduled_set.remove(&id);
            if self.graph.node_state(id) == crate::node::NodeState::Started {
                ready.push(id);
            }
        }

        // Structural step runs first: a node may spawn or retire
        // sub-graph instances to match its driving input before anyone's
        // `eval` runs this tick. Freshly spawned instances are started
        // and evaluated immediately, in non-decreasing rank order (a
        // mesh's per-key instances may depend on each other and register
        // that dependency as part of the same restructure call), so
        // their output is ready for the node that spawned them to read
        // in its own `eval` below.
        for &id in &ready {
            let before = self.graph.node_count();
            self.graph.restructure_node(id, now)?;
            let after = self.graph.node_count();
            let mut spawned: Vec<NodeId> = (before..after).map(|idx| NodeId(idx as u32)).collect();
            spawned.sort_by_key(|n| self.graph.rank_of(*n));
            for spawned_id in spawned {
                self.graph.start_node(spawned_id)?;
                observer.on_start(&self.graph, spawned_id);
                self.graph.eval_node(spawned_id, now)?;
                observer.on_tick(&self.graph, spawned_id, now);
            }
        }

        for id in ready {
            match self.graph.eval_node(id, now) {
                Ok(()) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(node = %id, %now, "node ticked");
                    observer.on_tick(&self.graph, id, now);
                    let subs: Vec<NodeId> = self.graph.subscribers(id).to_vec();
                    for sub in subs {
                        self.schedule_at(sub, now);
                    }
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(node = %id, %now, error = %e, "node eval failed");
                    observer.on_error(&self.graph, id, &e);
                    return Err(e);
                }
            }
        }

        Ok(Some(now))
    }

    pub fn run(&mut self, mode: EvalMode, observer: &mut dyn LifecycleObserver) -> GraphResult<()> {
        self.start(observer)?;
        loop {
            match self.tick(observer)? {
                Some(_) if mode == EvalMode::SingleTick => break,
                Some(_) => continue,
                None => break,
            }
        }
        self.stop(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulationClock;
    use crate::graph::GraphId;
    use crate::node::NodeCompute;
    use crate::schema::TsMeta;
    use crate::tsvalue::TsValue;
    use crate::value::{ScalarKind, ScalarValue};
    use std::sync::Arc;

    struct TickOnce {
        at: EngineTime,
        fired: bool,
    }

    impl NodeCompute for TickOnce {
        fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
            if now == self.at && !self.fired {
                graph.with_output_mut(id, |out| out.set_scalar(now, ScalarValue::Int(1)))?;
                self.fired = true;
            }
            Ok(())
        }
    }

    struct CountSubscriber {
        calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl NodeCompute for CountSubscriber {
        fn eval(&mut self, _graph: &Graph, _id: NodeId, _now: EngineTime) -> GraphResult<()> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn propagates_to_subscribers_on_the_same_tick() {
        let mut graph = Graph::new(GraphId(0));
        let meta = Arc::new(TsMeta::scalar(ScalarKind::Int));
        let source = graph.add_node(
            "source",
            Box::new(TickOnce { at: EngineTime(5), fired: false }),
            TsValue::new(meta.clone()),
        );
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let sink = graph.add_node("sink", Box::new(CountSubscriber { calls: calls.clone() }), TsValue::new(meta));
        graph.connect(source, sink);

        let clock = SimulationClock::unbounded();
        let mut engine = EvaluationEngine::new(graph, clock);
        engine.schedule_at(source, EngineTime(5));
        let mut observer = NullObserver;
        engine.start(&mut observer).unwrap();
        let got = engine.tick(&mut observer).unwrap();
        assert_eq!(got, Some(EngineTime(5)));
        assert_eq!(
            calls.load(std::sync::atomic::Ordering::SeqCst),
            0,
            "sink is scheduled by propagation, not run in the same tick() call"
        );
        // The sink was scheduled by propagation; a second tick drains it
        // at the same logical time, before the clock advances further.
        let got2 = engine.tick(&mut observer).unwrap();
        assert_eq!(got2, Some(EngineTime(5)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn run_to_end_stops_once_schedule_is_empty() {
        let mut graph = Graph::new(GraphId(0));
        let meta = Arc::new(TsMeta::scalar(ScalarKind::Int));
        let source = graph.add_node(
            "source",
            Box::new(TickOnce { at: EngineTime(1), fired: false }),
            TsValue::new(meta),
        );
        let clock = SimulationClock::unbounded();
        let mut engine = EvaluationEngine::new(graph, clock);
        engine.schedule_at(source, EngineTime(1));
        let mut observer = NullObserver;
        engine.run(EvalMode::RunToEnd, &mut observer).unwrap();
        assert_eq!(engine.next_scheduled_time(), None);
    }
}
