//! A failure boundary: runs a wrapped node's `eval` under a guard and,
//! if it returns a compute error, swallows it and ticks this node's
//! `error` field instead of propagating the failure up the call stack.
//! The `value` field republishes the inner node's output on success and
//! is left untouched on a failing tick.

use tsgraph_common::EngineTime;

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::node::{NodeCompute, NodeId};
use crate::schema::{TsField, TsMeta};
use crate::value::{ScalarKind, ScalarValue};

const VALUE_FIELD: usize = 0;
const ERROR_FIELD: usize = 1;
const ERROR_KIND: usize = 0;
const ERROR_AT_TIME: usize = 1;
const ERROR_INNER_NODE: usize = 2;
const ERROR_MESSAGE: usize = 3;

pub struct TryExceptNode {
    inner: NodeId,
    last_error: Option<GraphError>,
}

impl TryExceptNode {
    pub fn new(inner: NodeId) -> Self {
        TryExceptNode { inner, last_error: None }
    }

    pub fn last_error(&self) -> Option<&GraphError> {
        self.last_error.as_ref()
    }

    /// Schema for a `TryExceptNode`'s own output: the inner node's
    /// value, plus a sibling `error` bundle that ticks with
    /// `{kind, at_time, inner_node, message}` whenever the inner eval
    /// fails that cycle.
    pub fn output_meta(value_meta: TsMeta) -> TsMeta {
        TsMeta::bundle(vec![
            TsField::new(VALUE_FIELD, "value", value_meta),
            TsField::new(
                ERROR_FIELD,
                "error",
                TsMeta::bundle(vec![
                    TsField::new(ERROR_KIND, "kind", TsMeta::scalar(ScalarKind::Text)),
                    TsField::new(ERROR_AT_TIME, "at_time", TsMeta::scalar(ScalarKind::Int)),
                    TsField::new(ERROR_INNER_NODE, "inner_node", TsMeta::scalar(ScalarKind::Int)),
                    TsField::new(ERROR_MESSAGE, "message", TsMeta::scalar(ScalarKind::Text)),
                ]),
            ),
        ])
    }
}

impl NodeCompute for TryExceptNode {
    /// Runs before `eval` this tick: drives the inner node's own `eval`
    /// under the boundary and records the outcome. `eval_node` needs
    /// `&mut Graph`, which only `restructure` has, so the guarded run
    /// happens here rather than in `eval` itself.
    fn restructure(&mut self, graph: &mut Graph, _id: NodeId, now: EngineTime) -> GraphResult<()> {
        self.last_error = graph.eval_node(self.inner, now).err();
        Ok(())
    }

    fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
        match self.last_error.take() {
            None => {
                let owned = crate::view::resolve(graph, &crate::path::ShortPath::new(self.inner, crate::path::Port::Out))?;
                if owned.ticked(now) {
                    let scalar = owned.as_scalar()?;
                    graph.with_output_mut(id, |out| -> GraphResult<()> { out.field_mut(VALUE_FIELD)?.set_scalar(now, scalar) })?;
                }
                Ok(())
            }
            Some(err) => {
                let kind = err.kind.to_string();
                let message = err.message.clone().unwrap_or_default();
                let inner_node = err.node_id.unwrap_or(self.inner.0 as u64) as i64;
                graph.with_output_mut(id, |out| -> GraphResult<()> {
                    let error_field = out.field_mut(ERROR_FIELD)?;
                    error_field.field_mut(ERROR_KIND)?.set_scalar(now, ScalarValue::Text(kind))?;
                    error_field.field_mut(ERROR_AT_TIME)?.set_scalar(now, ScalarValue::Int(now.0))?;
                    error_field.field_mut(ERROR_INNER_NODE)?.set_scalar(now, ScalarValue::Int(inner_node))?;
                    error_field.field_mut(ERROR_MESSAGE)?.set_scalar(now, ScalarValue::Text(message))?;
                    Ok(())
                })?;
                self.last_error = Some(err);
                Ok(())
            }
        }
    }
}

/// Wraps a compute failure from a node's `eval` into the `ComputeFailure`
/// variant a `TryExceptNode` expects, attaching identifying context.
pub fn wrap_failure(graph: &Graph, id: NodeId, cause: impl std::fmt::Display) -> GraphError {
    GraphError::compute_failure(id.0 as u64, graph.node_name(id), cause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphId;
    use crate::tsvalue::TsValue;
    use std::sync::Arc;

    struct NoopCompute;
    impl NodeCompute for NoopCompute {
        fn eval(&mut self, _graph: &Graph, _id: NodeId, _now: EngineTime) -> GraphResult<()> {
            Ok(())
        }
    }

    struct SetScalar(i64);
    impl NodeCompute for SetScalar {
        fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
            graph.with_output_mut(id, |out| out.set_scalar(now, ScalarValue::Int(self.0)))
        }
    }

    struct AlwaysFails;
    impl NodeCompute for AlwaysFails {
        fn eval(&mut self, graph: &Graph, id: NodeId, _now: EngineTime) -> GraphResult<()> {
            Err(wrap_failure(graph, id, "division by zero"))
        }
    }

    fn guarded_node(graph: &mut Graph, inner: NodeId) -> (TryExceptNode, NodeId) {
        let out_meta = Arc::new(TryExceptNode::output_meta(TsMeta::scalar(ScalarKind::Int)));
        let try_id = graph.add_node("guarded", Box::new(NoopCompute), TsValue::new(out_meta));
        (TryExceptNode::new(inner), try_id)
    }

    #[test]
    fn fresh_node_has_no_recorded_error() {
        let node = TryExceptNode::new(NodeId(0));
        assert!(node.last_error().is_none());
    }

    #[test]
    fn restructure_runs_the_inner_eval_and_eval_republishes_its_value() {
        let mut graph = Graph::new(GraphId(0));
        let inner = graph.add_node("inner", Box::new(SetScalar(7)), TsValue::new(Arc::new(TsMeta::scalar(ScalarKind::Int))));
        graph.start_node(inner).unwrap();
        let (mut node, try_id) = guarded_node(&mut graph, inner);

        node.restructure(&mut graph, try_id, EngineTime(1)).unwrap();
        assert!(node.last_error().is_none());

        node.eval(&graph, try_id, EngineTime(1)).unwrap();
        graph.with_output(try_id, |out| {
            assert_eq!(out.field(VALUE_FIELD).unwrap().as_scalar().unwrap(), &ScalarValue::Int(7));
        });
    }

    #[test]
    fn a_failing_inner_eval_is_caught_and_ticks_the_error_field_without_touching_value() {
        let mut graph = Graph::new(GraphId(0));
        let inner = graph.add_node("div", Box::new(AlwaysFails), TsValue::new(Arc::new(TsMeta::scalar(ScalarKind::Int))));
        graph.start_node(inner).unwrap();
        let (mut node, try_id) = guarded_node(&mut graph, inner);

        node.restructure(&mut graph, try_id, EngineTime(5)).unwrap();
        assert!(node.last_error().unwrap().is_compute_failure());

        node.eval(&graph, try_id, EngineTime(5)).unwrap();
        assert!(node.last_error().is_some(), "the boundary keeps reporting the last error until the inner eval succeeds again");

        graph.with_output(try_id, |out| {
            assert!(!out.field(VALUE_FIELD).unwrap().ticked(EngineTime(5)));
            let error = out.field(ERROR_FIELD).unwrap();
            assert_eq!(error.field(ERROR_KIND).unwrap().as_scalar().unwrap(), &ScalarValue::Text("ComputeFailure".into()));
            assert_eq!(error.field(ERROR_AT_TIME).unwrap().as_scalar().unwrap(), &ScalarValue::Int(5));
            assert_eq!(error.field(ERROR_INNER_NODE).unwrap().as_scalar().unwrap(), &ScalarValue::Int(inner.0 as i64));
            assert_eq!(error.field(ERROR_MESSAGE).unwrap().as_scalar().unwrap(), &ScalarValue::Text("division by zero".into()));
        });
    }

    #[test]
    fn a_later_successful_eval_clears_the_recorded_error() {
        struct FailsOnce(std::cell::Cell<bool>);
        impl NodeCompute for FailsOnce {
            fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
                if !self.0.replace(true) {
                    Err(wrap_failure(graph, id, "cold start"))
                } else {
                    graph.with_output_mut(id, |out| out.set_scalar(now, ScalarValue::Int(3)))
                }
            }
        }

        let mut graph = Graph::new(GraphId(0));
        let inner = graph.add_node(
            "flaky",
            Box::new(FailsOnce(std::cell::Cell::new(false))),
            TsValue::new(Arc::new(TsMeta::scalar(ScalarKind::Int))),
        );
        graph.start_node(inner).unwrap();
        let (mut node, try_id) = guarded_node(&mut graph, inner);

        node.restructure(&mut graph, try_id, EngineTime(1)).unwrap();
        node.eval(&graph, try_id, EngineTime(1)).unwrap();
        assert!(node.last_error().is_some());

        node.restructure(&mut graph, try_id, EngineTime(2)).unwrap();
        assert!(node.last_error().is_none());
        node.eval(&graph, try_id, EngineTime(2)).unwrap();
        graph.with_output(try_id, |out| {
            assert_eq!(out.field(VALUE_FIELD).unwrap().as_scalar().unwrap(), &ScalarValue::Int(3));
        });
    }

    /// End-to-end: a trigger node's tick schedules the guard (never the
    /// inner node directly); a real `EvaluationEngine` run drives the
    /// boundary's `restructure`+`eval` and the inner failure surfaces as
    /// a ticked `error` field while `value` is left unmodified, and the
    /// failure never escapes to abort the run.
    #[test]
    fn engine_run_captures_an_inner_compute_failure_without_aborting() {
        use crate::scheduler::{EvaluationEngine, NullObserver};

        struct Trigger;
        impl NodeCompute for Trigger {
            fn eval(&mut self, graph: &Graph, id: NodeId, now: EngineTime) -> GraphResult<()> {
                graph.with_output_mut(id, |out| out.set_scalar(now, ScalarValue::Int(1)))
            }
        }

        let mut graph = Graph::new(GraphId(0));
        let trigger = graph.add_node("trigger", Box::new(Trigger), TsValue::new(Arc::new(TsMeta::scalar(ScalarKind::Int))));
        let inner = graph.add_node("div", Box::new(AlwaysFails), TsValue::new(Arc::new(TsMeta::scalar(ScalarKind::Int))));
        let out_meta = Arc::new(TryExceptNode::output_meta(TsMeta::scalar(ScalarKind::Int)));
        let try_id = graph.add_node("guarded", Box::new(TryExceptNode::new(inner)), TsValue::new(out_meta));
        graph.connect(trigger, try_id);

        let clock = crate::clock::SimulationClock::unbounded();
        let mut engine = EvaluationEngine::new(graph, clock);
        engine.schedule_at(trigger, EngineTime(3));
        let mut observer = NullObserver;
        engine.start(&mut observer).unwrap();
        engine.tick(&mut observer).unwrap();
        let got = engine.tick(&mut observer).unwrap();
        assert_eq!(got, Some(EngineTime(3)), "the inner failure must not abort the run");

        engine.graph.with_output(try_id, |out| {
            assert!(!out.field(VALUE_FIELD).unwrap().ticked(EngineTime(3)));
            let error = out.field(ERROR_FIELD).unwrap();
            assert_eq!(error.field(ERROR_KIND).unwrap().as_scalar().unwrap(), &ScalarValue::Text("ComputeFailure".into()));
            assert_eq!(error.field(ERROR_AT_TIME).unwrap().as_scalar().unwrap(), &ScalarValue::Int(3));
            assert_eq!(error.field(ERROR_INNER_NODE).unwrap().as_scalar().unwrap(), &ScalarValue::Int(inner.0 as i64));
        });
    }

    #[test]
    fn wrap_failure_carries_the_node_id_and_name() {
        let mut graph = Graph::new(GraphId(0));
        let meta = Arc::new(TsMeta::scalar(ScalarKind::Int));
        let inner = graph.add_node("div", Box::new(NoopCompute), TsValue::new(meta));
        let err = wrap_failure(&graph, inner, "division by zero");
        assert!(err.is_compute_failure());
        assert_eq!(err.fq_path.as_deref(), Some("div"));
        assert_eq!(err.message.as_deref(), Some("division by zero"));
    }
}
