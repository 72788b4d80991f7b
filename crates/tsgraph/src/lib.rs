//! Meta crate re-exporting the engine's public surface plus the
//! `#[derive(TsBundle)]` macro under one name, so downstream users
//! depend on a single crate instead of assembling the workspace
//! members themselves.

pub use tsgraph_common::{EngineTime, GraphError, GraphErrorKind, ScalarValue};

pub use tsgraph_engine::{
    clock, delta, error, graph, host, keyset, link, nested, node, path, scheduler, schema,
    traits, tsvalue, value, view, Edge, Graph, GraphId, GraphResult, Node, NodeCompute, NodeId,
    EvalMode, EvaluationEngine, LifecycleObserver,
};

pub use tsgraph_macros::TsBundle;

/// Re-exported so a `#[derive(TsBundle)]` type's generated code (which
/// refers to `::tsgraph_engine::schema::...`) resolves for users who
/// only depend on this facade crate.
#[doc(hidden)]
pub use tsgraph_engine as __private_engine;
