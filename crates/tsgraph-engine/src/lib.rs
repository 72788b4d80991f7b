//! Reactive time-series computation engine.
//!
//! Evaluates a directed graph of nodes whose inputs and outputs are
//! time-series values. A scheduler decides which nodes to evaluate at
//! each discrete engine time, propagates changes along bound edges, and
//! advances time.
//!
//! Module dependency order mirrors construction order: value -> schema
//! -> tsvalue/views -> delta -> link -> clock -> engine/graph/node ->
//! nested.

pub mod clock;
pub mod delta;
pub mod error;
pub mod graph;
pub mod host;
pub mod keyset;
pub mod link;
pub mod nested;
pub mod node;
pub mod path;
pub mod scheduler;
pub mod schema;
pub mod traits;
pub mod tsvalue;
pub mod value;
pub mod view;

pub use tsgraph_common::{EngineTime, ScalarValue};

pub use error::GraphResult;
pub use graph::{Edge, Graph, GraphId};
pub use node::{Node, NodeCompute, NodeId};
pub use scheduler::{EvalMode, EvaluationEngine, LifecycleObserver};
