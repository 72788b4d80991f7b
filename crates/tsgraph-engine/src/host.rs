//! The narrow contract an embedding host (a scripting layer, a
//! recorder, a UI) implements to push ticks in and read outputs out
//! without depending on the rest of the engine's internals.

use crate::error::GraphResult;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::value::ScalarValue;

/// Converts between a host's native representation and `ScalarValue`.
/// Kept deliberately narrow — hosts that need composite shapes build
/// them out of repeated scalar calls rather than this trait growing a
/// case for every `TsKind`.
pub trait HostCodec: Send {
    type Native;

    fn encode(&self, value: &ScalarValue) -> GraphResult<Self::Native>;
    fn decode(&self, native: &Self::Native) -> GraphResult<ScalarValue>;
}

/// Pushes a decoded value onto a graph input and requests the input's
/// owning node be scheduled, without the caller needing direct access
/// to the scheduler.
pub trait HostInputPort: Send {
    fn push(&mut self, graph: &Graph, node: NodeId, value: ScalarValue) -> GraphResult<()>;
}
