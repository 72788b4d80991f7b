//! Read access into another node's output, following `REF` links.
//!
//! Outputs live behind a `Mutex` in the `Graph`'s node table (see
//! `graph::Graph::with_output`), so a borrowed view can't outlive the
//! lock guard that produced it. Rather than thread that lifetime
//! through every caller, these helpers read what they need — a scalar,
//! a presence check, a key list — while holding the lock, and hand back
//! an owned result. That's the right shape here anyway: most readers
//! just want "the current value", not a live window into storage.

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::link::LinkTarget;
use crate::node::NodeId;
use crate::path::{PathSeg, Port, PortTag, ShortPath};
use crate::tsvalue::TsValue;
use crate::value::ScalarValue;
use tsgraph_common::EngineTime;

const MAX_REF_HOPS: u32 = 64;

fn navigate<'a>(root: &'a TsValue, segs: &[PathSeg]) -> GraphResult<&'a TsValue> {
    let mut cur = root;
    for seg in segs {
        cur = match seg {
            PathSeg::Field(i) => cur.field(*i)?,
            PathSeg::Index(i) => cur.list_get(*i)?,
            PathSeg::Slot(i) => cur.list_get(*i)?,
        };
    }
    Ok(cur)
}

/// Resolve a `ShortPath` to the underlying `TsValue`, following any
/// `REF` at the end (or in the middle) of the chain up to a hop limit.
pub fn resolve(graph: &Graph, path: &ShortPath) -> GraphResult<TsValueOwned> {
    let mut current = path.clone();
    for _ in 0..MAX_REF_HOPS {
        let resolved = graph.with_output(current.node, |root| -> GraphResult<ResolveStep> {
            let value = navigate(root, &current.segs)?;
            if let crate::tsvalue::TsNode::Ref(Some(target)) = &value.node {
                Ok(ResolveStep::Follow(target.clone()))
            } else {
                Ok(ResolveStep::Owned(TsValueOwned::from(value)))
            }
        })?;
        match resolved {
            ResolveStep::Follow(target) => current = target.path,
            ResolveStep::Owned(owned) => return Ok(owned),
        }
    }
    Err(GraphError::binding_error("REF chain exceeded maximum hop count"))
}

enum ResolveStep {
    Follow(LinkTarget),
    Owned(TsValueOwned),
}

/// A snapshot of a `TsValue`'s externally-visible state, detached from
/// the graph's internal storage.
#[derive(Debug, Clone)]
pub struct TsValueOwned {
    pub modified_at: EngineTime,
    pub kind: TsValueOwnedKind,
}

#[derive(Debug, Clone)]
pub enum TsValueOwnedKind {
    Scalar(ScalarValue),
    Signal,
    Keys(Vec<ScalarValue>),
    Len(usize),
    Unit,
}

impl TsValueOwned {
    fn from(value: &TsValue) -> Self {
        use crate::tsvalue::TsNode;
        let kind = match &value.node {
            TsNode::Leaf(crate::value::Value::Scalar(s)) => TsValueOwnedKind::Scalar(s.clone()),
            TsNode::Leaf(_) => TsValueOwnedKind::Unit,
            TsNode::Signal => TsValueOwnedKind::Signal,
            TsNode::Set { keys, .. } => {
                TsValueOwnedKind::Keys(keys.iter_live().filter_map(|s| keys.key_at(s).cloned()).collect())
            }
            TsNode::Dict { keys, .. } => {
                TsValueOwnedKind::Keys(keys.iter_live().filter_map(|s| keys.key_at(s).cloned()).collect())
            }
            TsNode::Bundle(children) => TsValueOwnedKind::Len(children.len()),
            TsNode::List(children) => TsValueOwnedKind::Len(children.len()),
            TsNode::Window { buffer, .. } => TsValueOwnedKind::Len(buffer.len()),
            TsNode::Ref(_) => TsValueOwnedKind::Unit,
        };
        TsValueOwned {
            modified_at: value.modified_at,
            kind,
        }
    }

    pub fn as_scalar(&self) -> GraphResult<ScalarValue> {
        match &self.kind {
            TsValueOwnedKind::Scalar(s) => Ok(s.clone()),
            _ => Err(GraphError::type_mismatch("resolved value is not a scalar")),
        }
    }

    pub fn ticked(&self, now: EngineTime) -> bool {
        self.modified_at == now
    }
}

/// Read a node's scalar output directly, without going through a `ShortPath`.
pub fn read_scalar(graph: &Graph, node: NodeId) -> GraphResult<ScalarValue> {
    let owned = resolve(graph, &ShortPath::new(node, Port::Out))?;
    owned.as_scalar()
}

pub fn port_of(tag: PortTag) -> Port {
    match tag {
        PortTag::In => Port::In,
        PortTag::Out => Port::Out,
    }
}
