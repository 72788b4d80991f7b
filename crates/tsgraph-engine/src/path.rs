//! Graph-aware navigation paths.
//!
//! `ShortPath` is the cheap, slot-indexed form used internally for
//! navigation and link targets. `FqPath` is the serializable form where
//! TSD slot indices are resolved back to cloned key values by walking
//! the live tree — used only at the persistence/recordable boundary,
//! never on the hot evaluation path.

use std::fmt;

use crate::node::NodeId;
use crate::value::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    In,
    Out,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Port::In => "in",
            Port::Out => "out",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathSeg {
    Field(usize),
    Index(usize),
    Slot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShortPath {
    pub node: NodeId,
    pub port: PortTag,
    pub segs: Vec<PathSeg>,
}

/// `Port` without the `Display` impl getting in the way of deriving
/// `Hash`/`Eq` on `ShortPath` (bitwise-simple tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortTag {
    In,
    Out,
}

impl From<Port> for PortTag {
    fn from(p: Port) -> Self {
        match p {
            Port::In => PortTag::In,
            Port::Out => PortTag::Out,
        }
    }
}

impl ShortPath {
    pub fn new(node: NodeId, port: Port) -> Self {
        ShortPath {
            node,
            port: port.into(),
            segs: Vec::new(),
        }
    }

    pub fn field(mut self, index: usize) -> Self {
        self.segs.push(PathSeg::Field(index));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segs.push(PathSeg::Index(index));
        self
    }

    pub fn slot(mut self, slot: usize) -> Self {
        self.segs.push(PathSeg::Slot(slot));
        self
    }
}

/// A named segment, used only when resolving a `ShortPath` into its
/// serializable `FQPath` form.
#[derive(Debug, Clone, PartialEq)]
pub enum FqSeg {
    Field(String),
    Index(usize),
    Key(ScalarValue),
}

impl fmt::Display for FqSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FqSeg::Field(name) => write!(f, ".{name}"),
            FqSeg::Index(i) => write!(f, "[{i}]"),
            FqSeg::Key(k) => write!(f, "[{k}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FqPath {
    pub node_path: Vec<usize>,
    pub port: PortTag,
    pub segs: Vec<FqSeg>,
}

impl fmt::Display for FqPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        for (i, p) in self.node_path.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{p}")?;
        }
        write!(
            f,
            ":{}",
            match self.port {
                PortTag::In => "in",
                PortTag::Out => "out",
            }
        )?;
        for seg in &self.segs {
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    #[test]
    fn short_path_builder_appends_segments_in_order() {
        let path = ShortPath::new(NodeId(3), Port::Out).field(2).index(5);
        assert_eq!(path.node, NodeId(3));
        assert_eq!(path.port, PortTag::Out);
        assert_eq!(path.segs, vec![PathSeg::Field(2), PathSeg::Index(5)]);
    }

    #[test]
    fn fq_path_renders_node_chain_port_and_segments() {
        let path = FqPath {
            node_path: vec![0, 3],
            port: PortTag::Out,
            segs: vec![FqSeg::Field("a".into()), FqSeg::Index(2)],
        };
        assert_eq!(path.to_string(), "/0/3:out.a[2]");
    }

    #[test]
    fn fq_seg_key_renders_the_scalar_in_brackets() {
        let seg = FqSeg::Key(ScalarValue::Text("b".into()));
        assert_eq!(seg.to_string(), "[b]");
    }
}
