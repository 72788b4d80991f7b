//! Error taxonomy for the engine.
//!
//! `GraphError` is the one struct every fallible engine operation
//! returns. `node_id`/`fq_path` are carried as plain primitives here
//! (rather than the engine crate's own `NodeId`/`FQPath` types) so this
//! crate stays free of a dependency on `tsgraph-engine`.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphErrorKind {
    /// Schema disagreement in binding or `View::as_scalar`.
    TypeMismatch,
    /// Attempt to bind incompatible shapes (e.g. TSD key type mismatch).
    BindingError,
    /// A mesh dependency edge would close a cycle.
    CycleDetected,
    /// View navigation beyond a container's size.
    IndexOutOfRange,
    /// Operation on a link that is not active.
    NotActive,
    /// Operation on an input position that is not bound.
    NotBound,
    /// The engine was asked to stop.
    ClockStop,
    /// An exception escaped a compute body.
    ComputeFailure,
}

impl fmt::Display for GraphErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TypeMismatch => "TypeMismatch",
            Self::BindingError => "BindingError",
            Self::CycleDetected => "CycleDetected",
            Self::IndexOutOfRange => "IndexOutOfRange",
            Self::NotActive => "NotActive",
            Self::NotBound => "NotBound",
            Self::ClockStop => "ClockStop",
            Self::ComputeFailure => "ComputeFailure",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphError {
    pub kind: GraphErrorKind,
    pub message: Option<String>,
    /// Populated only for `ComputeFailure`.
    pub node_id: Option<u64>,
    /// Populated only for `ComputeFailure`; the serialized `FQPath`.
    pub fq_path: Option<String>,
}

impl From<GraphErrorKind> for GraphError {
    fn from(kind: GraphErrorKind) -> Self {
        Self {
            kind,
            message: None,
            node_id: None,
            fq_path: None,
        }
    }
}

impl GraphError {
    pub fn new(kind: GraphErrorKind) -> Self {
        kind.into()
    }

    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn type_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::new(GraphErrorKind::TypeMismatch).with_message(msg)
    }

    pub fn binding_error<S: Into<String>>(msg: S) -> Self {
        Self::new(GraphErrorKind::BindingError).with_message(msg)
    }

    pub fn cycle_detected() -> Self {
        Self::new(GraphErrorKind::CycleDetected)
    }

    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::new(GraphErrorKind::IndexOutOfRange)
            .with_message(format!("index {index} out of range (len {len})"))
    }

    pub fn not_active() -> Self {
        Self::new(GraphErrorKind::NotActive)
    }

    pub fn not_bound() -> Self {
        Self::new(GraphErrorKind::NotBound)
    }

    pub fn clock_stop() -> Self {
        Self::new(GraphErrorKind::ClockStop)
    }

    pub fn compute_failure<S: Into<String>>(node_id: u64, fq_path: S, cause: impl fmt::Display) -> Self {
        Self {
            kind: GraphErrorKind::ComputeFailure,
            message: Some(cause.to_string()),
            node_id: Some(node_id),
            fq_path: Some(fq_path.into()),
        }
    }

    pub fn is_compute_failure(&self) -> bool {
        self.kind == GraphErrorKind::ComputeFailure
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(node_id) = self.node_id {
            write!(f, " (node {node_id}")?;
            if let Some(ref path) = self.fq_path {
                write!(f, " at {path}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl Error for GraphError {}
