//! Scalar payloads carried by `TS[T]` leaves, bundle fields, and
//! collection keys/elements.
//!
//! This is deliberately small and closed: the engine's value layer
//! (`tsgraph_engine::value`) builds composite shapes (bundles, lists,
//! sets, maps) out of these scalars; every such tree bottoms out at a
//! scalar leaf.

use std::fmt;
use std::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ScalarValue::Int(i) => {
                state.write_u8(0);
                i.hash(state);
            }
            ScalarValue::Float(n) => {
                state.write_u8(1);
                n.to_bits().hash(state);
            }
            ScalarValue::Bool(b) => {
                state.write_u8(2);
                b.hash(state);
            }
            ScalarValue::Text(s) => {
                state.write_u8(3);
                s.hash(state);
            }
            ScalarValue::Bytes(b) => {
                state.write_u8(4);
                b.hash(state);
            }
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Int(i) => write!(f, "{i}"),
            ScalarValue::Float(n) => write!(f, "{n}"),
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Text(s) => write!(f, "{s}"),
            ScalarValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl ScalarValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Int(_) => "int",
            ScalarValue::Float(_) => "float",
            ScalarValue::Bool(_) => "bool",
            ScalarValue::Text(_) => "text",
            ScalarValue::Bytes(_) => "bytes",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(i) => Some(*i),
            ScalarValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(i) => Some(*i as f64),
            ScalarValue::Float(n) => Some(*n),
            ScalarValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            ScalarValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}
impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}
impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}
impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Text(v)
    }
}
impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}
