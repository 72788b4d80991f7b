//! Type-erased, homogeneous value storage.
//!
//! A `Value` is a plain enum; ownership, cloning and dropping are
//! handled by the compiler, and equality/hashing come from
//! `PartialEq`/`Hash`. What's genuinely load-bearing is the tagged
//! dispatch: a `TypeMeta` describing the shape a `Value` must have,
//! used for structural type-checking at bind time and for name/offset
//! lookup on bundle fields.

use bitflags::bitflags;
use std::hash::{Hash, Hasher};

pub use tsgraph_common::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int,
    Float,
    Bool,
    Text,
    Bytes,
}

impl ScalarKind {
    pub fn matches(self, value: &ScalarValue) -> bool {
        matches!(
            (self, value),
            (ScalarKind::Int, ScalarValue::Int(_))
                | (ScalarKind::Float, ScalarValue::Float(_))
                | (ScalarKind::Bool, ScalarValue::Bool(_))
                | (ScalarKind::Text, ScalarValue::Text(_))
                | (ScalarKind::Bytes, ScalarValue::Bytes(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListShape {
    Fixed(usize),
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Scalar(ScalarKind),
    Tuple,
    Bundle,
    List(ListShape),
    Set,
    Map,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u8 {
        /// Payload is Copy-like and small enough to live inline (informational only in Rust).
        const TRIVIALLY_COPYABLE = 0b0000_0001;
        /// Supports `Hash` (required to be usable as a set/map key).
        const HASHABLE = 0b0000_0010;
    }
}

/// Structural descriptor for a `Value` tree. Used for type-checking at
/// bind time and for name-based navigation — not for construction,
/// which Rust's ownership model already handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeMeta {
    pub kind: TypeKind,
    pub flags: TypeFlags,
    pub fields: Vec<FieldMeta>,
    pub element: Option<Box<TypeMeta>>,
    pub key: Option<Box<TypeMeta>>,
    pub value: Option<Box<TypeMeta>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldMeta {
    pub name: String,
    pub index: usize,
    pub ty: TypeMeta,
}

impl TypeMeta {
    pub fn scalar(kind: ScalarKind) -> Self {
        let hashable = !matches!(kind, ScalarKind::Bytes);
        let mut flags = TypeFlags::TRIVIALLY_COPYABLE;
        if hashable {
            flags |= TypeFlags::HASHABLE;
        }
        TypeMeta {
            kind: TypeKind::Scalar(kind),
            flags,
            fields: Vec::new(),
            element: None,
            key: None,
            value: None,
        }
    }

    pub fn bundle(fields: Vec<FieldMeta>) -> Self {
        TypeMeta {
            kind: TypeKind::Bundle,
            flags: TypeFlags::empty(),
            fields,
            element: None,
            key: None,
            value: None,
        }
    }

    pub fn list(element: TypeMeta, shape: ListShape) -> Self {
        TypeMeta {
            kind: TypeKind::List(shape),
            flags: TypeFlags::empty(),
            fields: Vec::new(),
            element: Some(Box::new(element)),
            key: None,
            value: None,
        }
    }

    pub fn set(key: TypeMeta) -> Self {
        TypeMeta {
            kind: TypeKind::Set,
            flags: TypeFlags::empty(),
            fields: Vec::new(),
            element: None,
            key: Some(Box::new(key)),
            value: None,
        }
    }

    pub fn map(key: TypeMeta, value: TypeMeta) -> Self {
        TypeMeta {
            kind: TypeKind::Map,
            flags: TypeFlags::empty(),
            fields: Vec::new(),
            element: None,
            key: Some(Box::new(key)),
            value: Some(Box::new(value)),
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.index)
    }
}

/// An owning instance of a `TypeMeta` shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    Tuple(Vec<Value>),
    Bundle(Vec<Value>),
    List(Vec<Value>),
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Scalar(s) => {
                state.write_u8(0);
                s.hash(state);
            }
            Value::Tuple(v) => {
                state.write_u8(1);
                v.hash(state);
            }
            Value::Bundle(v) => {
                state.write_u8(2);
                v.hash(state);
            }
            Value::List(v) => {
                state.write_u8(3);
                v.hash(state);
            }
        }
    }
}

/// A non-owning `(data, shape)` pair, navigable by slot index.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub data: &'a Value,
    pub meta: &'a TypeMeta,
}

impl<'a> View<'a> {
    pub fn new(data: &'a Value, meta: &'a TypeMeta) -> Self {
        View { data, meta }
    }

    pub fn as_scalar(&self) -> crate::error::GraphResult<&'a ScalarValue> {
        match self.data {
            Value::Scalar(s) => Ok(s),
            _ => Err(crate::error::GraphError::type_mismatch(
                "view does not hold a scalar",
            )),
        }
    }

    pub fn field(&self, index: usize) -> crate::error::GraphResult<View<'a>> {
        match (self.data, &self.meta.kind) {
            (Value::Bundle(v), crate::value::TypeKind::Bundle) | (Value::Tuple(v), crate::value::TypeKind::Tuple) => {
                let child_meta = self
                    .meta
                    .fields
                    .get(index)
                    .map(|f| &f.ty)
                    .ok_or_else(|| crate::error::GraphError::index_out_of_range(index, self.meta.fields.len()))?;
                v.get(index)
                    .map(|d| View::new(d, child_meta))
                    .ok_or_else(|| crate::error::GraphError::index_out_of_range(index, v.len()))
            }
            _ => Err(crate::error::GraphError::type_mismatch("view is not a bundle/tuple")),
        }
    }

    pub fn field_by_name(&self, name: &str) -> crate::error::GraphResult<View<'a>> {
        let idx = self
            .meta
            .field_index(name)
            .ok_or_else(|| crate::error::GraphError::binding_error(format!("no field named '{name}'")))?;
        self.field(idx)
    }

    pub fn list_get(&self, index: usize) -> crate::error::GraphResult<View<'a>> {
        match self.data {
            Value::List(v) => {
                let elem_meta = self
                    .meta
                    .element
                    .as_deref()
                    .ok_or_else(|| crate::error::GraphError::type_mismatch("list has no element type"))?;
                v.get(index)
                    .map(|d| View::new(d, elem_meta))
                    .ok_or_else(|| crate::error::GraphError::index_out_of_range(index, v.len()))
            }
            _ => Err(crate::error::GraphError::type_mismatch("view is not a list")),
        }
    }

    pub fn len(&self) -> usize {
        match self.data {
            Value::Tuple(v) | Value::Bundle(v) | Value::List(v) => v.len(),
            Value::Scalar(_) => 1,
        }
    }
}

pub fn default_for(meta: &TypeMeta) -> Value {
    match &meta.kind {
        TypeKind::Scalar(ScalarKind::Int) => Value::Scalar(ScalarValue::Int(0)),
        TypeKind::Scalar(ScalarKind::Float) => Value::Scalar(ScalarValue::Float(0.0)),
        TypeKind::Scalar(ScalarKind::Bool) => Value::Scalar(ScalarValue::Bool(false)),
        TypeKind::Scalar(ScalarKind::Text) => Value::Scalar(ScalarValue::Text(String::new())),
        TypeKind::Scalar(ScalarKind::Bytes) => Value::Scalar(ScalarValue::Bytes(Vec::new())),
        TypeKind::Tuple => Value::Tuple(meta.fields.iter().map(|f| default_for(&f.ty)).collect()),
        TypeKind::Bundle => Value::Bundle(meta.fields.iter().map(|f| default_for(&f.ty)).collect()),
        TypeKind::List(ListShape::Fixed(n)) => {
            let elem = meta.element.as_deref().expect("fixed list needs element type");
            Value::List((0..*n).map(|_| default_for(elem)).collect())
        }
        TypeKind::List(ListShape::Dynamic) => Value::List(Vec::new()),
        TypeKind::Set | TypeKind::Map => {
            panic!("Set/Map values are owned by KeySet-backed TS nodes, not plain Value trees")
        }
    }
}
