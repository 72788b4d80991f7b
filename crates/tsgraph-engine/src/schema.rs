//! The time-series schema tree.
//!
//! `TsMeta` is built once per distinct shape and interned by
//! `SchemaCache` so identical schemas (e.g. the per-key output schema of
//! many `TsdMapNode` sub-graphs) share one `Arc` and compare
//! pointer-equal.
//!
//! `TsMeta`'s own recursive shape deterministically determines the
//! time/observer/delta shape of every position below it, so `TsValue`
//! builds its trees directly from `TsMeta` by structural recursion
//! instead of consulting separately cached derived schemas.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::value::TypeMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowShape {
    /// Fixed element count (`TSW[T, size]`).
    Size(usize),
    /// Rolling duration in engine-time units (`TSW[T, duration]`).
    Duration(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TsField {
    pub index: usize,
    pub name: String,
    pub meta: TsMeta,
}

impl TsField {
    pub fn new(index: usize, name: impl Into<String>, meta: TsMeta) -> Self {
        TsField {
            index,
            name: name.into(),
            meta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TsKind {
    /// `TS[T]`
    Ts(crate::value::ScalarKind),
    /// `SIGNAL` — ticks with no payload.
    Signal,
    /// `TSB{fields}`
    Bundle(Vec<TsField>),
    /// `TSL[T, N]` (fixed) or `TSL[T, dyn]` (dynamic).
    List(Box<TsMeta>, crate::value::ListShape),
    /// `TSS[T]`
    Set(TypeMeta),
    /// `TSD[K, V]`
    Dict(TypeMeta, Box<TsMeta>),
    /// `TSW[T, size|duration]`
    Window(crate::value::ScalarKind, WindowShape),
    /// `REF[T]`
    Ref(Box<TsMeta>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TsMeta {
    pub kind: TsKind,
    pub has_delta: bool,
}

impl TsMeta {
    pub fn new(kind: TsKind) -> Self {
        let has_delta = Self::derive_has_delta(&kind);
        TsMeta { kind, has_delta }
    }

    fn derive_has_delta(kind: &TsKind) -> bool {
        match kind {
            TsKind::Set(_) | TsKind::Dict(_, _) => true,
            TsKind::Bundle(fields) => fields.iter().any(|f| f.meta.has_delta),
            TsKind::List(elem, _) => elem.has_delta,
            TsKind::Ref(_) | TsKind::Ts(_) | TsKind::Signal | TsKind::Window(_, _) => false,
        }
    }

    pub fn ts(kind: crate::value::ScalarKind) -> Self {
        Self::new(TsKind::Ts(kind))
    }

    pub fn scalar(kind: crate::value::ScalarKind) -> Self {
        Self::ts(kind)
    }

    pub fn signal() -> Self {
        Self::new(TsKind::Signal)
    }

    pub fn bundle(fields: Vec<TsField>) -> Self {
        Self::new(TsKind::Bundle(fields))
    }

    pub fn list_fixed(element: TsMeta, n: usize) -> Self {
        Self::new(TsKind::List(Box::new(element), crate::value::ListShape::Fixed(n)))
    }

    pub fn list_dyn(element: TsMeta) -> Self {
        Self::new(TsKind::List(Box::new(element), crate::value::ListShape::Dynamic))
    }

    pub fn set(key: TypeMeta) -> Self {
        Self::new(TsKind::Set(key))
    }

    pub fn dict(key: TypeMeta, value: TsMeta) -> Self {
        Self::new(TsKind::Dict(key, Box::new(value)))
    }

    pub fn window_size(element: crate::value::ScalarKind, n: usize) -> Self {
        Self::new(TsKind::Window(element, WindowShape::Size(n)))
    }

    pub fn window_duration(element: crate::value::ScalarKind, dur: i64) -> Self {
        Self::new(TsKind::Window(element, WindowShape::Duration(dur)))
    }

    pub fn reference(target: TsMeta) -> Self {
        Self::new(TsKind::Ref(Box::new(target)))
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        match &self.kind {
            TsKind::Bundle(fields) => fields.iter().find(|f| f.name == name).map(|f| f.index),
            _ => None,
        }
    }
}

/// Implemented by `#[derive(TsBundle)]` types to hand back their TSB
/// schema without the caller spelling out the field table by hand.
pub trait BundleShape {
    fn ts_bundle_meta() -> TsMeta;
}

/// Interns `TsMeta` values so identical schemas share one `Arc` and
/// compare pointer-equal.
pub struct SchemaCache {
    interned: Mutex<HashMap<TsMeta, Arc<TsMeta>>>,
}

impl SchemaCache {
    fn new() -> Self {
        SchemaCache {
            interned: Mutex::new(HashMap::new()),
        }
    }

    pub fn intern(&self, meta: TsMeta) -> Arc<TsMeta> {
        let mut guard = self.interned.lock().expect("schema cache poisoned");
        if let Some(existing) = guard.get(&meta) {
            return existing.clone();
        }
        let arc = Arc::new(meta.clone());
        guard.insert(meta, arc.clone());
        arc
    }

    pub fn len(&self) -> usize {
        self.interned.lock().expect("schema cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide schema cache singleton.
pub static SCHEMA_CACHE: Lazy<SchemaCache> = Lazy::new(SchemaCache::new);

pub fn intern(meta: TsMeta) -> Arc<TsMeta> {
    SCHEMA_CACHE.intern(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarKind;

    #[test]
    fn identical_shapes_intern_to_the_same_arc() {
        let cache = SchemaCache::new();
        let a = cache.intern(TsMeta::scalar(ScalarKind::Float));
        let b = cache.intern(TsMeta::scalar(ScalarKind::Float));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_shapes_intern_separately() {
        let cache = SchemaCache::new();
        let a = cache.intern(TsMeta::scalar(ScalarKind::Float));
        let b = cache.intern(TsMeta::scalar(ScalarKind::Int));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn bundle_has_delta_propagates_from_a_set_field() {
        let leaf = TsMeta::scalar(ScalarKind::Int);
        let set_field = TsMeta::set(crate::value::TypeMeta::scalar(ScalarKind::Int));
        let bundle = TsMeta::bundle(vec![
            TsField::new(0, "a", leaf),
            TsField::new(1, "b", set_field),
        ]);
        assert!(bundle.has_delta);
    }

    #[test]
    fn bundle_without_collection_fields_has_no_delta() {
        let bundle = TsMeta::bundle(vec![
            TsField::new(0, "a", TsMeta::scalar(ScalarKind::Int)),
            TsField::new(1, "b", TsMeta::scalar(ScalarKind::Bool)),
        ]);
        assert!(!bundle.has_delta);
    }
}
