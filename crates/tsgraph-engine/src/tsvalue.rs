//! The fused time-series value tree.
//!
//! Each `TsValue` node carries its current value, the time it last
//! ticked, and — for collection kinds — the delta accumulated so far
//! this tick. Structure mirrors `TsMeta` exactly: a bundle's children
//! are themselves `TsValue`s with their own `modified_at`, so "did this
//! particular field tick this cycle" is answered locally without
//! walking back up to a parent.

use std::collections::VecDeque;
use std::sync::Arc;

use tsgraph_common::EngineTime;

use crate::delta::{MapDelta, SetDelta};
use crate::error::{GraphError, GraphResult};
use crate::keyset::KeySet;
use crate::link::LinkTarget;
use crate::schema::{TsKind, TsMeta, WindowShape};
use crate::value::{ScalarKind, ScalarValue, Value};

#[derive(Debug, Clone)]
pub enum TsNode {
    Leaf(Value),
    Signal,
    Bundle(Vec<TsValue>),
    List(Vec<TsValue>),
    Set {
        keys: KeySet<ScalarValue>,
        delta: SetDelta,
    },
    Dict {
        keys: KeySet<ScalarValue>,
        values: Vec<Option<TsValue>>,
        delta: MapDelta,
    },
    Window {
        shape: WindowShape,
        buffer: VecDeque<(EngineTime, ScalarValue)>,
    },
    Ref(Option<LinkTarget>),
}

#[derive(Debug, Clone)]
pub struct TsValue {
    pub meta: Arc<TsMeta>,
    pub modified_at: EngineTime,
    pub node: TsNode,
}

impl TsValue {
    pub fn new(meta: Arc<TsMeta>) -> Self {
        let node = Self::default_node(&meta);
        TsValue {
            meta,
            modified_at: EngineTime::NEVER,
            node,
        }
    }

    fn default_node(meta: &TsMeta) -> TsNode {
        match &meta.kind {
            TsKind::Ts(kind) => TsNode::Leaf(default_scalar(*kind)),
            TsKind::Signal => TsNode::Signal,
            TsKind::Bundle(fields) => {
                TsNode::Bundle(fields.iter().map(|f| TsValue::new(Arc::new(f.meta.clone()))).collect())
            }
            TsKind::List(elem, shape) => match shape {
                crate::value::ListShape::Fixed(n) => {
                    TsNode::List((0..*n).map(|_| TsValue::new(Arc::new((**elem).clone()))).collect())
                }
                crate::value::ListShape::Dynamic => TsNode::List(Vec::new()),
            },
            TsKind::Set(_) => TsNode::Set {
                keys: KeySet::new(),
                delta: SetDelta::default(),
            },
            TsKind::Dict(_, _) => TsNode::Dict {
                keys: KeySet::new(),
                values: Vec::new(),
                delta: MapDelta::default(),
            },
            TsKind::Window(_, shape) => TsNode::Window {
                shape: *shape,
                buffer: VecDeque::new(),
            },
            TsKind::Ref(_) => TsNode::Ref(None),
        }
    }

    pub fn ticked(&self, now: EngineTime) -> bool {
        self.modified_at == now
    }

    pub fn valid(&self) -> bool {
        self.modified_at.is_valid()
    }

    pub fn set_scalar(&mut self, now: EngineTime, value: ScalarValue) -> GraphResult<()> {
        match &mut self.node {
            TsNode::Leaf(v) => {
                *v = Value::Scalar(value);
                self.modified_at = now;
                Ok(())
            }
            _ => Err(GraphError::type_mismatch("set_scalar on a non-leaf TsValue")),
        }
    }

    pub fn as_scalar(&self) -> GraphResult<&ScalarValue> {
        match &self.node {
            TsNode::Leaf(Value::Scalar(v)) => Ok(v),
            _ => Err(GraphError::type_mismatch("value is not a scalar leaf")),
        }
    }

    pub fn tick_signal(&mut self, now: EngineTime) -> GraphResult<()> {
        match &self.node {
            TsNode::Signal => {
                self.modified_at = now;
                Ok(())
            }
            _ => Err(GraphError::type_mismatch("tick_signal on a non-signal TsValue")),
        }
    }

    pub fn field(&self, index: usize) -> GraphResult<&TsValue> {
        match &self.node {
            TsNode::Bundle(children) => children
                .get(index)
                .ok_or_else(|| GraphError::index_out_of_range(index, children.len())),
            _ => Err(GraphError::type_mismatch("not a bundle")),
        }
    }

    pub fn field_mut(&mut self, index: usize) -> GraphResult<&mut TsValue> {
        match &mut self.node {
            TsNode::Bundle(children) => {
                let len = children.len();
                children
                    .get_mut(index)
                    .ok_or_else(|| GraphError::index_out_of_range(index, len))
            }
            _ => Err(GraphError::type_mismatch("not a bundle")),
        }
    }

    pub fn list_len(&self) -> GraphResult<usize> {
        match &self.node {
            TsNode::List(children) => Ok(children.len()),
            _ => Err(GraphError::type_mismatch("not a list")),
        }
    }

    pub fn list_get(&self, index: usize) -> GraphResult<&TsValue> {
        match &self.node {
            TsNode::List(children) => children
                .get(index)
                .ok_or_else(|| GraphError::index_out_of_range(index, children.len())),
            _ => Err(GraphError::type_mismatch("not a list")),
        }
    }

    pub fn list_push(&mut self, now: EngineTime, elem_meta: Arc<TsMeta>) -> GraphResult<usize> {
        match &mut self.node {
            TsNode::List(children) => {
                children.push(TsValue::new(elem_meta));
                self.modified_at = now;
                Ok(children.len() - 1)
            }
            _ => Err(GraphError::type_mismatch("not a list")),
        }
    }

    /// Insert a key into a `TSS`, returning whether it was newly added
    /// (a same-tick revival counts as added for sets).
    pub fn set_insert(&mut self, now: EngineTime, key: ScalarValue) -> GraphResult<bool> {
        match &mut self.node {
            TsNode::Set { keys, delta } => {
                let hash = crate::keyset::hash_of(&key);
                let (slot, outcome) = keys.insert(key);
                let added = !matches!(outcome, crate::keyset::InsertOutcome::AlreadyPresent);
                delta.on_insert(slot, outcome, hash);
                if added {
                    self.modified_at = now;
                }
                Ok(added)
            }
            _ => Err(GraphError::type_mismatch("not a set")),
        }
    }

    pub fn set_erase(&mut self, now: EngineTime, key: &ScalarValue) -> GraphResult<bool> {
        match &mut self.node {
            TsNode::Set { keys, delta } => {
                if let Some((slot, hash)) = keys.erase(key) {
                    delta.on_erase(slot, hash);
                    self.modified_at = now;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            _ => Err(GraphError::type_mismatch("not a set")),
        }
    }

    pub fn dict_insert(&mut self, now: EngineTime, key: ScalarValue, value_meta: &Arc<TsMeta>) -> GraphResult<usize> {
        match &mut self.node {
            TsNode::Dict { keys, values, delta } => {
                let hash = crate::keyset::hash_of(&key);
                let (slot, outcome) = keys.insert(key);
                while values.len() <= slot {
                    values.push(None);
                }
                if values[slot].is_none() {
                    values[slot] = Some(TsValue::new(value_meta.clone()));
                }
                delta.on_capacity(values.len(), || None);
                delta.on_insert(slot, outcome, hash);
                self.modified_at = now;
                Ok(slot)
            }
            _ => Err(GraphError::type_mismatch("not a dict")),
        }
    }

    pub fn dict_erase(&mut self, now: EngineTime, key: &ScalarValue) -> GraphResult<bool> {
        match &mut self.node {
            TsNode::Dict { keys, values, delta } => {
                if let Some((slot, hash)) = keys.erase(key) {
                    delta.on_erase(slot, hash);
                    if let Some(v) = values.get_mut(slot) {
                        *v = None;
                    }
                    self.modified_at = now;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            _ => Err(GraphError::type_mismatch("not a dict")),
        }
    }

    pub fn dict_get(&self, key: &ScalarValue) -> GraphResult<Option<&TsValue>> {
        match &self.node {
            TsNode::Dict { keys, values, .. } => Ok(keys.get_slot(key).and_then(|slot| values[slot].as_ref())),
            _ => Err(GraphError::type_mismatch("not a dict")),
        }
    }

    pub fn dict_get_mut(&mut self, key: &ScalarValue) -> GraphResult<Option<&mut TsValue>> {
        match &mut self.node {
            TsNode::Dict { keys, values, .. } => Ok(keys.get_slot(key).and_then(move |slot| values[slot].as_mut())),
            _ => Err(GraphError::type_mismatch("not a dict")),
        }
    }

    pub fn window_push(&mut self, now: EngineTime, value: ScalarValue) -> GraphResult<()> {
        match &mut self.node {
            TsNode::Window { shape, buffer } => {
                buffer.push_back((now, value));
                match *shape {
                    WindowShape::Size(n) => {
                        while buffer.len() > n {
                            buffer.pop_front();
                        }
                    }
                    WindowShape::Duration(dur) => {
                        let cutoff = now.0 - dur;
                        while buffer.front().map(|(t, _)| t.0 < cutoff).unwrap_or(false) {
                            buffer.pop_front();
                        }
                    }
                }
                self.modified_at = now;
                Ok(())
            }
            _ => Err(GraphError::type_mismatch("not a window")),
        }
    }

    pub fn window_values(&self) -> GraphResult<impl Iterator<Item = &ScalarValue>> {
        match &self.node {
            TsNode::Window { buffer, .. } => Ok(buffer.iter().map(|(_, v)| v)),
            _ => Err(GraphError::type_mismatch("not a window")),
        }
    }

    pub fn bind_ref(&mut self, now: EngineTime, target: Option<LinkTarget>) -> GraphResult<()> {
        match &mut self.node {
            TsNode::Ref(slot) => {
                *slot = target;
                self.modified_at = now;
                Ok(())
            }
            _ => Err(GraphError::type_mismatch("not a ref")),
        }
    }

    pub fn ref_target(&self) -> GraphResult<Option<&LinkTarget>> {
        match &self.node {
            TsNode::Ref(slot) => Ok(slot.as_ref()),
            _ => Err(GraphError::type_mismatch("not a ref")),
        }
    }

    /// Clear per-tick delta state once every observer has had a chance
    /// to read it. Does not reset `modified_at` — staleness is judged
    /// by comparing it against the clock's `now` on the next tick.
    pub fn end_tick(&mut self) {
        match &mut self.node {
            TsNode::Leaf(_) | TsNode::Signal | TsNode::Ref(_) | TsNode::Window { .. } => {}
            TsNode::Bundle(children) | TsNode::List(children) => {
                for c in children {
                    c.end_tick();
                }
            }
            TsNode::Set { keys, delta } => {
                delta.end_tick();
                keys.end_tick();
            }
            TsNode::Dict { keys, values, delta } => {
                for v in values.iter_mut().flatten() {
                    v.end_tick();
                }
                delta.end_tick();
                keys.end_tick();
            }
        }
    }
}

fn default_scalar(kind: ScalarKind) -> Value {
    match kind {
        ScalarKind::Int => Value::Scalar(ScalarValue::Int(0)),
        ScalarKind::Float => Value::Scalar(ScalarValue::Float(0.0)),
        ScalarKind::Bool => Value::Scalar(ScalarValue::Bool(false)),
        ScalarKind::Text => Value::Scalar(ScalarValue::Text(String::new())),
        ScalarKind::Bytes => Value::Scalar(ScalarValue::Bytes(Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_ticks_only_on_set_scalar() {
        let mut v = TsValue::new(Arc::new(TsMeta::scalar(ScalarKind::Int)));
        assert!(!v.valid());
        v.set_scalar(EngineTime(10), ScalarValue::Int(42)).unwrap();
        assert!(v.ticked(EngineTime(10)));
        assert_eq!(*v.as_scalar().unwrap(), ScalarValue::Int(42));
        assert!(!v.ticked(EngineTime(11)));
    }

    #[test]
    fn set_insert_then_erase_same_tick_cancels_in_delta() {
        let mut v = TsValue::new(Arc::new(TsMeta::set(crate::value::TypeMeta::scalar(ScalarKind::Int))));
        let added = v.set_insert(EngineTime(1), ScalarValue::Int(7)).unwrap();
        assert!(added);
        v.set_erase(EngineTime(1), &ScalarValue::Int(7)).unwrap();
        match &v.node {
            TsNode::Set { delta, .. } => assert!(delta.modified().is_empty()),
            _ => panic!("expected a set"),
        }
    }

    #[test]
    fn set_erase_then_reinsert_same_tick_still_counts_as_added() {
        let mut v = TsValue::new(Arc::new(TsMeta::set(crate::value::TypeMeta::scalar(ScalarKind::Int))));
        v.set_insert(EngineTime(1), ScalarValue::Int(7)).unwrap();
        v.end_tick();
        v.set_erase(EngineTime(2), &ScalarValue::Int(7)).unwrap();
        v.set_insert(EngineTime(2), ScalarValue::Int(7)).unwrap();
        match &v.node {
            TsNode::Set { delta, keys } => {
                let slot = keys.get_slot(&ScalarValue::Int(7)).unwrap();
                assert!(delta.modified().contains(&slot));
                assert!(!delta.removed.contains(&slot));
            }
            _ => panic!("expected a set"),
        }
    }

    #[test]
    fn dict_insert_get_erase_roundtrip() {
        let value_meta = Arc::new(TsMeta::scalar(ScalarKind::Text));
        let mut v = TsValue::new(Arc::new(TsMeta::dict(
            crate::value::TypeMeta::scalar(ScalarKind::Int),
            (*value_meta).clone(),
        )));
        v.dict_insert(EngineTime(1), ScalarValue::Int(1), &value_meta).unwrap();
        assert!(v.dict_get(&ScalarValue::Int(1)).unwrap().is_some());
        v.dict_erase(EngineTime(2), &ScalarValue::Int(1)).unwrap();
        assert!(v.dict_get(&ScalarValue::Int(1)).unwrap().is_none());
    }

    #[test]
    fn window_evicts_beyond_fixed_size() {
        let mut v = TsValue::new(Arc::new(TsMeta::window_size(ScalarKind::Int, 2)));
        v.window_push(EngineTime(1), ScalarValue::Int(1)).unwrap();
        v.window_push(EngineTime(2), ScalarValue::Int(2)).unwrap();
        v.window_push(EngineTime(3), ScalarValue::Int(3)).unwrap();
        let values: Vec<_> = v.window_values().unwrap().cloned().collect();
        assert_eq!(values, vec![ScalarValue::Int(2), ScalarValue::Int(3)]);
    }

    #[test]
    fn window_evicts_beyond_duration() {
        let mut v = TsValue::new(Arc::new(TsMeta::window_duration(ScalarKind::Int, 5)));
        v.window_push(EngineTime(0), ScalarValue::Int(1)).unwrap();
        v.window_push(EngineTime(3), ScalarValue::Int(2)).unwrap();
        v.window_push(EngineTime(10), ScalarValue::Int(3)).unwrap();
        let values: Vec<_> = v.window_values().unwrap().cloned().collect();
        assert_eq!(values, vec![ScalarValue::Int(3)]);
    }

    #[test]
    fn bundle_children_tick_independently() {
        let meta = Arc::new(TsMeta::bundle(vec![
            crate::schema::TsField::new(0, "a", TsMeta::scalar(ScalarKind::Int)),
            crate::schema::TsField::new(1, "b", TsMeta::scalar(ScalarKind::Int)),
        ]));
        let mut v = TsValue::new(meta);
        v.field_mut(0).unwrap().set_scalar(EngineTime(5), ScalarValue::Int(1)).unwrap();
        assert!(v.field(0).unwrap().ticked(EngineTime(5)));
        assert!(!v.field(1).unwrap().ticked(EngineTime(5)));
    }
}
