//! Delta trackers.
//!
//! `SetDelta`/`MapDelta` track slot-level add/remove/update sets for a
//! tick, with add⇄remove cancellation and an O(1) `was_removed` test via
//! a hashed index of removed keys. `BundleDeltaNav`/`ListDeltaNav` are
//! thin navigation wrappers: fixed-position containers don't have their
//! own add/remove semantics, they just forward to whichever children
//! have nested delta.
//!
//! A key erased and reinserted within the same tick is handled by
//! generation: a set always records the revived insertion as `added`
//! (and clears it from `removed`, so a slot never ends up in both sets
//! at tick end); a map treats the same-tick revival as a replace,
//! landing the slot in `updated` instead of `added`.

use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

use crate::keyset::InsertOutcome;

#[derive(Debug, Clone, Default)]
pub struct SetDelta {
    pub added: BTreeSet<usize>,
    pub removed: BTreeSet<usize>,
    pub removed_key_hashes: FxHashSet<u64>,
    pub cleared: bool,
}

impl SetDelta {
    pub fn on_insert(&mut self, slot: usize, outcome: InsertOutcome, key_hash: u64) {
        match outcome {
            InsertOutcome::AlreadyPresent => {}
            InsertOutcome::Fresh | InsertOutcome::RevivedSameTick => {
                self.removed.remove(&slot);
                self.removed_key_hashes.remove(&key_hash);
                self.added.insert(slot);
            }
        }
    }

    pub fn on_erase(&mut self, slot: usize, key_hash: u64) {
        if self.added.remove(&slot) {
            return;
        }
        self.removed.insert(slot);
        self.removed_key_hashes.insert(key_hash);
    }

    pub fn on_clear(&mut self) {
        self.cleared = true;
    }

    pub fn modified(&self) -> &BTreeSet<usize> {
        &self.added
    }

    pub fn was_key_removed(&self, key_hash: u64) -> bool {
        self.removed_key_hashes.contains(&key_hash)
    }

    pub fn end_tick(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.removed_key_hashes.clear();
        self.cleared = false;
    }
}

/// Per-value nested delta, recursively mirroring whichever part of the
/// `TSMeta` tree below a `TSD` value carries `has_delta`.
#[derive(Debug, Clone)]
pub enum DeltaNode {
    Leaf,
    Set(SetDelta),
    Map(MapDelta),
    Bundle(BundleDeltaNav),
    List(ListDeltaNav),
}

impl DeltaNode {
    pub fn end_tick(&mut self) {
        match self {
            DeltaNode::Leaf => {}
            DeltaNode::Set(s) => s.end_tick(),
            DeltaNode::Map(m) => m.end_tick(),
            DeltaNode::Bundle(b) => b.end_tick(),
            DeltaNode::List(l) => l.end_tick(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapDelta {
    pub added: BTreeSet<usize>,
    pub removed: BTreeSet<usize>,
    pub updated: BTreeSet<usize>,
    pub removed_key_hashes: FxHashSet<u64>,
    pub cleared: bool,
    /// One nested delta slot per `KeySet` slot, grown in lockstep via
    /// `on_capacity`. `None` where the value type has no delta.
    pub children: Vec<Option<DeltaNode>>,
}

impl MapDelta {
    pub fn on_capacity(&mut self, new_len: usize, child_factory: impl Fn() -> Option<DeltaNode>) {
        while self.children.len() < new_len {
            self.children.push(child_factory());
        }
    }

    pub fn on_insert(&mut self, slot: usize, outcome: InsertOutcome, key_hash: u64) {
        match outcome {
            InsertOutcome::AlreadyPresent => {}
            InsertOutcome::Fresh => {
                self.added.insert(slot);
            }
            InsertOutcome::RevivedSameTick => {
                // Treated as a replace: still present, value likely changed.
                self.removed.remove(&slot);
                self.removed_key_hashes.remove(&key_hash);
                self.updated.insert(slot);
            }
        }
    }

    pub fn on_erase(&mut self, slot: usize, key_hash: u64) {
        if self.added.remove(&slot) {
            return;
        }
        self.updated.remove(&slot);
        self.removed.insert(slot);
        self.removed_key_hashes.insert(key_hash);
    }

    pub fn on_update(&mut self, slot: usize) {
        if self.added.contains(&slot) {
            return;
        }
        self.updated.insert(slot);
    }

    pub fn on_clear(&mut self) {
        self.cleared = true;
    }

    pub fn modified(&self) -> BTreeSet<usize> {
        self.added.union(&self.updated).copied().collect()
    }

    pub fn was_key_removed(&self, key_hash: u64) -> bool {
        self.removed_key_hashes.contains(&key_hash)
    }

    pub fn end_tick(&mut self) {
        for slot in self.added.iter().chain(self.updated.iter()) {
            if let Some(Some(child)) = self.children.get_mut(*slot) {
                child.end_tick();
            }
        }
        self.added.clear();
        self.removed.clear();
        self.updated.clear();
        self.removed_key_hashes.clear();
        self.cleared = false;
    }
}

/// Navigation-only delta for a `TSB`: which field positions have nested
/// delta, keyed by field index.
#[derive(Debug, Clone, Default)]
pub struct BundleDeltaNav {
    pub children: Vec<Option<DeltaNode>>,
}

impl BundleDeltaNav {
    pub fn new(len: usize) -> Self {
        BundleDeltaNav {
            children: (0..len).map(|_| None).collect(),
        }
    }

    pub fn end_tick(&mut self) {
        for child in self.children.iter_mut().flatten() {
            child.end_tick();
        }
    }
}

/// Navigation-only delta for a `TSL`: which element positions have
/// nested delta, keyed by element index.
#[derive(Debug, Clone, Default)]
pub struct ListDeltaNav {
    pub children: Vec<Option<DeltaNode>>,
}

impl ListDeltaNav {
    pub fn new(len: usize) -> Self {
        ListDeltaNav {
            children: (0..len).map(|_| None).collect(),
        }
    }

    pub fn end_tick(&mut self) {
        for child in self.children.iter_mut().flatten() {
            child.end_tick();
        }
    }
}
