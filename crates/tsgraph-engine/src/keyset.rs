//! Slot-stable storage for set/map keys.
//!
//! Once a key is assigned a slot, it keeps that slot for its entire
//! lifetime in the collection; an alive-bitset tracks liveness and a
//! free list reuses erased slots — but only from the *next* mutation
//! onward, never within the tick that erased them, so `removed()`
//! iteration can still read the erased payload for the rest of the
//! tick.
//!
//! Capacity/insert/erase/clear notifications are wired here as direct
//! calls from the owning TSS/TSD view methods rather than through a
//! dynamic observer registry: each `KeySet` has exactly one delta
//! structure and one observer-list tree bound to it at construction,
//! so there is no dynamic multi-subscriber fan-out to support at this
//! layer.

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was not present; a brand new slot was assigned.
    Fresh,
    /// The key was erased earlier in the *same* tick and is being
    /// revived into its old, not-yet-reclaimed slot.
    RevivedSameTick,
    /// The key is already alive; no structural change happened.
    AlreadyPresent,
}

#[derive(Debug, Clone)]
pub struct KeySet<K: Eq + std::hash::Hash + Clone> {
    keys: Vec<Option<K>>,
    alive: Vec<bool>,
    free_list: Vec<usize>,
    /// Slots erased during the tick currently in progress; not yet
    /// eligible for the free list. Payload is still resident in `keys`.
    pending_free: Vec<usize>,
    index: FxHashMap<K, usize>,
}

impl<K: Eq + std::hash::Hash + Clone> Default for KeySet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + std::hash::Hash + Clone> KeySet<K> {
    pub fn new() -> Self {
        KeySet {
            keys: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            pending_free: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    fn grow_to(&mut self, slot: usize) {
        if slot >= self.keys.len() {
            let old = self.keys.len();
            let new_len = slot + 1;
            self.keys.resize(new_len, None);
            self.alive.resize(new_len, false);
            // `on_capacity` notification point: callers that need to grow a
            // parallel children vector in lockstep should call
            // `capacity()` before/after this and resize their own vector.
            let _ = old;
        }
    }

    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get_slot(&self, key: &K) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn key_at(&self, slot: usize) -> Option<&K> {
        self.keys.get(slot).and_then(|k| k.as_ref())
    }

    pub fn is_alive(&self, slot: usize) -> bool {
        self.alive.get(slot).copied().unwrap_or(false)
    }

    /// Insert `key`, assigning it a slot. Returns the slot and how it got there.
    pub fn insert(&mut self, key: K) -> (usize, InsertOutcome) {
        if let Some(&slot) = self.index.get(&key) {
            return (slot, InsertOutcome::AlreadyPresent);
        }
        if let Some(pos) = self
            .pending_free
            .iter()
            .position(|&s| self.keys[s].as_ref() == Some(&key))
        {
            let slot = self.pending_free.remove(pos);
            self.alive[slot] = true;
            self.index.insert(key, slot);
            return (slot, InsertOutcome::RevivedSameTick);
        }
        let slot = match self.free_list.pop() {
            Some(s) => s,
            None => {
                let s = self.keys.len();
                self.grow_to(s);
                s
            }
        };
        self.keys[slot] = Some(key.clone());
        self.alive[slot] = true;
        self.index.insert(key, slot);
        (slot, InsertOutcome::Fresh)
    }

    /// Erase `key`. Returns the freed slot and the key's hash (for
    /// `removed_key_hashes`) if it was alive.
    pub fn erase(&mut self, key: &K) -> Option<(usize, u64)> {
        let slot = self.index.remove(key)?;
        self.alive[slot] = false;
        self.pending_free.push(slot);
        Some((slot, hash_of(key)))
    }

    pub fn iter_live(&self) -> impl Iterator<Item = usize> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| if a { Some(i) } else { None })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Slots erased earlier in the current tick, still holding their
    /// payload (for `removed()` iteration).
    pub fn pending_erased(&self) -> &[usize] {
        &self.pending_free
    }

    pub fn clear(&mut self) {
        for slot in self.iter_live().collect::<Vec<_>>() {
            self.alive[slot] = false;
            self.keys[slot] = None;
        }
        self.index.clear();
        self.free_list.clear();
        self.free_list.extend(0..self.keys.len());
        self.pending_free.clear();
    }

    /// Move slots erased this tick onto the free list, clearing their
    /// payload. Call once per tick after delta consumers have had a
    /// chance to read `removed()`.
    pub fn end_tick(&mut self) {
        for slot in self.pending_free.drain(..) {
            self.keys[slot] = None;
            self.free_list.push(slot);
        }
    }
}

pub(crate) fn hash_of<K: std::hash::Hash>(key: &K) -> u64 {
    use std::hash::Hasher;
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_stable_slots() {
        let mut ks: KeySet<&str> = KeySet::new();
        let (a, outcome) = ks.insert("a");
        assert_eq!(outcome, InsertOutcome::Fresh);
        let (b, _) = ks.insert("b");
        assert_ne!(a, b);
        assert_eq!(ks.get_slot(&"a"), Some(a));
        let (a_again, outcome) = ks.insert("a");
        assert_eq!(a_again, a);
        assert_eq!(outcome, InsertOutcome::AlreadyPresent);
    }

    #[test]
    fn erase_then_reinsert_same_tick_reuses_slot() {
        let mut ks: KeySet<&str> = KeySet::new();
        let (slot, _) = ks.insert("a");
        ks.erase(&"a").unwrap();
        assert!(!ks.is_alive(slot));
        assert_eq!(ks.pending_erased(), &[slot]);

        let (revived, outcome) = ks.insert("a");
        assert_eq!(revived, slot);
        assert_eq!(outcome, InsertOutcome::RevivedSameTick);
        assert!(ks.is_alive(slot));
    }

    #[test]
    fn slot_only_goes_to_free_list_after_end_tick() {
        let mut ks: KeySet<&str> = KeySet::new();
        let (slot, _) = ks.insert("a");
        ks.erase(&"a").unwrap();
        let (fresh_slot, outcome) = ks.insert("b");
        // "a"'s slot is pending, not yet free, so "b" gets a brand new one.
        assert_ne!(fresh_slot, slot);
        assert_eq!(outcome, InsertOutcome::Fresh);

        ks.end_tick();
        let (reused, outcome) = ks.insert("c");
        assert_eq!(reused, slot);
        assert_eq!(outcome, InsertOutcome::Fresh);
    }

    #[test]
    fn clear_frees_every_slot() {
        let mut ks: KeySet<&str> = KeySet::new();
        ks.insert("a");
        ks.insert("b");
        ks.clear();
        assert!(ks.is_empty());
        assert_eq!(ks.get_slot(&"a"), None);
    }
}
