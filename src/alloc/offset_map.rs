//! Offset-keyed open-addressed hash map.
//!
//! Backs the grapheme map (cell byte-offset -> grapheme-slice descriptor)
//! and the style set's content-hash index (style hash -> style id). Both
//! keys and values here are small `Copy` records — byte offsets, hashes,
//! dense ids — so the whole table is just a borrowed slice of slots that
//! lives inside the page's own buffer. Generalizes the `Vec`-backed,
//! explicit-probing maps in the teacher's `common/bounded_map.rs` and
//! `common/concurrent_map.rs` from an LRU-evicting cache to a
//! fixed-capacity table with linear probing and tombstones, since a page's
//! map capacity is fixed at page-init time (spec.md §4.2, §4.10).

use std::hash::{Hash, Hasher};

#[derive(Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    Occupied,
    Tombstone,
}

/// One slot of the table. `Copy` so the whole table is a plain `[Slot<K,
/// V>]` that can be memcpy'd with the rest of the page.
#[derive(Clone, Copy)]
pub struct Slot<K: Copy, V: Copy> {
    state: u8, // SlotState as u8, kept narrow to not distort struct layout
    key: K,
    value: V,
}

impl<K: Copy + Default, V: Copy + Default> Default for Slot<K, V> {
    fn default() -> Self {
        Slot { state: SlotState::Empty as u8, key: K::default(), value: V::default() }
    }
}

impl<K: Copy, V: Copy> Slot<K, V> {
    /// Read-only accessors for callers that need to scan raw slot storage
    /// directly (e.g. recomputing an occupied count from a page buffer
    /// without reconstructing a full `OffsetHashMap` first).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state == SlotState::Empty as u8
    }

    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.state == SlotState::Occupied as u8
    }

    #[inline]
    pub fn key(&self) -> K {
        self.key
    }

    #[inline]
    pub fn value(&self) -> V {
        self.value
    }
}

/// Exposed so callers that need to scan raw slot storage without a live
/// `OffsetHashMap` borrow (e.g. a read-only lookup over a shared `&self`)
/// can reproduce the exact same probe sequence `insert`/`get` use.
pub(crate) fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut h);
    h.finish()
}

/// A fixed-capacity linear-probing hash table borrowing its slot storage.
///
/// Capacity never changes after construction; callers grow it the way the
/// rest of a page grows — by allocating a bigger page and reinserting
/// (`Page::adjust_capacity`, spec.md §4.2).
pub struct OffsetHashMap<'a, K: Copy + Eq + Hash, V: Copy> {
    slots: &'a mut [Slot<K, V>],
    len: usize,
}

impl<'a, K: Copy + Eq + Hash, V: Copy> OffsetHashMap<'a, K, V> {
    /// Wrap existing slot storage. `len` is the caller-tracked occupied
    /// count (kept outside this borrow so it can live in a page header
    /// field rather than be recomputed by scanning).
    pub fn new(slots: &'a mut [Slot<K, V>], len: usize) -> Self {
        Self { slots, len }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fraction of slots occupied (tombstones count against load factor
    /// the same as live entries, since they still cost probe distance).
    pub fn load_factor(&self) -> f64 {
        if self.slots.is_empty() {
            1.0
        } else {
            self.len as f64 / self.slots.len() as f64
        }
    }

    fn probe(&self, key: &K) -> usize {
        let cap = self.slots.len();
        let mut idx = (hash_of(key) as usize) % cap;
        let mut first_tombstone: Option<usize> = None;
        for _ in 0..cap {
            match state_of(&self.slots[idx]) {
                SlotState::Empty => {
                    return first_tombstone.unwrap_or(idx);
                }
                SlotState::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                SlotState::Occupied => {
                    if self.slots[idx].key == *key {
                        return idx;
                    }
                }
            }
            idx = (idx + 1) % cap;
        }
        // Table is full of occupied/tombstone slots with no match; return
        // the first tombstone if any, else the last probed slot (caller's
        // insert will report OutOfMemory via the capacity check below).
        first_tombstone.unwrap_or(idx)
    }

    /// Insert `key -> value`, returning the previous value if the key was
    /// already present. Returns `Err(())` if the table is full and `key`
    /// is not already present (callers map this to `PageError::OutOfMemory`).
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, ()> {
        if self.len >= self.slots.len() && !self.contains(&key) {
            return Err(());
        }
        let idx = self.probe(&key);
        let was_occupied = state_of(&self.slots[idx]) == SlotState::Occupied;
        let prev = if was_occupied { Some(self.slots[idx].value) } else { None };
        self.slots[idx] = Slot { state: SlotState::Occupied as u8, key, value };
        if !was_occupied {
            self.len += 1;
        }
        Ok(prev)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let idx = self.probe(key);
        if state_of(&self.slots[idx]) == SlotState::Occupied && self.slots[idx].key == *key {
            Some(self.slots[idx].value)
        } else {
            None
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.probe(key);
        if state_of(&self.slots[idx]) == SlotState::Occupied && self.slots[idx].key == *key {
            let prev = self.slots[idx].value;
            self.slots[idx].state = SlotState::Tombstone as u8;
            self.len -= 1;
            Some(prev)
        } else {
            None
        }
    }

    /// Remove every entry whose key matches `remap` is not applicable here
    /// by design — rekeying (used when moving a cell's grapheme slice
    /// in-place, spec.md §4.2 `move_cells`) must go through
    /// `remove` + `insert` at the call site so both old and new key hashes
    /// are handled correctly.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.state = SlotState::Empty as u8;
        }
        self.len = 0;
    }
}

fn state_of<K: Copy, V: Copy>(slot: &Slot<K, V>) -> SlotState {
    match slot.state {
        0 => SlotState::Empty,
        1 => SlotState::Occupied,
        _ => SlotState::Tombstone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_slots(n: usize) -> Vec<Slot<u32, u32>> {
        vec![Slot { state: 0, key: 0, value: 0 }; n]
    }

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut storage = new_slots(8);
        let mut map = OffsetHashMap::new(&mut storage, 0);
        assert_eq!(map.insert(10, 100).unwrap(), None);
        assert_eq!(map.get(&10), Some(100));
        assert_eq!(map.insert(10, 200).unwrap(), Some(100));
        assert_eq!(map.get(&10), Some(200));
        assert_eq!(map.remove(&10), Some(200));
        assert_eq!(map.get(&10), None);
    }

    #[test]
    fn rejects_insert_past_capacity() {
        let mut storage = new_slots(2);
        let mut map = OffsetHashMap::new(&mut storage, 0);
        map.insert(1, 1).unwrap();
        map.insert(2, 2).unwrap();
        assert!(map.insert(3, 3).is_err());
    }

    #[test]
    fn tombstone_is_reused_on_insert() {
        let mut storage = new_slots(4);
        let mut map = OffsetHashMap::new(&mut storage, 0);
        map.insert(1, 1).unwrap();
        map.insert(2, 2).unwrap();
        map.remove(&1);
        assert_eq!(map.len(), 1);
        map.insert(3, 3).unwrap();
        assert_eq!(map.get(&3), Some(3));
        assert_eq!(map.get(&2), Some(2));
    }
}
