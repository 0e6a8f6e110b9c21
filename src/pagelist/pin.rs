//! Tracked coordinates and the viewport tag.
//!
//! A [`Pin`] is a weak reference into the page list: `{page, y, x}`, with no
//! back-pointer from the page to its pins — [`PinRegistry`] is the single
//! source of truth (spec.md §9 "no cyclic or aliased ownership"). Every
//! mutator that moves or destroys rows walks the registry via
//! [`PinRegistry::for_each_mut`] / [`PinRegistry::for_each_in_page_mut`]
//! rather than each hiding its own ad hoc pin-fixup loop (spec.md §9 "the
//! pin registry as a cross-cutting concern").
//!
//! Generalizes the teacher's `buffer/page_cache.rs` frame/pin-count
//! bookkeeping from a live *count* per frame to a tracked *coordinate* per
//! pin, since this engine's pins must survive row redistribution, not just
//! page eviction.

use crate::pagelist::PageId;

/// A tracked coordinate: page id plus row/col within that page's live size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    pub page: PageId,
    pub y: u32,
    pub x: u32,
}

impl Pin {
    pub fn new(page: PageId, y: u32, x: u32) -> Self {
        Self { page, y, x }
    }
}

/// Handle returned by [`PinRegistry::track`]; opaque to callers.
pub type PinHandle = usize;

/// Registry of every live [`Pin`], including the always-present
/// `viewport_pin` (handle [`PinRegistry::VIEWPORT`]).
///
/// Backed by a slot array with a free list rather than a `HashMap`, the
/// same pattern as a slab allocator: handles are stable across
/// track/untrack cycles and the common case (iterate every live pin) is a
/// single linear scan.
pub struct PinRegistry {
    slots: Vec<Option<Pin>>,
    free: Vec<usize>,
}

impl PinRegistry {
    /// The viewport pin's handle never changes and is never freed.
    pub const VIEWPORT: PinHandle = 0;

    pub fn new(viewport_pin: Pin) -> Self {
        Self { slots: vec![Some(viewport_pin)], free: Vec::new() }
    }

    pub fn track(&mut self, pin: Pin) -> PinHandle {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(pin);
            idx
        } else {
            self.slots.push(Some(pin));
            self.slots.len() - 1
        }
    }

    pub fn untrack(&mut self, handle: PinHandle) {
        debug_assert!(handle != Self::VIEWPORT, "viewport pin cannot be untracked");
        if handle == Self::VIEWPORT {
            return;
        }
        if self.slots[handle].take().is_some() {
            self.free.push(handle);
        }
    }

    pub fn get(&self, handle: PinHandle) -> Pin {
        self.slots[handle].expect("stale pin handle")
    }

    pub fn set(&mut self, handle: PinHandle, pin: Pin) {
        self.slots[handle] = Some(pin);
    }

    /// Walk every live pin, mutably. Used by mutators that touch the whole
    /// list (e.g. reflow, which rebuilds every page).
    pub fn for_each_mut<F: FnMut(&mut Pin)>(&mut self, mut f: F) {
        for slot in self.slots.iter_mut().flatten() {
            f(slot);
        }
    }

    /// Walk only the pins currently on `page`. Used by mutators scoped to
    /// one page (erase, prune, single-page clear).
    pub fn for_each_in_page_mut<F: FnMut(&mut Pin)>(&mut self, page: PageId, mut f: F) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.page == page {
                f(slot);
            }
        }
    }

    /// A point-in-time copy of every live `(handle, pin)` pair.
    ///
    /// Mutators that need to resolve a pin's new position against other
    /// page-list state (e.g. walking the page chain to convert an absolute
    /// row back into a page/row) cannot do that resolution from inside a
    /// closure passed to [`PinRegistry::for_each_mut`], since that closure
    /// only ever gets a `&mut PinRegistry` borrow — it has no way to also
    /// see the rest of the page list. Taking a snapshot first, computing
    /// new positions against an ordinary `&self` borrow, then writing them
    /// back one at a time with [`PinRegistry::set`] sidesteps that borrow
    /// entirely.
    pub fn snapshot(&self) -> Vec<(PinHandle, Pin)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|p| (i, p)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PinHandle, Pin)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.map(|p| (i, p)))
    }
}

/// The page list's logical scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewport {
    /// The bottom `rows` rows.
    Active,
    /// The first `rows` rows of the whole list.
    Top,
    /// `rows` rows starting at `viewport_pin`.
    Pinned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_reuses_freed_slots() {
        let mut reg = PinRegistry::new(Pin::new(0, 0, 0));
        let a = reg.track(Pin::new(1, 2, 3));
        reg.untrack(a);
        let b = reg.track(Pin::new(4, 5, 6));
        assert_eq!(a, b);
        assert_eq!(reg.get(b), Pin::new(4, 5, 6));
    }

    #[test]
    fn for_each_in_page_only_touches_matching_pins() {
        let mut reg = PinRegistry::new(Pin::new(0, 0, 0));
        let a = reg.track(Pin::new(1, 0, 0));
        let b = reg.track(Pin::new(2, 0, 0));
        reg.for_each_in_page_mut(1, |p| p.y = 9);
        assert_eq!(reg.get(a).y, 9);
        assert_eq!(reg.get(b).y, 0);
    }
}
