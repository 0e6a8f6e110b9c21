//! Cell style: colors and attributes, ref-counted and interned.
//!
//! A [`Cell`](crate::cell::Cell) carries only a 16-bit [`StyleId`]; the
//! actual [`Style`] payload lives once per distinct style in a page's style
//! set and is looked up by id. [`StyleSet`] is the interning table: `upsert`
//! returns an existing id on a content match (bumping its ref count) or
//! allocates a new slot. This generalizes the teacher's slab/magazine
//! free-list recycling (`memory/allocator.rs` `SlabAllocator`) from
//! fixed-size anonymous objects to content-addressed, ref-counted style
//! records.

use crate::alloc::offset_map::{OffsetHashMap, Slot};
use std::hash::{Hash, Hasher};

/// A terminal color: either the default, a 256-color palette index, or a
/// direct RGB triple.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    tag: u8,
    r: u8,
    g: u8,
    b: u8,
}

impl Color {
    pub const DEFAULT: Color = Color { tag: 0, r: 0, g: 0, b: 0 };

    pub fn palette(idx: u8) -> Self {
        Color { tag: 1, r: idx, g: 0, b: 0 }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { tag: 2, r, g, b }
    }

    pub fn is_default(&self) -> bool {
        self.tag == 0
    }
}

const UNDERLINE_SHIFT: u16 = 0;
const UNDERLINE_MASK: u16 = 0b111 << UNDERLINE_SHIFT;
const BOLD_BIT: u16 = 1 << 3;
const ITALIC_BIT: u16 = 1 << 4;
const FAINT_BIT: u16 = 1 << 5;
const BLINK_BIT: u16 = 1 << 6;
const INVERSE_BIT: u16 = 1 << 7;
const INVISIBLE_BIT: u16 = 1 << 8;
const STRIKETHROUGH_BIT: u16 = 1 << 9;

/// Non-color text attributes, packed into one `u16`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StyleFlags(u16);

impl StyleFlags {
    pub const NONE: StyleFlags = StyleFlags(0);

    pub fn bold(self) -> bool {
        self.0 & BOLD_BIT != 0
    }
    pub fn with_bold(mut self, v: bool) -> Self {
        self.set(BOLD_BIT, v);
        self
    }
    pub fn italic(self) -> bool {
        self.0 & ITALIC_BIT != 0
    }
    pub fn with_italic(mut self, v: bool) -> Self {
        self.set(ITALIC_BIT, v);
        self
    }
    pub fn faint(self) -> bool {
        self.0 & FAINT_BIT != 0
    }
    pub fn blink(self) -> bool {
        self.0 & BLINK_BIT != 0
    }
    pub fn inverse(self) -> bool {
        self.0 & INVERSE_BIT != 0
    }
    pub fn invisible(self) -> bool {
        self.0 & INVISIBLE_BIT != 0
    }
    pub fn strikethrough(self) -> bool {
        self.0 & STRIKETHROUGH_BIT != 0
    }
    pub fn underline(self) -> u8 {
        ((self.0 & UNDERLINE_MASK) >> UNDERLINE_SHIFT) as u8
    }
    pub fn with_underline(mut self, kind: u8) -> Self {
        self.0 = (self.0 & !UNDERLINE_MASK) | ((kind as u16) << UNDERLINE_SHIFT);
        self
    }

    fn set(&mut self, bit: u16, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// The full visual style a cell can reference: foreground/background/
/// underline color plus text attributes. `Copy` and hashable so it can be
/// content-addressed by [`StyleSet::upsert`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub underline_color: Color,
    pub flags: StyleFlags,
}

impl Style {
    pub fn is_default(&self) -> bool {
        *self == Style::default()
    }

    fn content_hash(&self) -> u64 {
        let mut h = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut h);
        h.finish()
    }
}

/// One slot of a [`StyleSet`]'s dense array. `occupied == 0` marks a free
/// slot; `ref_count` is the number of live cells (across the whole page)
/// currently pointing at this style id.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct StyleSlot {
    occupied: u8,
    _pad: [u8; 3],
    ref_count: u32,
    style: Style,
}

impl Default for StyleSlot {
    fn default() -> Self {
        StyleSlot { occupied: 0, _pad: [0; 3], ref_count: 0, style: Style::default() }
    }
}

impl StyleSlot {
    /// Used by `Page::style_occupied_count` to recompute the style
    /// index's entry count directly from buffer bytes.
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.occupied != 0
    }
}

/// Id 0 is reserved for "no style" — a cell with `style_id == DEFAULT_STYLE_ID`
/// never touches the style set at all (spec.md §3).
pub const DEFAULT_STYLE_ID: u16 = 0;

/// A page's ref-counted style interning table.
///
/// Borrows its two backing arrays (the dense slot array and the
/// content-hash index) from the page buffer for the duration of a call,
/// the same pattern as [`crate::alloc::bitmap::BitmapAllocator`] and
/// [`OffsetHashMap`] — the table's real storage is page bytes, this is
/// just a typed view over it.
pub struct StyleSet<'a> {
    slots: &'a mut [StyleSlot],
    index: OffsetHashMap<'a, u64, u16>,
}

impl<'a> StyleSet<'a> {
    pub fn new(slots: &'a mut [StyleSlot], index_slots: &'a mut [Slot<u64, u16>], index_len: usize) -> Self {
        let index = OffsetHashMap::new(index_slots, index_len);
        Self { slots, index }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Slot 0 is never handed out: it would collide with
    /// [`DEFAULT_STYLE_ID`], whose accessors all special-case id 0 without
    /// ever touching `self.slots[0]`, so a style actually stored there
    /// would be unreachable and uncounted. Scan starts at 1.
    fn first_free_slot(&self) -> Option<usize> {
        self.slots.iter().enumerate().skip(1).find(|(_, s)| s.occupied == 0).map(|(i, _)| i)
    }

    /// Look up `style`, incrementing its ref count, or allocate a new slot
    /// with ref count 1. Returns `Err(())` (-> `PageError::OutOfMemory`) if
    /// the style is new and no slot or index entry is available.
    pub fn upsert(&mut self, style: Style) -> Result<u16, ()> {
        if style.is_default() {
            return Ok(DEFAULT_STYLE_ID);
        }
        let hash = style.content_hash();
        if let Some(id) = self.index.get(&hash) {
            if self.styles_match(id, &style) {
                self.slots[id as usize].ref_count += 1;
                return Ok(id);
            }
            // Hash collision between distinct styles: fall through to a
            // fresh slot; the index keeps only the first style per hash
            // bucket collision chain is not modeled, so distinct collided
            // styles simply don't dedupe against each other (still correct,
            // just less dense).
        }
        let slot_idx = self.first_free_slot().ok_or(())?;
        let id = slot_idx as u16;
        self.slots[slot_idx] = StyleSlot { occupied: 1, _pad: [0; 3], ref_count: 1, style };
        if self.index.get(&hash).is_none() {
            self.index.insert(hash, id).map_err(|_| ())?;
        }
        Ok(id)
    }

    fn styles_match(&self, id: u16, style: &Style) -> bool {
        let slot = &self.slots[id as usize];
        slot.occupied != 0 && slot.style == *style
    }

    /// Decrement the ref count for `id`, freeing the slot (and its index
    /// entry) at zero. No-op for [`DEFAULT_STYLE_ID`].
    pub fn release(&mut self, id: u16) {
        if id == DEFAULT_STYLE_ID {
            return;
        }
        let slot = &mut self.slots[id as usize];
        debug_assert!(slot.occupied != 0, "releasing a style id with no live slot");
        debug_assert!(slot.ref_count > 0, "style ref count underflow");
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count == 0 {
            let hash = slot.style.content_hash();
            slot.occupied = 0;
            slot.style = Style::default();
            self.index.remove(&hash);
        }
    }

    pub fn get(&self, id: u16) -> Option<Style> {
        if id == DEFAULT_STYLE_ID {
            return Some(Style::default());
        }
        let slot = self.slots.get(id as usize)?;
        (slot.occupied != 0).then_some(slot.style)
    }

    pub fn ref_count(&self, id: u16) -> u32 {
        if id == DEFAULT_STYLE_ID {
            return 0;
        }
        self.slots.get(id as usize).map(|s| s.ref_count).unwrap_or(0)
    }

    pub fn is_live(&self, id: u16) -> bool {
        id == DEFAULT_STYLE_ID || self.slots.get(id as usize).map(|s| s.occupied != 0).unwrap_or(false)
    }

    pub fn words_for_index(capacity: usize) -> usize {
        capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(cap: usize) -> (Vec<StyleSlot>, Vec<Slot<u64, u16>>) {
        (vec![StyleSlot::default(); cap], vec![Slot::default(); cap])
    }

    #[test]
    fn upsert_never_hands_out_the_default_style_id() {
        let (mut slots, mut idx) = fresh(4);
        let mut set = StyleSet::new(&mut slots, &mut idx, 0);
        let bold = Style { flags: StyleFlags::NONE.with_bold(true), ..Default::default() };
        let id = set.upsert(bold).unwrap();
        assert_ne!(id, DEFAULT_STYLE_ID);
        assert_eq!(set.ref_count(id), 1);
        assert!(set.is_live(id));
    }

    #[test]
    fn upsert_dedupes_identical_styles() {
        let (mut slots, mut idx) = fresh(4);
        let mut set = StyleSet::new(&mut slots, &mut idx, 0);
        let bold = Style { flags: StyleFlags::NONE.with_bold(true), ..Default::default() };
        let id1 = set.upsert(bold).unwrap();
        let id2 = set.upsert(bold).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(set.ref_count(id1), 2);
    }

    #[test]
    fn default_style_never_touches_slots() {
        let (mut slots, mut idx) = fresh(4);
        let mut set = StyleSet::new(&mut slots, &mut idx, 0);
        assert_eq!(set.upsert(Style::default()).unwrap(), DEFAULT_STYLE_ID);
        assert_eq!(set.index_len(), 0);
    }

    #[test]
    fn release_frees_slot_at_zero_refcount() {
        let (mut slots, mut idx) = fresh(4);
        let mut set = StyleSet::new(&mut slots, &mut idx, 0);
        let red = Style { fg: Color::rgb(255, 0, 0), ..Default::default() };
        let id = set.upsert(red).unwrap();
        set.release(id);
        assert!(!set.is_live(id));
        // slot is reusable now
        let blue = Style { fg: Color::rgb(0, 0, 255), ..Default::default() };
        let id2 = set.upsert(blue).unwrap();
        assert_eq!(id2, id);
    }

    #[test]
    fn out_of_memory_when_slots_exhausted() {
        // Slot 0 is reserved for DEFAULT_STYLE_ID, so a 2-slot table has
        // exactly one allocatable slot.
        let (mut slots, mut idx) = fresh(2);
        let mut set = StyleSet::new(&mut slots, &mut idx, 0);
        let a = Style { fg: Color::rgb(1, 1, 1), ..Default::default() };
        let b = Style { fg: Color::rgb(2, 2, 2), ..Default::default() };
        set.upsert(a).unwrap();
        assert!(set.upsert(b).is_err());
    }
}
