//! Capacity -> byte-offset layout (spec.md §4.1).
//!
//! A page's buffer holds, back to back: the rows array, the cells array,
//! the style set (dense slots + content-hash index), the grapheme arena's
//! occupancy bitmap, the grapheme arena itself, and the grapheme map
//! (cell-offset -> grapheme-slice index). [`Layout::compute`] lays all of
//! that out for a given [`Capacity`]; [`Capacity::adjust`] answers "how
//! many rows fit at a new column count in the same total byte size".

use crate::alloc::bitmap::{BitmapAllocator, CHUNK_BYTES};
use crate::alloc::offset_map::Slot;
use crate::cell::Cell;
use crate::row::Row;
use crate::style::StyleSlot;

use super::mmap::round_up_to_os_page;

/// The grapheme-slice descriptor stored as the value half of the grapheme
/// map: which arena chunk a cell's extra codepoints start at, and how many
/// there are.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphemeSlice {
    pub chunk_index: u32,
    pub codepoint_count: u16,
}

/// The maximum shape a page may hold. Capacity never shrinks in place —
/// growing past it means allocating a new, larger page
/// ([`crate::page::Page::adjust_capacity`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub rows: u32,
    pub cols: u32,
    pub styles: u32,
    /// Byte budget for the grapheme arena; rounded down to a whole number
    /// of chunks internally.
    pub grapheme_bytes: u32,
    /// Capacity of the grapheme map (cell-offset -> slice), independent of
    /// `rows * cols` — spec.md §4.1 treats it as one of the fixed-size tail
    /// regions when computing `adjust`.
    pub grapheme_map_capacity: u32,
}

impl Capacity {
    /// The "standard" capacity spec.md §3 names: 215x215 cells, 128 style
    /// slots, 8 KiB of graphemes, sized so the whole page lands on a
    /// convenient page-size multiple.
    pub const STANDARD: Capacity = Capacity {
        rows: 215,
        cols: 215,
        styles: 128,
        grapheme_bytes: 8 * 1024,
        grapheme_map_capacity: 1024,
    };

    pub fn grapheme_chunk_count(&self) -> u32 {
        self.grapheme_bytes / CHUNK_BYTES as u32
    }

    /// Bytes occupied by everything except the rows/cells arrays: the
    /// style set, the grapheme bitmap + arena, and the grapheme map.
    fn fixed_tail_bytes(&self) -> usize {
        let style_slots = self.styles as usize * std::mem::size_of::<StyleSlot>();
        let style_index = self.styles as usize * std::mem::size_of::<Slot<u64, u16>>();
        let bitmap = BitmapAllocator::words_for(self.grapheme_chunk_count()) * 8;
        let arena = self.grapheme_chunk_count() as usize * CHUNK_BYTES;
        let gmap = self.grapheme_map_capacity as usize * std::mem::size_of::<Slot<u32, GraphemeSlice>>();
        style_slots + style_index + bitmap + arena + gmap
    }

    fn per_row_bytes(cols: u32) -> usize {
        std::mem::size_of::<Row>() + cols as usize * std::mem::size_of::<Cell>()
    }

    /// Recompute how many rows fit at `new_cols` within this capacity's
    /// current total (page-size-rounded) byte budget, holding everything
    /// else (styles, grapheme budget, grapheme map capacity) fixed.
    ///
    /// Returns `Err(())` (-> `PageError::LayoutInfeasible`) if not even one
    /// row fits.
    pub fn adjust(&self, new_cols: u32) -> Result<Capacity, ()> {
        let total = Layout::compute(self).total_bytes;
        let tail = self.fixed_tail_bytes();
        if total <= tail {
            return Err(());
        }
        let available = total - tail;
        let per_row = Self::per_row_bytes(new_cols);
        let new_rows = available / per_row;
        if new_rows == 0 {
            return Err(());
        }
        Ok(Capacity { rows: new_rows as u32, cols: new_cols, ..*self })
    }
}

/// Byte offsets of each sub-region within a page buffer sized for some
/// [`Capacity`]. All offsets are from the buffer's base (offset 0), so
/// they double as the values stored in [`crate::offset::Offset`] fields.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub rows_offset: u32,
    pub cells_offset: u32,
    pub style_slots_offset: u32,
    pub style_index_offset: u32,
    pub grapheme_bitmap_offset: u32,
    pub grapheme_arena_offset: u32,
    pub grapheme_map_offset: u32,
    /// Total size, rounded up to a whole multiple of the OS page size
    /// (spec.md §3: "sized so its total byte size is a whole multiple of
    /// the OS page size").
    pub total_bytes: usize,
}

impl Layout {
    pub fn compute(capacity: &Capacity) -> Layout {
        let rows_offset = 0u32;
        let rows_bytes = capacity.rows as usize * std::mem::size_of::<Row>();

        let cells_offset = rows_offset + rows_bytes as u32;
        let cells_bytes = capacity.rows as usize * capacity.cols as usize * std::mem::size_of::<Cell>();

        let style_slots_offset = cells_offset + cells_bytes as u32;
        let style_slots_bytes = capacity.styles as usize * std::mem::size_of::<StyleSlot>();

        let style_index_offset = style_slots_offset + style_slots_bytes as u32;
        let style_index_bytes = capacity.styles as usize * std::mem::size_of::<Slot<u64, u16>>();

        let grapheme_bitmap_offset = style_index_offset + style_index_bytes as u32;
        let bitmap_bytes = BitmapAllocator::words_for(capacity.grapheme_chunk_count()) * 8;

        let grapheme_arena_offset = grapheme_bitmap_offset + bitmap_bytes as u32;
        let arena_bytes = capacity.grapheme_chunk_count() as usize * CHUNK_BYTES;

        let grapheme_map_offset = grapheme_arena_offset + arena_bytes as u32;
        let gmap_bytes =
            capacity.grapheme_map_capacity as usize * std::mem::size_of::<Slot<u32, GraphemeSlice>>();

        let raw_total = grapheme_map_offset as usize + gmap_bytes;
        let total_bytes = round_up_to_os_page(raw_total.max(1));

        Layout {
            rows_offset,
            cells_offset,
            style_slots_offset,
            style_index_offset,
            grapheme_bitmap_offset,
            grapheme_arena_offset,
            grapheme_map_offset,
            total_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_size_is_multiple_of_cell_alignment() {
        // spec.md §4.1 guarantee: no padding between rows and cells arrays.
        assert_eq!(std::mem::size_of::<Row>() % std::mem::align_of::<Cell>(), 0);
    }

    #[test]
    fn standard_capacity_layout_is_page_aligned() {
        let layout = Layout::compute(&Capacity::STANDARD);
        assert_eq!(layout.total_bytes % super::round_up_to_os_page(1), 0);
        assert!(layout.grapheme_map_offset as usize <= layout.total_bytes);
    }

    #[test]
    fn adjust_to_fewer_cols_yields_more_rows() {
        let cap = Capacity::STANDARD;
        let adjusted = cap.adjust(cap.cols / 2).unwrap();
        assert!(adjusted.rows > cap.rows);
        assert_eq!(adjusted.cols, cap.cols / 2);
    }

    #[test]
    fn adjust_to_absurd_cols_is_infeasible() {
        let cap = Capacity::STANDARD;
        let result = cap.adjust(1_000_000_000);
        assert!(result.is_err());
    }
}
