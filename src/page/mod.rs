//! A single contiguous, relocatable page of terminal grid storage.
//!
//! Generalizes the teacher's disk-backed `storage/page.rs` `Page` (an
//! opaque byte blob keyed by `PageId`, read/written by a buffer pool) into
//! an in-memory, self-describing page: rows, cells, a style set, and a
//! grapheme arena all live in one OS mapping ([`mmap::PageBuffer`]), and
//! every cross-region reference is a byte [`crate::offset::Offset`] so the
//! whole thing survives relocation with one `memcpy` (spec.md §9).

pub mod layout;
pub mod mmap;

use crate::alloc::bitmap::{BitmapAllocator, CHUNK_BYTES, CHUNK_CODEPOINTS};
use crate::alloc::offset_map::{hash_of, OffsetHashMap, Slot};
use crate::cell::{Cell, ContentTag, Wide};
use crate::error::{IntegrityViolation, PageError, PageResult};
use crate::offset::Offset;
use crate::row::Row;
use crate::style::{Style, StyleSet, StyleSlot, DEFAULT_STYLE_ID};

use layout::{Capacity, GraphemeSlice, Layout};
use mmap::PageBuffer;

/// Live shape of a page: at most `capacity.rows` rows, each at most
/// `capacity.cols` columns, but the page currently only contains `rows` by
/// `cols` actual cells (spec.md §3: "size ... currently live <= capacity").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub rows: u32,
    pub cols: u32,
}

/// One page of the screen: a single mmap'd buffer plus the capacity/size
/// bookkeeping needed to interpret it.
pub struct Page {
    buffer: PageBuffer,
    capacity: Capacity,
    layout: Layout,
    size: Size,
    /// Bitmap allocator scan hint; a pure performance hint, not part of
    /// page correctness, so it is not preserved by `clone` (cloned pages
    /// just start their scan from 0 again).
    grapheme_hint: u32,
}

impl Page {
    /// Allocate and zero-initialize a new page at `capacity`, with size
    /// `rows x cols` both zero (spec.md §4.2 `init`).
    pub fn init(capacity: Capacity) -> PageResult<Self> {
        let layout = Layout::compute(&capacity);
        let buffer = PageBuffer::new(layout.total_bytes).ok_or(PageError::OutOfMemory)?;
        let mut page = Page { buffer, capacity, layout, size: Size { rows: 0, cols: 0 }, grapheme_hint: 0 };
        page.init_row_offsets();
        Ok(page)
    }

    fn init_row_offsets(&mut self) {
        let cols = self.capacity.cols;
        let cells_base = self.layout.cells_offset;
        let cell_size = std::mem::size_of::<Cell>() as u32;
        let rows = self.rows_mut();
        for (y, row) in rows.iter_mut().enumerate() {
            row.set_cells_offset(cells_base + y as u32 * cols * cell_size);
        }
    }

    /// Zero the buffer and reset size/row offsets in place, keeping the
    /// existing allocation and capacity. Used when a page is recycled
    /// rather than freed — prune-on-grow and single-page erase (spec.md
    /// §4.3, §4.4) reuse a page's mapping instead of calling `init` again.
    pub fn reinit_in_place(&mut self) {
        self.buffer.zero();
        self.size = Size { rows: 0, cols: 0 };
        self.grapheme_hint = 0;
        self.init_row_offsets();
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Total bytes of this page's backing mapping (spec.md §3: a whole
    /// multiple of the OS page size). Used by the page list to track its
    /// byte budget against `max_size` without recomputing `Layout`.
    pub fn total_bytes(&self) -> usize {
        self.layout.total_bytes
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_size(&mut self, size: Size) {
        debug_assert!(size.rows <= self.capacity.rows);
        debug_assert!(size.cols <= self.capacity.cols);
        self.size = size;
    }

    // ---- typed views over the buffer -------------------------------------

    fn base_ptr(&self) -> *const u8 {
        self.buffer.as_ptr()
    }
    fn base_ptr_mut(&mut self) -> *mut u8 {
        self.buffer.as_mut_ptr()
    }

    fn rows(&self) -> &[Row] {
        unsafe {
            std::slice::from_raw_parts(
                self.base_ptr().add(self.layout.rows_offset as usize) as *const Row,
                self.capacity.rows as usize,
            )
        }
    }
    fn rows_mut(&mut self) -> &mut [Row] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.base_ptr_mut().add(self.layout.rows_offset as usize) as *mut Row,
                self.capacity.rows as usize,
            )
        }
    }
    fn style_slots_mut(&mut self) -> &mut [StyleSlot] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.base_ptr_mut().add(self.layout.style_slots_offset as usize) as *mut StyleSlot,
                self.capacity.styles as usize,
            )
        }
    }
    fn grapheme_bitmap_words_mut(&mut self) -> &mut [u64] {
        let words = BitmapAllocator::words_for(self.capacity.grapheme_chunk_count());
        unsafe {
            std::slice::from_raw_parts_mut(
                self.base_ptr_mut().add(self.layout.grapheme_bitmap_offset as usize) as *mut u64,
                words,
            )
        }
    }
    fn grapheme_arena_mut(&mut self) -> &mut [u32] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.base_ptr_mut().add(self.layout.grapheme_arena_offset as usize) as *mut u32,
                self.capacity.grapheme_chunk_count() as usize * CHUNK_CODEPOINTS,
            )
        }
    }
    fn grapheme_arena(&self) -> &[u32] {
        unsafe {
            std::slice::from_raw_parts(
                self.base_ptr().add(self.layout.grapheme_arena_offset as usize) as *const u32,
                self.capacity.grapheme_chunk_count() as usize * CHUNK_CODEPOINTS,
            )
        }
    }
    fn grapheme_map_slots_mut(&mut self) -> &mut [Slot<u32, GraphemeSlice>] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.base_ptr_mut().add(self.layout.grapheme_map_offset as usize)
                    as *mut Slot<u32, GraphemeSlice>,
                self.capacity.grapheme_map_capacity as usize,
            )
        }
    }

    fn style_occupied_count(&mut self) -> usize {
        self.style_slots_mut().iter().filter(|s| s.is_occupied()).count()
    }
    fn grapheme_map_occupied_count(&mut self) -> usize {
        self.grapheme_map_slots_mut().iter().filter(|s| s.is_occupied()).count()
    }

    fn style_set(&mut self) -> StyleSet<'_> {
        let index_len = self.style_occupied_count();
        // Two disjoint mutable borrows of different buffer regions via raw
        // pointers; safe because `style_slots_offset` and
        // `style_index_offset` never overlap (see `Layout::compute`).
        let slots_ptr = unsafe {
            self.base_ptr_mut().add(self.layout.style_slots_offset as usize) as *mut StyleSlot
        };
        let index_ptr = unsafe {
            self.base_ptr_mut().add(self.layout.style_index_offset as usize) as *mut Slot<u64, u16>
        };
        let slots = unsafe { std::slice::from_raw_parts_mut(slots_ptr, self.capacity.styles as usize) };
        let index = unsafe { std::slice::from_raw_parts_mut(index_ptr, self.capacity.styles as usize) };
        StyleSet::new(slots, index, index_len)
    }

    fn grapheme_map(&mut self) -> OffsetHashMap<'_, u32, GraphemeSlice> {
        let len = self.grapheme_map_occupied_count();
        OffsetHashMap::new(self.grapheme_map_slots_mut(), len)
    }

    // ---- row/cell access --------------------------------------------------

    pub fn get_row(&self, y: u32) -> &Row {
        assert!(y < self.size.rows, "row {y} out of bounds ({})", self.size.rows);
        &self.rows()[y as usize]
    }

    pub fn get_row_mut(&mut self, y: u32) -> &mut Row {
        assert!(y < self.size.rows, "row out of bounds");
        &mut self.rows_mut()[y as usize]
    }

    /// Byte offset of cell `x` of row `y`, resolved through the row's own
    /// stored `cells_offset` rather than global `rows*cols` arithmetic —
    /// the per-row offset is what actually makes a page's cell array
    /// addressable after relocation (spec.md §9).
    fn cell_byte_offset(&self, y: u32, x: u32) -> Offset<Cell> {
        let row = &self.rows()[y as usize];
        Offset::new(row.cells_offset() + x * std::mem::size_of::<Cell>() as u32)
    }

    pub fn get_cell(&self, y: u32, x: u32) -> &Cell {
        assert!(y < self.size.rows && x < self.size.cols, "cell out of bounds");
        let offset = self.cell_byte_offset(y, x);
        // SAFETY: offset was computed from this same page's row header and
        // is within the cells region by construction.
        unsafe { &*offset.ptr(self.base_ptr()) }
    }

    /// Bounds-asserted row+cell accessor (spec.md §4.2).
    pub fn get_row_and_cell(&self, y: u32, x: u32) -> (&Row, &Cell) {
        assert!(y < self.size.rows && x < self.size.cols, "row/cell out of bounds");
        (self.get_row(y), self.get_cell(y, x))
    }

    pub fn get_row_and_cell_mut(&mut self, y: u32, x: u32) -> (&mut Row, &mut Cell) {
        assert!(y < self.size.rows && x < self.size.cols, "row/cell out of bounds");
        let offset = self.cell_byte_offset(y, x);
        let rows_ptr = unsafe { self.base_ptr_mut().add(self.layout.rows_offset as usize) as *mut Row };
        let base = self.base_ptr_mut();
        // SAFETY: rows array and cells array are disjoint regions of the
        // buffer (Layout::compute places cells strictly after rows), so a
        // mutable reference into each at once does not alias.
        unsafe { (&mut *rows_ptr.add(y as usize), &mut *offset.ptr_mut(base)) }
    }

    pub fn get_cell_mut(&mut self, y: u32, x: u32) -> &mut Cell {
        self.get_row_and_cell_mut(y, x).1
    }

    // ---- cloning -----------------------------------------------------------

    /// Duplicate this page's entire buffer (spec.md §4.2 `clone`). Since
    /// every internal reference is an offset, a `memcpy` is sufficient;
    /// the grapheme-allocation hint is not carried over (it is just a scan
    /// cursor, not page state).
    pub fn clone(&self) -> PageResult<Page> {
        let buffer = self.buffer.duplicate().ok_or(PageError::OutOfMemory)?;
        Ok(Page {
            buffer,
            capacity: self.capacity,
            layout: self.layout,
            size: self.size,
            grapheme_hint: 0,
        })
    }

    /// Copy rows `[y_start, y_end)` from `src` into `self` starting at row
    /// `dst_start`, intersected with `min(src.cols, self.cols)`. If `self`
    /// is wider than `src`, a pre-existing `spacer_head` in the trailing
    /// copied cell is demoted to `Narrow` (spec.md §4.2).
    pub fn clone_from(&mut self, src: &mut Page, y_start: u32, y_end: u32, dst_start: u32) -> PageResult<()> {
        let n = y_end.saturating_sub(y_start);
        let width = src.capacity.cols.min(self.capacity.cols);
        for i in 0..n {
            self.clone_partial_row_from(src, y_start + i, dst_start + i, 0, width)?;
        }
        Ok(())
    }

    /// Copy one row's `[col_start, col_end)` range from `src` into `self`
    /// at `dst_row`, cell by cell (re-upserting styles/graphemes into
    /// `self`'s own style set / arena rather than assuming shared ones).
    pub fn clone_partial_row_from(
        &mut self,
        src: &mut Page,
        src_row: u32,
        dst_row: u32,
        col_start: u32,
        col_end: u32,
    ) -> PageResult<()> {
        let width = col_end.saturating_sub(col_start);
        let src_meta = *src.get_row(src_row);
        {
            let dst_meta = self.get_row_mut(dst_row);
            dst_meta.set_wrap(src_meta.wrap());
            dst_meta.set_wrap_continuation(src_meta.wrap_continuation());
            dst_meta.set_semantic_prompt(src_meta.semantic_prompt());
        }
        for x in 0..width {
            let src_col = col_start + x;
            let cell = *src.get_cell(src_row, src_col);
            self.write_cell_copy(dst_row, x, &mut *src, src_row, src_col, &cell)?;
        }
        if width < self.size.cols && width > 0 {
            let last = self.get_cell_mut(dst_row, width - 1);
            if last.wide() == Wide::SpacerHead {
                last.set_wide(Wide::Narrow);
            }
        }
        Ok(())
    }

    /// Write a copy of `cell` (sourced from `src_page` at `(src_row,
    /// src_col)`, for grapheme/style lookups) into `self` at `(dst_row,
    /// dst_col)`, re-upserting its style and grapheme data into `self`'s
    /// own tables rather than assuming a shared style set or arena.
    fn write_cell_copy(
        &mut self,
        dst_row: u32,
        dst_col: u32,
        src_page: &mut Page,
        src_row: u32,
        src_col: u32,
        cell: &Cell,
    ) -> PageResult<()> {
        let extra = if cell.content_tag() == ContentTag::CodepointGrapheme {
            let key = src_page.cell_offset_key(src_row, src_col);
            src_page.lookup_grapheme(key).map(|s| s.to_vec())
        } else {
            None
        };
        let style = if cell.has_style() {
            src_page.style_set().get(cell.style_id())
        } else {
            None
        };
        *self.get_cell_mut(dst_row, dst_col) = *cell;
        self.get_cell_mut(dst_row, dst_col).set_style_id(DEFAULT_STYLE_ID);
        if let Some(style) = style {
            let id = self.style_set().upsert(style).map_err(|_| PageError::OutOfMemory)?;
            self.get_cell_mut(dst_row, dst_col).set_style_id(id);
            self.get_row_mut(dst_row).mark_styled();
        }
        if let Some(codepoints) = extra {
            // The cell copy above already carries the base codepoint and
            // the CodepointGrapheme tag; append_grapheme only needs to
            // place the remaining combining codepoints into self's arena.
            for cp in codepoints {
                self.append_grapheme(dst_row, dst_col, cp)?;
            }
        }
        Ok(())
    }

    // ---- mutation ------------------------------------------------------

    #[inline]
    fn cell_offset_key(&self, y: u32, x: u32) -> u32 {
        self.cell_byte_offset(y, x).bytes()
    }

    /// Move `len` cells within the page, preserving grapheme data by
    /// re-keying the grapheme map rather than reallocating, and zeroing the
    /// vacated source cells (spec.md §4.2). Never fails.
    ///
    /// Stages every source cell and grapheme slice before writing anything,
    /// so overlapping same-row ranges (in either direction) are handled
    /// without the usual memmove direction juggling.
    pub fn move_cells(&mut self, src_row: u32, src_left: u32, dst_row: u32, dst_left: u32, len: u32) {
        if len == 0 || (src_row == dst_row && src_left == dst_left) {
            return;
        }
        let mut staged: Vec<(Cell, Option<GraphemeSlice>)> = Vec::with_capacity(len as usize);
        for i in 0..len {
            let key = self.cell_offset_key(src_row, src_left + i);
            staged.push((*self.get_cell(src_row, src_left + i), self.grapheme_map().get(&key)));
        }
        for i in 0..len {
            let key = self.cell_offset_key(src_row, src_left + i);
            if staged[i as usize].1.is_some() {
                self.grapheme_map().remove(&key);
            }
            self.get_cell_mut(src_row, src_left + i).reset();
        }
        for i in 0..len {
            let (cell, slice) = staged[i as usize];
            *self.get_cell_mut(dst_row, dst_left + i) = cell;
            if let Some(slice) = slice {
                let new_key = self.cell_offset_key(dst_row, dst_left + i);
                let _ = self.grapheme_map().insert(new_key, slice);
            }
        }
    }

    /// Swap two cells in the same row, exchanging their grapheme map
    /// entries along with the cell contents (spec.md §4.2).
    pub fn swap_cells(&mut self, row: u32, a: u32, b: u32) {
        if a == b {
            return;
        }
        let key_a = self.cell_offset_key(row, a);
        let key_b = self.cell_offset_key(row, b);
        let slice_a = self.grapheme_map().get(&key_a);
        let slice_b = self.grapheme_map().get(&key_b);
        let cell_a = *self.get_cell(row, a);
        let cell_b = *self.get_cell(row, b);
        *self.get_cell_mut(row, a) = cell_b;
        *self.get_cell_mut(row, b) = cell_a;
        match (slice_a, slice_b) {
            (Some(sa), Some(sb)) => {
                let _ = self.grapheme_map().insert(key_a, sb);
                let _ = self.grapheme_map().insert(key_b, sa);
            }
            (Some(sa), None) => {
                self.grapheme_map().remove(&key_a);
                let _ = self.grapheme_map().insert(key_b, sa);
            }
            (None, Some(sb)) => {
                self.grapheme_map().remove(&key_b);
                let _ = self.grapheme_map().insert(key_a, sb);
            }
            (None, None) => {}
        }
    }

    /// Zero cells `[left, end)` of `row`, releasing their style refs and
    /// freeing their grapheme slices. If the whole row is cleared, also
    /// resets the row's conservative `grapheme`/`styled` flags (spec.md
    /// §4.2).
    pub fn clear_cells(&mut self, row: u32, left: u32, end: u32) {
        for x in left..end {
            let key = self.cell_offset_key(row, x);
            let cell = *self.get_cell(row, x);
            if cell.has_style() {
                self.style_set().release(cell.style_id());
            }
            if cell.content_tag() == ContentTag::CodepointGrapheme {
                self.free_grapheme_slice(key);
            }
            self.get_cell_mut(row, x).reset();
        }
        if left == 0 && end >= self.size.cols {
            self.get_row_mut(row).reset_flags();
        }
    }

    /// Copy row `src_row`'s content into `dst_row` within this same page,
    /// re-referencing the page's own style/grapheme storage rather than
    /// cloning into a different page's tables. Used by the page list's
    /// single-row cascade during erase (spec.md §4.4), where source and
    /// destination rows live in the same page.
    pub fn copy_row_within(&mut self, src_row: u32, dst_row: u32) -> PageResult<()> {
        if src_row == dst_row {
            return Ok(());
        }
        let cols = self.size.cols;
        let mut staged: Vec<(Cell, Option<Vec<u32>>, Option<Style>)> = Vec::with_capacity(cols as usize);
        for x in 0..cols {
            let cell = *self.get_cell(src_row, x);
            let extra = if cell.content_tag() == ContentTag::CodepointGrapheme {
                self.lookup_grapheme_at(src_row, x).map(|s| s.to_vec())
            } else {
                None
            };
            let style = if cell.has_style() { self.style_set().get(cell.style_id()) } else { None };
            staged.push((cell, extra, style));
        }
        let src_meta = *self.get_row(src_row);
        self.clear_cells(dst_row, 0, cols);
        {
            let dst_meta = self.get_row_mut(dst_row);
            dst_meta.set_wrap(src_meta.wrap());
            dst_meta.set_wrap_continuation(src_meta.wrap_continuation());
            dst_meta.set_semantic_prompt(src_meta.semantic_prompt());
        }
        for (x, (mut cell, extra, style)) in staged.into_iter().enumerate() {
            let x = x as u32;
            cell.set_style_id(DEFAULT_STYLE_ID);
            *self.get_cell_mut(dst_row, x) = cell;
            if let Some(style) = style {
                let id = self.style_set().upsert(style).map_err(|_| PageError::OutOfMemory)?;
                self.get_cell_mut(dst_row, x).set_style_id(id);
                self.get_row_mut(dst_row).mark_styled();
            }
            if let Some(codepoints) = extra {
                for cp in codepoints {
                    self.append_grapheme(dst_row, x, cp)?;
                }
            }
        }
        Ok(())
    }

    fn free_grapheme_slice(&mut self, key: u32) {
        let freed = self.grapheme_map().remove(&key);
        if let Some(slice) = freed {
            let chunks = slice.codepoint_count.div_ceil(CHUNK_CODEPOINTS as u16) as u32;
            let total_chunks = self.capacity.grapheme_chunk_count();
            let mut hint = self.grapheme_hint;
            {
                let bitmap = self.grapheme_bitmap_words_mut();
                let mut alloc = BitmapAllocator::new(bitmap, total_chunks);
                alloc.free(&mut hint, slice.chunk_index, chunks.max(1));
            }
            self.grapheme_hint = hint;
        }
    }

    /// Append one extra codepoint to a grapheme cluster cell (spec.md
    /// §4.2). Fast path: grow the existing chunk run in place if its
    /// length isn't already a multiple of the chunk size. Slow path:
    /// allocate a bigger run, copy, and free the old one.
    pub fn append_grapheme(&mut self, row: u32, col: u32, cp: u32) -> PageResult<()> {
        let key = self.cell_offset_key(row, col);
        let existing = self.grapheme_map().get(&key);
        let (chunk_index, old_count) = match existing {
            Some(slice) => (slice.chunk_index, slice.codepoint_count),
            None => (0, 0),
        };

        if existing.is_some() && (old_count as usize) % CHUNK_CODEPOINTS != 0 {
            // Fast path: spare slot in the current chunk.
            let arena = self.grapheme_arena_mut();
            let base = chunk_index as usize * CHUNK_CODEPOINTS;
            arena[base + old_count as usize] = cp;
            self.grapheme_map()
                .insert(key, GraphemeSlice { chunk_index, codepoint_count: old_count + 1 })
                .map_err(|_| PageError::OutOfMemory)?;
            return Ok(());
        }

        let new_count = old_count + 1;
        let new_chunks = (new_count as usize).div_ceil(CHUNK_CODEPOINTS) as u32;
        let old_chunks = (old_count as usize).div_ceil(CHUNK_CODEPOINTS) as u32;
        let total_chunks = self.capacity.grapheme_chunk_count();
        let mut hint = self.grapheme_hint;

        let new_chunk_start = {
            let bitmap = self.grapheme_bitmap_words_mut();
            let mut alloc = BitmapAllocator::new(bitmap, total_chunks);
            alloc.alloc(&mut hint, new_chunks)
        }
        .ok_or(PageError::OutOfMemory)?;

        {
            let arena = self.grapheme_arena_mut();
            let old_base = chunk_index as usize * CHUNK_CODEPOINTS;
            let new_base = new_chunk_start as usize * CHUNK_CODEPOINTS;
            for i in 0..old_count as usize {
                arena[new_base + i] = arena[old_base + i];
            }
            arena[new_base + old_count as usize] = cp;
        }

        if existing.is_some() {
            let bitmap = self.grapheme_bitmap_words_mut();
            let mut alloc = BitmapAllocator::new(bitmap, total_chunks);
            alloc.free(&mut hint, chunk_index, old_chunks.max(1));
        }
        self.grapheme_hint = hint;

        self.grapheme_map()
            .insert(key, GraphemeSlice { chunk_index: new_chunk_start, codepoint_count: new_count })
            .map_err(|_| PageError::OutOfMemory)?;
        let cell = self.get_cell_mut(row, col);
        if cell.content_tag() != ContentTag::CodepointGrapheme {
            let base = cell.codepoint();
            cell.set_codepoint_with_grapheme(base);
        }
        self.get_row_mut(row).mark_grapheme();
        Ok(())
    }

    /// The extra codepoints of a grapheme cluster cell, in append order
    /// (the base codepoint lives in the cell itself, spec.md §3).
    pub fn lookup_grapheme(&self, key: u32) -> Option<&[u32]> {
        // Read-only lookup without reconstructing the mutable map view.
        let idx = self.grapheme_map_find_readonly(key)?;
        let slots: &[Slot<u32, GraphemeSlice>] = unsafe {
            std::slice::from_raw_parts(
                self.base_ptr().add(self.layout.grapheme_map_offset as usize)
                    as *const Slot<u32, GraphemeSlice>,
                self.capacity.grapheme_map_capacity as usize,
            )
        };
        let slice = slots[idx].value();
        let arena = self.grapheme_arena();
        let base = slice.chunk_index as usize * CHUNK_CODEPOINTS;
        Some(&arena[base..base + slice.codepoint_count as usize])
    }

    pub fn lookup_grapheme_at(&self, row: u32, col: u32) -> Option<&[u32]> {
        self.lookup_grapheme(self.cell_offset_key(row, col))
    }

    fn grapheme_map_find_readonly(&self, key: u32) -> Option<usize> {
        let slots: &[Slot<u32, GraphemeSlice>] = unsafe {
            std::slice::from_raw_parts(
                self.base_ptr().add(self.layout.grapheme_map_offset as usize)
                    as *const Slot<u32, GraphemeSlice>,
                self.capacity.grapheme_map_capacity as usize,
            )
        };
        let cap = slots.len();
        if cap == 0 {
            return None;
        }
        // Must match OffsetHashMap::probe's starting index exactly, since
        // this scan walks the same slot storage without going through a
        // live OffsetHashMap borrow.
        let mut idx = (hash_of(&key) as usize) % cap;
        for _ in 0..cap {
            if slots[idx].is_empty() {
                return None;
            }
            if slots[idx].is_occupied() && slots[idx].key() == key {
                return Some(idx);
            }
            idx = (idx + 1) % cap;
        }
        None
    }

    pub fn style_at(&mut self, id: u16) -> Option<Style> {
        self.style_set().get(id)
    }

    pub fn upsert_style(&mut self, style: Style) -> PageResult<u16> {
        self.style_set().upsert(style).map_err(|_| PageError::OutOfMemory)
    }

    // ---- integrity -------------------------------------------------------

    /// Exhaustive correctness check (spec.md §4.2, §7). Intended for debug
    /// builds / tests, O(total cells); not on any hot path.
    pub fn verify_integrity(&mut self) -> Result<(), IntegrityViolation> {
        if self.size.rows == 0 {
            return Err(IntegrityViolation::ZeroRowCount);
        }
        if self.size.cols == 0 {
            return Err(IntegrityViolation::ZeroColCount);
        }
        for y in 0..self.size.rows {
            let row = *self.get_row(y);
            let mut row_has_grapheme = false;
            let mut row_has_style = false;
            for x in 0..self.size.cols {
                let cell = *self.get_cell(y, x);
                match cell.wide() {
                    Wide::SpacerTail => {
                        if x == 0 || self.get_cell(y, x - 1).wide() != Wide::Wide {
                            return Err(IntegrityViolation::InvalidSpacerTailLocation);
                        }
                    }
                    Wide::SpacerHead => {
                        if x != self.size.cols - 1 {
                            return Err(IntegrityViolation::InvalidSpacerHeadLocation);
                        }
                        if !row.wrap() {
                            return Err(IntegrityViolation::UnwrappedSpacerHead);
                        }
                    }
                    _ => {}
                }
                if cell.content_tag() == ContentTag::CodepointGrapheme {
                    row_has_grapheme = true;
                    let key = self.cell_offset_key(y, x);
                    if self.lookup_grapheme(key).is_none() {
                        return Err(IntegrityViolation::MissingGraphemeData);
                    }
                }
                if cell.has_style() {
                    row_has_style = true;
                    if self.style_set().get(cell.style_id()).is_none() {
                        return Err(IntegrityViolation::MissingStyle);
                    }
                }
            }
            if row_has_grapheme && !row.grapheme() {
                return Err(IntegrityViolation::UnmarkedGraphemeRow);
            }
            if row_has_style && !row.styled() {
                return Err(IntegrityViolation::UnmarkedStyleRow);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Wide;

    fn small_page() -> Page {
        let mut cap = Capacity::STANDARD;
        cap.rows = 4;
        cap.cols = 4;
        cap.styles = 4;
        cap.grapheme_bytes = CHUNK_BYTES as u32 * 4;
        cap.grapheme_map_capacity = 8;
        let mut page = Page::init(cap).unwrap();
        page.set_size(Size { rows: 4, cols: 4 });
        page
    }

    #[test]
    fn init_zeroes_all_cells() {
        let mut page = small_page();
        for y in 0..4 {
            for x in 0..4 {
                assert!(page.get_cell(y, x).is_empty());
            }
        }
    }

    #[test]
    fn write_and_read_codepoint() {
        let mut page = small_page();
        page.get_cell_mut(0, 0).set_codepoint('x' as u32);
        assert_eq!(page.get_cell(0, 0).codepoint(), 'x' as u32);
    }

    #[test]
    fn append_grapheme_roundtrips() {
        let mut page = small_page();
        page.get_cell_mut(0, 0).set_codepoint('e' as u32);
        page.append_grapheme(0, 0, 0x0301).unwrap(); // combining acute accent
        let extra = page.lookup_grapheme_at(0, 0).unwrap();
        assert_eq!(extra, &[0x0301]);
        assert_eq!(page.get_cell(0, 0).content_tag(), ContentTag::CodepointGrapheme);
        assert!(page.get_row(0).grapheme());
    }

    #[test]
    fn clear_cells_releases_style_and_resets_row_on_full_clear() {
        let mut page = small_page();
        let style = Style { fg: crate::style::Color::rgb(1, 2, 3), ..Default::default() };
        let id = page.upsert_style(style).unwrap();
        page.get_cell_mut(0, 0).set_style_id(id);
        page.get_row_mut(0).mark_styled();
        page.clear_cells(0, 0, 4);
        assert!(!page.get_row(0).styled());
        assert_eq!(page.style_set().ref_count(id), 0);
    }

    #[test]
    fn move_cells_preserves_grapheme_and_clears_source() {
        let mut page = small_page();
        page.get_cell_mut(0, 0).set_codepoint('a' as u32);
        page.append_grapheme(0, 0, 0x300).unwrap();
        page.move_cells(0, 0, 0, 2, 1);
        assert_eq!(page.get_cell(0, 2).codepoint(), 'a' as u32);
        assert_eq!(page.lookup_grapheme_at(0, 2).unwrap(), &[0x300]);
        assert!(page.get_cell(0, 0).is_empty());
    }

    #[test]
    fn swap_cells_exchanges_content() {
        let mut page = small_page();
        page.get_cell_mut(0, 0).set_codepoint('a' as u32);
        page.get_cell_mut(0, 1).set_codepoint('b' as u32);
        page.swap_cells(0, 0, 1);
        assert_eq!(page.get_cell(0, 0).codepoint(), 'b' as u32);
        assert_eq!(page.get_cell(0, 1).codepoint(), 'a' as u32);
    }

    #[test]
    fn verify_integrity_rejects_unwrapped_spacer_head() {
        let mut page = small_page();
        page.get_cell_mut(0, 3).set_wide(Wide::SpacerHead);
        assert_eq!(page.verify_integrity(), Err(IntegrityViolation::UnwrappedSpacerHead));
    }

    #[test]
    fn verify_integrity_accepts_wrapped_spacer_head() {
        let mut page = small_page();
        page.get_row_mut(0).set_wrap(true);
        page.get_cell_mut(0, 3).set_wide(Wide::SpacerHead);
        assert_eq!(page.verify_integrity(), Ok(()));
    }

    #[test]
    fn clone_duplicates_independent_buffer() {
        let mut page = small_page();
        page.get_cell_mut(0, 0).set_codepoint('z' as u32);
        let mut cloned = page.clone().unwrap();
        assert_eq!(cloned.get_cell(0, 0).codepoint(), 'z' as u32);
        cloned.get_cell_mut(0, 0).set_codepoint('y' as u32);
        assert_eq!(page.get_cell(0, 0).codepoint(), 'z' as u32);
        assert_eq!(cloned.verify_integrity(), Ok(()));
    }
}
