//! Column-change reflow engine (spec.md §4.5).
//!
//! New: the teacher never redistributes bytes across its fixed-size pages,
//! so this has no teacher analog. Grounded on spec.md §4.5's source/
//! destination cursor description and on the pin snapshot/remap pattern
//! from `pagelist/pin.rs`.
//!
//! Walks every source row in absolute order (crossing page boundaries
//! transparently — a single flat cursor, not a nested per-page loop, so a
//! wrapped line that spans a page boundary needs no special-casing),
//! writing into a freshly allocated destination chain with its own
//! cursor. Blank lines with no pin on them are folded: counted, then
//! flushed as a single batch of destination rows rather than written one
//! at a time.

use std::collections::VecDeque;

use crate::cell::{Cell, Wide};
use crate::error::{PageListError, Result as PlResult};
use crate::page::layout::Capacity;
use crate::page::{Page, Size};
use crate::pagelist::pin::{Pin, PinHandle};
use crate::pagelist::resize::Cursor;
use crate::pagelist::{PageEntry, PageId, PageList};

/// Destination-side cursor: the page currently being filled plus its
/// live row/col position. Rolling to a fresh page is transparent to
/// callers — they only ever see `current_row()`/`cur_x`.
struct DestCursor {
    pages: VecDeque<PageEntry>,
    next_id: PageId,
    capacity: Capacity,
    cols: u32,
    cur_page: Page,
    cur_id: PageId,
    cur_row: Option<u32>,
    cur_x: u32,
}

impl DestCursor {
    fn new(capacity: Capacity, cols: u32, mut next_id: PageId) -> PlResult<Self> {
        let mut page = Page::init(capacity).map_err(PageListError::Page)?;
        page.set_size(Size { rows: 0, cols });
        let id = next_id;
        next_id += 1;
        Ok(Self { pages: VecDeque::new(), next_id, capacity, cols, cur_page: page, cur_id: id, cur_row: None, cur_x: 0 })
    }

    fn roll_page(&mut self) -> PlResult<()> {
        let mut fresh = Page::init(self.capacity).map_err(PageListError::Page)?;
        fresh.set_size(Size { rows: 0, cols: self.cols });
        let fresh_id = self.next_id;
        self.next_id += 1;
        let old_page = std::mem::replace(&mut self.cur_page, fresh);
        let old_id = std::mem::replace(&mut self.cur_id, fresh_id);
        self.pages.push_back(PageEntry { id: old_id, page: old_page });
        self.cur_row = None;
        Ok(())
    }

    /// Start a brand new destination row, rolling to a fresh page if the
    /// current one is at capacity.
    fn start_row(&mut self, wrap_continuation: bool) -> PlResult<()> {
        if self.cur_page.size().rows >= self.capacity.rows {
            self.roll_page()?;
        }
        let mut size = self.cur_page.size();
        let y = size.rows;
        size.rows += 1;
        self.cur_page.set_size(size);
        if wrap_continuation {
            self.cur_page.get_row_mut(y).set_wrap_continuation(true);
        }
        self.cur_row = Some(y);
        self.cur_x = 0;
        Ok(())
    }

    fn current_row(&self) -> u32 {
        self.cur_row.expect("destination row started before any cell write")
    }

    fn mark_current_row_wrap(&mut self) {
        let y = self.current_row();
        self.cur_page.get_row_mut(y).set_wrap(true);
    }

    fn set_current_row_semantic(&mut self, s: crate::row::SemanticPrompt) {
        let y = self.current_row();
        self.cur_page.get_row_mut(y).set_semantic_prompt(s);
    }

    fn finish(mut self) -> (VecDeque<PageEntry>, PageId) {
        self.pages.push_back(PageEntry { id: self.cur_id, page: self.cur_page });
        (self.pages, self.next_id)
    }
}

impl PageList {
    /// `resize({cols, reflow: true})` dispatch target (spec.md §4.5).
    pub(crate) fn reflow_to_cols(&mut self, new_cols: u32, cursor: Option<Cursor>) -> PlResult<()> {
        if new_cols == self.cols() {
            return Ok(());
        }
        let old_cols = self.cols();
        let total_before = self.total_rows();
        tracing::debug!(old_cols, new_cols, total_rows = total_before, "reflowing page list to new column count");
        let active_top_before = self.active_top_absolute_row();
        let rows_below_cursor_before = cursor.map(|c| {
            let abs = active_top_before + c.y;
            total_before.saturating_sub(abs + 1)
        });

        let pin_snapshot = self.pins().snapshot();
        let mut pending_pins: Vec<(PinHandle, u32, u32)> = pin_snapshot
            .iter()
            .filter_map(|&(h, p)| self.pin_to_absolute_row(p).map(|abs| (h, abs, p.x)))
            .collect();
        let mut remapped: Vec<(PinHandle, Pin)> = Vec::new();

        let dst_capacity = Self::capacity_for_cols(new_cols)?;
        let mut dest = DestCursor::new(dst_capacity, new_cols, self.next_id)?;

        let mut blank_run: u32 = 0;
        let mut prev_src_wrapped = false;
        let mut src_abs = 0u32;

        while src_abs < total_before {
            let (page_idx, y) = self
                .absolute_to_page_row(src_abs)
                .expect("src_abs stays within total_before");
            let row_wrap = self.pages[page_idx].page.get_row(y).wrap();
            let cols_len = self.trimmed_row_len(page_idx, y, old_cols, &pending_pins, src_abs);

            if !prev_src_wrapped && cols_len == 0 && !row_wrap {
                blank_run += 1;
                src_abs += 1;
                continue;
            }

            if blank_run > 0 {
                for _ in 0..blank_run {
                    dest.start_row(false)?;
                }
                blank_run = 0;
            }

            if !prev_src_wrapped {
                dest.start_row(false)?;
                let semantic = self.pages[page_idx].page.get_row(y).semantic_prompt();
                dest.set_current_row_semantic(semantic);
            }

            let mut x = 0u32;
            while x < cols_len {
                let cell = *self.pages[page_idx].page.get_cell(y, x);
                if matches!(cell.wide(), Wide::SpacerHead | Wide::SpacerTail) {
                    x += 1;
                    continue;
                }
                let is_wide = cell.wide() == Wide::Wide;

                if is_wide && new_cols == 1 {
                    self.reflow_write_blank(&mut dest)?;
                    self.remap_pin_for_source(&mut pending_pins, &mut remapped, src_abs, x, &dest);
                    x += 2;
                    continue;
                }

                if is_wide && dest.cur_x + 1 >= dest.cols {
                    let mut spacer = Cell::default();
                    spacer.set_wide(Wide::SpacerHead);
                    self.reflow_write_raw_cell(&mut dest, spacer)?;
                    dest.mark_current_row_wrap();
                    dest.start_row(true)?;
                }

                self.reflow_copy_cell(page_idx, y, x, &mut dest)?;
                self.remap_pin_for_source(&mut pending_pins, &mut remapped, src_abs, x, &dest);

                if is_wide {
                    x += 2;
                    if dest.cur_x < dest.cols {
                        let mut tail = Cell::default();
                        tail.set_wide(Wide::SpacerTail);
                        self.reflow_write_raw_cell(&mut dest, tail)?;
                    }
                } else {
                    x += 1;
                }

                if dest.cur_x >= dest.cols && x < cols_len {
                    dest.mark_current_row_wrap();
                    dest.start_row(true)?;
                }
            }

            // Pins sitting in this row's trimmed trailing blanks land on
            // the destination row's last live column.
            let last_x = dest.cur_x.saturating_sub(1).min(dest.cols.saturating_sub(1));
            let cur_id = dest.cur_id;
            let cur_y = dest.current_row();
            for (h, abs, px) in pending_pins.iter() {
                if *abs == src_abs && *px >= cols_len {
                    remapped.push((*h, Pin::new(cur_id, cur_y, last_x)));
                }
            }
            pending_pins.retain(|(_, abs, _)| *abs != src_abs);

            prev_src_wrapped = row_wrap;
            src_abs += 1;
        }

        if blank_run > 0 {
            for _ in 0..blank_run {
                dest.start_row(false)?;
            }
        }
        if dest.cur_page.size().rows == 0 && dest.pages.is_empty() {
            dest.start_row(false)?;
        }

        let (dst_pages, next_id) = dest.finish();
        self.next_id = next_id;
        self.pages = dst_pages;
        self.set_cols(new_cols);

        for (handle, pin) in remapped {
            self.pins_mut().set(handle, pin);
        }

        let deficit = self.rows().saturating_sub(self.total_rows());
        if deficit > 0 {
            self.grow_by(deficit)?;
        }

        self.restore_cursor_row_budget(cursor, rows_below_cursor_before)?;
        Ok(())
    }

    fn trimmed_row_len(
        &self,
        page_idx: usize,
        y: u32,
        cols: u32,
        pending_pins: &[(PinHandle, u32, u32)],
        src_abs: u32,
    ) -> u32 {
        let page = &self.pages[page_idx].page;
        let mut len = cols;
        while len > 0 && page.get_cell(y, len - 1).is_empty() {
            len -= 1;
        }
        for (_, abs, x) in pending_pins {
            if *abs == src_abs {
                len = len.max(x + 1);
            }
        }
        len
    }

    fn reflow_copy_cell(&mut self, src_idx: usize, src_y: u32, src_x: u32, dest: &mut DestCursor) -> PlResult<()> {
        let src_page = &mut self.pages[src_idx].page;
        let mut cell = *src_page.get_cell(src_y, src_x);
        let extra: Option<Vec<u32>> = if cell.content_tag() == crate::cell::ContentTag::CodepointGrapheme {
            src_page.lookup_grapheme_at(src_y, src_x).map(|s| s.to_vec())
        } else {
            None
        };
        let style = if cell.has_style() { src_page.style_at(cell.style_id()) } else { None };

        let py = dest.current_row();
        let px = dest.cur_x;
        cell.set_style_id(crate::style::DEFAULT_STYLE_ID);
        *dest.cur_page.get_cell_mut(py, px) = cell;
        if let Some(style) = style {
            let id = dest.cur_page.upsert_style(style).map_err(PageListError::Page)?;
            dest.cur_page.get_cell_mut(py, px).set_style_id(id);
            dest.cur_page.get_row_mut(py).mark_styled();
        }
        if let Some(codepoints) = extra {
            for cp in codepoints {
                dest.cur_page.append_grapheme(py, px, cp).map_err(PageListError::Page)?;
            }
        }
        dest.cur_x += 1;
        Ok(())
    }

    fn reflow_write_raw_cell(&self, dest: &mut DestCursor, cell: Cell) -> PlResult<()> {
        let py = dest.current_row();
        let px = dest.cur_x;
        *dest.cur_page.get_cell_mut(py, px) = cell;
        dest.cur_x += 1;
        Ok(())
    }

    fn reflow_write_blank(&self, dest: &mut DestCursor) -> PlResult<()> {
        self.reflow_write_raw_cell(dest, Cell::default())
    }

    fn remap_pin_for_source(
        &self,
        pending_pins: &mut Vec<(PinHandle, u32, u32)>,
        remapped: &mut Vec<(PinHandle, Pin)>,
        src_abs: u32,
        src_x: u32,
        dest: &DestCursor,
    ) {
        let py = dest.current_row();
        // The cell just written sits at `cur_x - 1` (copy/blank/raw-cell
        // helpers all advance `cur_x` after writing).
        let dst_x = dest.cur_x.saturating_sub(1);
        let mut i = 0;
        while i < pending_pins.len() {
            if pending_pins[i].1 == src_abs && pending_pins[i].2 == src_x {
                remapped.push((pending_pins[i].0, Pin::new(dest.cur_id, py, dst_x)));
                pending_pins.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn restore_cursor_row_budget(&mut self, cursor: Option<Cursor>, rows_below_before: Option<u32>) -> PlResult<()> {
        let (Some(cursor), Some(before)) = (cursor, rows_below_before) else { return Ok(()) };
        let active_top = self.active_top_absolute_row();
        let total = self.total_rows();
        let cursor_abs = active_top + cursor.y;
        let rows_below_after = total.saturating_sub(cursor_abs + 1);
        if rows_below_after < before {
            self.grow_by(before - rows_below_after)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagelist::resize::ResizeRequest;
    use crate::pagelist::{PointTag, TaggedPoint};

    fn write_str(list: &mut PageList, y: u32, s: &str) {
        for (x, ch) in s.chars().enumerate() {
            let pin = list.pin(TaggedPoint::new(PointTag::Active, x as u32, y)).unwrap();
            list.row_and_cell_mut(pin).unwrap().1.set_codepoint(ch as u32);
        }
    }

    #[test]
    fn reflow_wider_unwraps_two_rows_into_one() {
        let mut list = PageList::new(2, 4, None).unwrap();
        write_str(&mut list, 0, "AB");
        {
            let pin = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
            list.row_and_cell_mut(pin).unwrap().0.set_wrap(true);
        }
        write_str(&mut list, 1, "CD");
        {
            let pin = list.pin(TaggedPoint::new(PointTag::Active, 0, 1)).unwrap();
            list.row_and_cell_mut(pin).unwrap().0.set_wrap_continuation(true);
        }

        list.resize(ResizeRequest { cols: Some(4), rows: None, reflow: true, cursor: None }).unwrap();

        let row0 = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        assert_eq!(list.get_cell_at_pin(row0).unwrap().codepoint(), 'A' as u32);
        let row0c = list.pin(TaggedPoint::new(PointTag::Active, 2, 0)).unwrap();
        assert_eq!(list.get_cell_at_pin(row0c).unwrap().codepoint(), 'C' as u32);
    }

    #[test]
    fn reflow_narrower_wraps_a_row() {
        let mut list = PageList::new(5, 10, None).unwrap();
        write_str(&mut list, 5, "01234");

        list.resize(ResizeRequest { cols: Some(4), rows: None, reflow: true, cursor: None }).unwrap();

        let r5 = list.pin(TaggedPoint::new(PointTag::Active, 0, 5)).unwrap();
        assert_eq!(list.get_cell_at_pin(r5).unwrap().codepoint(), '0' as u32);
    }
}
