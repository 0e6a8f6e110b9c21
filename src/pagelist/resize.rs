//! Non-reflow resize: row/col changes that never redistribute content
//! across rows (spec.md §4.6), plus the `resize(...)` dispatcher that
//! picks between this path and `reflow` (spec.md §6).
//!
//! New: the teacher's buffer pool never changes shape after init, so
//! there is no direct analog. Grounded on the page-capacity arithmetic
//! already established in `page/layout.rs` (`Capacity::adjust`) and the
//! pin-rewrite pattern from `pagelist/pin.rs`.

use crate::error::{PageListError, Result as PlResult};
use crate::pagelist::PageList;

/// Optional cursor position supplied to `resize`, used to decide how rows
/// are grown/trimmed without disturbing it (spec.md §4.5, §4.6).
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub x: u32,
    pub y: u32,
}

pub struct ResizeRequest {
    pub cols: Option<u32>,
    pub rows: Option<u32>,
    pub reflow: bool,
    pub cursor: Option<Cursor>,
}

impl PageList {
    /// `resize({cols?, rows?, reflow, cursor?})` (spec.md §6): dispatches
    /// to the reflow engine when columns change and `reflow` is
    /// requested, otherwise performs the simpler row/col-only
    /// redistribution-free path.
    pub fn resize(&mut self, req: ResizeRequest) -> PlResult<()> {
        let new_cols = req.cols.unwrap_or(self.cols());
        let new_rows = req.rows.unwrap_or(self.rows());

        if new_cols != self.cols() && req.reflow {
            self.reflow_to_cols(new_cols, req.cursor)?;
        } else if new_cols != self.cols() {
            self.resize_cols_no_reflow(new_cols)?;
        }

        if new_rows != self.rows() {
            self.resize_rows_no_reflow(new_rows, req.cursor)?;
        }
        Ok(())
    }

    fn resize_cols_no_reflow(&mut self, new_cols: u32) -> PlResult<()> {
        if new_cols < self.cols() {
            self.shrink_cols_no_reflow(new_cols);
        } else {
            self.grow_cols_no_reflow(new_cols)?;
        }
        self.set_cols(new_cols);
        Ok(())
    }

    /// Cols smaller (spec.md §4.6): clear the truncated column range of
    /// every page, shrink `size.cols`, and clamp every pin's `x` into
    /// range.
    fn shrink_cols_no_reflow(&mut self, new_cols: u32) {
        let old_cols = self.cols();
        for idx in 0..self.page_count() {
            let page = self.page_at_mut_by_index(idx);
            let rows = page.size().rows;
            for y in 0..rows {
                page.clear_cells(y, new_cols, old_cols);
            }
            let mut size = page.size();
            size.cols = new_cols;
            page.set_size(size);
        }
        let snapshot = self.pins().snapshot();
        for (handle, mut pin) in snapshot {
            if pin.x >= new_cols {
                pin.x = new_cols.saturating_sub(1);
                self.pins_mut().set(handle, pin);
            }
        }
    }

    /// Cols larger (spec.md §4.6): extend pages whose capacity already
    /// covers the new width in place; pages with too little capacity are
    /// reallocated at `Capacity::adjust(new_cols)` and their rows copied
    /// across, filling spare row capacity in already-adjusted pages first
    /// to avoid fragmentation.
    fn grow_cols_no_reflow(&mut self, new_cols: u32) -> PlResult<()> {
        for idx in 0..self.page_count() {
            let needs_realloc = {
                let page = self.page_at_mut_by_index(idx);
                page.capacity().cols < new_cols
            };
            if needs_realloc {
                self.reallocate_page_for_cols(idx, new_cols)?;
            } else {
                let page = self.page_at_mut_by_index(idx);
                let mut size = page.size();
                size.cols = new_cols;
                page.set_size(size);
            }
        }
        Ok(())
    }

    fn reallocate_page_for_cols(&mut self, idx: usize, new_cols: u32) -> PlResult<()> {
        let old_capacity = self.page_at_mut_by_index(idx).capacity();
        let new_capacity = old_capacity
            .adjust(new_cols)
            .map_err(|_| PageListError::ResizeInfeasible)?;
        let mut new_page = crate::page::Page::init(new_capacity).map_err(PageListError::Page)?;
        let size = self.page_at_mut_by_index(idx).size();
        let mut new_size = size;
        new_size.cols = new_cols;
        new_page.set_size(new_size);
        for y in 0..size.rows {
            new_page
                .clone_partial_row_from(self.page_at_mut_by_index(idx), y, y, 0, size.cols)
                .map_err(PageListError::Page)?;
        }
        self.replace_page_at_index(idx, new_page);
        Ok(())
    }

    fn resize_rows_no_reflow(&mut self, new_rows: u32, cursor: Option<Cursor>) -> PlResult<()> {
        if new_rows < self.rows() {
            self.shrink_rows_no_reflow(new_rows);
        } else {
            self.grow_rows_no_reflow(new_rows, cursor)?;
        }
        Ok(())
    }

    /// Rows smaller (spec.md §4.6): first trim trailing blank rows that
    /// hold no pin, up to the requested delta — since the active area is
    /// always the bottom `rows` rows of the chain, the bottom-most
    /// physical row is always part of it, so trimming from the tail never
    /// needs to look further up to stay within the active area. Only the
    /// remainder of the delta, if the trailing rows aren't all blank or
    /// one is pinned, falls back to simply lowering `rows`, which pushes
    /// whatever is left at the top of the former active area into
    /// scrollback.
    fn shrink_rows_no_reflow(&mut self, new_rows: u32) {
        let mut remaining = self.rows() - new_rows;
        while remaining > 0 && self.last_row_is_blank() && !self.last_row_has_pin() {
            self.pop_last_row();
            remaining -= 1;
        }
        self.set_rows(new_rows);
    }

    fn last_row_has_pin(&self) -> bool {
        let total = self.total_rows();
        if total == 0 {
            return false;
        }
        let last_abs = total - 1;
        self.pins().iter().any(|(_, pin)| self.pin_to_absolute_row(pin) == Some(last_abs))
    }

    fn grow_rows_no_reflow(&mut self, new_rows: u32, cursor: Option<Cursor>) -> PlResult<()> {
        let delta = new_rows - self.rows();
        if let Some(c) = cursor {
            if c.y + 1 < self.rows() {
                self.set_rows(new_rows);
                return Ok(());
            }
        }
        let available_scrollback = self.active_top_absolute_row();
        self.set_rows(new_rows);
        let shortfall = delta.saturating_sub(available_scrollback);
        if shortfall > 0 {
            self.grow_by(shortfall)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagelist::{PointTag, TaggedPoint};

    #[test]
    fn shrinking_cols_clamps_pins() {
        let mut list = PageList::new(8, 4, None).unwrap();
        let pin = list.pin(TaggedPoint::new(PointTag::Active, 7, 0)).unwrap();
        let handle = list.track_pin(pin);
        list.resize(ResizeRequest { cols: Some(4), rows: None, reflow: false, cursor: None }).unwrap();
        assert!(list.pin_at(handle).x < 4);
        assert_eq!(list.cols(), 4);
    }

    #[test]
    fn growing_rows_increases_total_rows() {
        let mut list = PageList::new(8, 4, None).unwrap();
        list.resize(ResizeRequest { cols: None, rows: Some(8), reflow: false, cursor: None }).unwrap();
        assert_eq!(list.rows(), 8);
        assert!(list.total_rows() >= 8);
    }

    #[test]
    fn shrinking_rows_trims_trailing_blanks_instead_of_scrolling_content() {
        let mut list = PageList::new(8, 4, None).unwrap();
        let p0 = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        list.row_and_cell_mut(p0).unwrap().1.set_codepoint('A' as u32);
        let p1 = list.pin(TaggedPoint::new(PointTag::Active, 0, 1)).unwrap();
        list.row_and_cell_mut(p1).unwrap().1.set_codepoint('B' as u32);
        // rows 2, 3 are left blank.

        list.resize(ResizeRequest { cols: None, rows: Some(2), reflow: false, cursor: None }).unwrap();

        assert_eq!(list.rows(), 2);
        assert_eq!(list.total_rows(), 2, "trailing blanks should be trimmed, not pushed into scrollback");
        let a = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        let b = list.pin(TaggedPoint::new(PointTag::Active, 0, 1)).unwrap();
        assert_eq!(list.get_cell_at_pin(a).unwrap().codepoint(), 'A' as u32);
        assert_eq!(list.get_cell_at_pin(b).unwrap().codepoint(), 'B' as u32);
    }

    #[test]
    fn shrinking_rows_falls_back_to_scrollback_when_nothing_trimmable() {
        let mut list = PageList::new(8, 4, None).unwrap();
        for (y, ch) in ['A', 'B', 'C', 'D'].into_iter().enumerate() {
            let pin = list.pin(TaggedPoint::new(PointTag::Active, 0, y as u32)).unwrap();
            list.row_and_cell_mut(pin).unwrap().1.set_codepoint(ch as u32);
        }

        list.resize(ResizeRequest { cols: None, rows: Some(2), reflow: false, cursor: None }).unwrap();

        assert_eq!(list.rows(), 2);
        assert_eq!(list.total_rows(), 4, "no blank rows to trim, so nothing physically shrinks");
        let top = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        let bot = list.pin(TaggedPoint::new(PointTag::Active, 0, 1)).unwrap();
        assert_eq!(list.get_cell_at_pin(top).unwrap().codepoint(), 'C' as u32);
        assert_eq!(list.get_cell_at_pin(bot).unwrap().codepoint(), 'D' as u32);
    }

    #[test]
    fn shrinking_rows_does_not_trim_a_pinned_blank_row() {
        let mut list = PageList::new(8, 4, None).unwrap();
        let p0 = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        list.row_and_cell_mut(p0).unwrap().1.set_codepoint('A' as u32);
        // Row 3 (the last row) is blank but pinned, so it must survive the trim.
        let last_blank = list.pin(TaggedPoint::new(PointTag::Active, 0, 3)).unwrap();
        let handle = list.track_pin(last_blank);

        list.resize(ResizeRequest { cols: None, rows: Some(2), reflow: false, cursor: None }).unwrap();

        assert_eq!(list.rows(), 2);
        assert_eq!(list.total_rows(), 4, "the pinned trailing blank row blocks the trim entirely");
        assert_eq!(list.pin_at(handle), last_blank);
    }
}
