//! `erase_rows`, `erase_row`, `erase_row_bounded` (spec.md §4.4).
//!
//! New: the teacher has no analog for "remove rows from the middle of a
//! chain and slide the tail up," since its pages are addressed by a flat
//! table rather than chained. Grounded on the pin-rewrite helper pattern
//! already established in `pagelist/pin.rs` (snapshot, recompute, write
//! back) rather than on any one teacher file.

use crate::error::Result as PlResult;
use crate::pagelist::pin::Pin;
use crate::pagelist::{PageList, PointTag, TaggedPoint, Viewport};

impl PageList {
    /// `erase_rows(top_pt, bot_pt?)` (spec.md §4.4): removes the absolute
    /// rows `[top, bot]`, shifting everything below up to fill the gap,
    /// then shrinking the tail by the erased count. If the erased region
    /// overlapped the active area, regrows by the same count so
    /// `total_rows` is restored (spec.md §8 property 8).
    pub fn erase_rows(&mut self, top_pt: TaggedPoint, bot_pt: Option<TaggedPoint>) -> PlResult<()> {
        let total = self.total_rows();
        if total == 0 {
            return Ok(());
        }
        let top_abs = self.point_to_absolute(top_pt).min(total - 1);
        let bot_abs = bot_pt
            .map(|b| self.point_to_absolute(b))
            .unwrap_or(total - 1)
            .min(total - 1);
        if bot_abs < top_abs {
            return Ok(());
        }
        let count = bot_abs - top_abs + 1;
        let active_top = self.active_top_absolute_row();
        let touched_active = bot_abs >= active_top;

        // Slide every row below the erased range up by `count`.
        for dst in top_abs..(total - count) {
            self.copy_absolute_row(dst, dst + count).map_err(crate::error::PageListError::Page)?;
        }
        // Clear what is now the trailing `count` rows so future growth
        // reuses zeroed memory rather than stale content.
        for abs in (total - count)..total {
            self.clear_absolute_row(abs);
        }

        self.remap_pins_for_erase(top_abs, bot_abs, count, total);
        self.remove_trailing_rows(count)?;

        if touched_active {
            self.grow_by(count)?;
        }

        self.settle_viewport_after_erase();
        Ok(())
    }

    /// Pins within `[top_abs, bot_abs]` land at `top_abs` (clamped into
    /// whatever now occupies that slot); pins below shift up by `count`;
    /// pins above are untouched.
    fn remap_pins_for_erase(&mut self, top_abs: u32, bot_abs: u32, count: u32, total: u32) {
        let snapshot = self.pins().snapshot();
        for (handle, pin) in snapshot {
            let Some(ar) = self.pin_to_absolute_row(pin) else { continue };
            let new_abs = if ar >= top_abs && ar <= bot_abs {
                top_abs.min(total.saturating_sub(count + 1))
            } else if ar > bot_abs {
                ar - count
            } else {
                continue;
            };
            if let Some(new_pin) = self.absolute_row_to_pin(new_abs, pin.x) {
                self.pins_mut().set(handle, new_pin);
            }
        }
    }

    /// Shrink the page chain by exactly `count` rows, taken from the back,
    /// retiring any page whose size drops to zero.
    fn remove_trailing_rows(&mut self, mut count: u32) -> PlResult<()> {
        while count > 0 {
            let Some((id, mut page)) = self.pop_back_page() else { break };
            let rows = page.size().rows;
            if rows <= count {
                count -= rows;
                self.retire_page(page);
                let _ = id;
                if self.page_count() == 0 {
                    // Never leave the list empty; reinit a fresh page.
                    let capacity = crate::page::layout::Capacity::STANDARD;
                    self.push_new_page(capacity, 0)?;
                    break;
                }
            } else {
                let mut size = page.size();
                size.rows -= count;
                page.set_size(size);
                count = 0;
                self.push_back_entry(id, page);
            }
        }
        Ok(())
    }

    fn settle_viewport_after_erase(&mut self) {
        let active_top = self.active_top_absolute_row();
        match self.viewport() {
            Viewport::Pinned => {
                let vp = self.viewport_pin();
                if let Some(abs) = self.pin_to_absolute_row(vp) {
                    if abs >= active_top {
                        self.set_viewport(Viewport::Active);
                    }
                }
            }
            Viewport::Top => {
                if let Some(first_id) = self.first_id() {
                    if self.pin_to_absolute_row(Pin::new(first_id, 0, 0)).unwrap_or(0) >= active_top {
                        self.set_viewport(Viewport::Active);
                    }
                }
            }
            Viewport::Active => {}
        }
    }

    /// Shared single-row rotate used by both `erase_row` and
    /// `erase_row_bounded`. Rather than physically shift every row record
    /// one at a time across the whole tail, this copies content down from
    /// below one row at a time (same net effect spec.md §4.4 describes as
    /// "rotate row records"), stopping either at the end of the chain or
    /// at `limit` rows for the bounded variant.
    fn erase_row_impl(&mut self, pt: TaggedPoint, limit: Option<u32>) -> PlResult<()> {
        let total = self.total_rows();
        if total == 0 {
            return Ok(());
        }
        let erased_abs = self.point_to_absolute(pt).min(total - 1);
        let cap = limit.map(|l| (erased_abs + l).min(total - 1)).unwrap_or(total - 1);

        let mut last_written = erased_abs;
        for dst in erased_abs..cap {
            self.copy_absolute_row(dst, dst + 1).map_err(crate::error::PageListError::Page)?;
            last_written = dst;
        }
        self.clear_absolute_row(cap);

        // Pins strictly within the shifted range move up by one row. A
        // pin exactly at the erased row follows its content to wherever
        // the cascade last wrote — the last row physically touched,
        // rather than "up by one," since nothing from below replaces it
        // when the cascade is bounded short of the chain's end.
        let snapshot = self.pins().snapshot();
        for (handle, pin) in snapshot {
            let Some(ar) = self.pin_to_absolute_row(pin) else { continue };
            if ar == erased_abs {
                if let Some(new_pin) = self.absolute_row_to_pin(last_written, pin.x) {
                    self.pins_mut().set(handle, new_pin);
                }
            } else if ar > erased_abs && ar <= cap {
                if let Some(new_pin) = self.absolute_row_to_pin(ar - 1, pin.x) {
                    self.pins_mut().set(handle, new_pin);
                }
            }
        }
        self.settle_viewport_after_erase();
        Ok(())
    }

    /// `erase_row(pt)` (spec.md §4.4): cascades all the way to the end of
    /// the chain.
    pub fn erase_row(&mut self, pt: TaggedPoint) -> PlResult<()> {
        self.erase_row_impl(pt, None)
    }

    /// `erase_row_bounded(pt, limit)` (spec.md §4.4): caps the cascade at
    /// `limit` rows below `pt`, clearing the final exposed row in place
    /// rather than continuing further down the chain.
    pub fn erase_row_bounded(&mut self, pt: TaggedPoint, limit: u32) -> PlResult<()> {
        self.erase_row_impl(pt, Some(limit))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagelist::PageList;

    #[test]
    fn erase_row_pulls_content_up_from_same_page() {
        let mut list = PageList::new(8, 4, None).unwrap();
        let pin0 = list.pin(TaggedPoint::new(PointTag::Active, 0, 1)).unwrap();
        list.row_and_cell_mut(pin0).unwrap().1.set_codepoint('A' as u32);
        list.erase_row(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        let moved = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        assert_eq!(list.get_cell_at_pin(moved).unwrap().codepoint(), 'A' as u32);
    }

    #[test]
    fn erase_rows_restores_total_rows_after_regrow() {
        let mut list = PageList::new(8, 6, None).unwrap();
        let before = list.total_rows();
        list.erase_rows(TaggedPoint::new(PointTag::Active, 0, 0), Some(TaggedPoint::new(PointTag::Active, 0, 1))).unwrap();
        assert_eq!(list.total_rows(), before);
    }

    #[test]
    fn erase_rows_out_of_active_does_not_regrow() {
        let mut list = PageList::new(8, 4, None).unwrap();
        list.grow_by(10).unwrap();
        let before = list.total_rows();
        list.erase_rows(TaggedPoint::new(PointTag::Screen, 0, 0), Some(TaggedPoint::new(PointTag::Screen, 0, 0))).unwrap();
        assert_eq!(list.total_rows(), before - 1);
    }
}
