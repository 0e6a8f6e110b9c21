//! `scroll(behavior)` (spec.md §4.8): viewport-only, never allocates.
//!
//! New: grounded directly on spec.md §4.8's variant list; the teacher has
//! no scroll-position concept since it has no viewport, only a flat
//! buffer-pool frame table.

use crate::pagelist::pin::Pin;
use crate::pagelist::{PageList, Viewport};
use crate::row::SemanticPrompt;

/// Direction/target for [`PageList::scroll`].
pub enum ScrollBehavior {
    Active,
    Top,
    /// Move the viewport by `n` rows; negative moves up (towards
    /// scrollback).
    DeltaRow(i64),
    /// Walk in the direction of `n`'s sign, landing on the `|n|`-th row
    /// whose `semantic_prompt` is prompt-like.
    DeltaPrompt(i64),
    Pin(Pin),
}

impl PageList {
    pub fn scroll(&mut self, behavior: ScrollBehavior) {
        match behavior {
            ScrollBehavior::Active => self.set_viewport(Viewport::Active),
            ScrollBehavior::Top => self.set_viewport(Viewport::Top),
            ScrollBehavior::DeltaRow(n) => self.scroll_delta_row(n),
            ScrollBehavior::DeltaPrompt(n) => self.scroll_delta_prompt(n),
            ScrollBehavior::Pin(p) => self.scroll_to_pin(p),
        }
    }

    /// Helper: when the viewport tag is currently `active`/`top`, its
    /// "absolute top" isn't stored as a pin at all, so `scroll`'s relative
    /// moves need the tag-agnostic absolute position.
    fn current_viewport_top_absolute(&self) -> u32 {
        match self.viewport() {
            Viewport::Active => self.active_top_absolute_row(),
            Viewport::Top => 0,
            Viewport::Pinned => self.pin_to_absolute_row(self.viewport_pin()).unwrap_or(0),
        }
    }

    fn scroll_delta_row(&mut self, n: i64) {
        let current = self.current_viewport_top_absolute() as i64;
        let total = self.total_rows() as i64;
        let target = (current + n).clamp(0, (total - 1).max(0));
        let active_top = self.active_top_absolute_row() as i64;
        if target >= active_top {
            self.set_viewport(Viewport::Active);
            return;
        }
        if let Some(pin) = self.absolute_row_to_pin(target as u32, 0) {
            self.set_viewport_pin(pin);
            self.set_viewport(Viewport::Pinned);
        }
    }

    fn scroll_delta_prompt(&mut self, n: i64) {
        if n == 0 {
            return;
        }
        let current = self.current_viewport_top_absolute();
        let total = self.total_rows();
        let step: i64 = if n > 0 { 1 } else { -1 };
        let mut remaining = n.unsigned_abs();
        let mut cursor = current as i64;
        let mut found: Option<u32> = None;

        loop {
            cursor += step;
            if cursor < 0 || cursor >= total as i64 {
                break;
            }
            if self.row_semantic_prompt_at(cursor as u32).is_prompt_like() {
                remaining -= 1;
                if remaining == 0 {
                    found = Some(cursor as u32);
                    break;
                }
            }
        }

        let Some(target) = found else { return };
        let active_top = self.active_top_absolute_row();
        if target >= active_top {
            self.set_viewport(Viewport::Active);
        } else if let Some(pin) = self.absolute_row_to_pin(target, 0) {
            self.set_viewport_pin(pin);
            self.set_viewport(Viewport::Pinned);
        }
    }

    fn scroll_to_pin(&mut self, p: Pin) {
        self.set_viewport_pin(p);
        if let Some(abs) = self.pin_to_absolute_row(p) {
            if abs >= self.active_top_absolute_row() {
                self.set_viewport(Viewport::Active);
                return;
            }
        }
        self.set_viewport(Viewport::Pinned);
    }

    fn row_semantic_prompt_at(&self, abs: u32) -> SemanticPrompt {
        self.absolute_to_page_row(abs)
            .and_then(|(idx, y)| self.page_row_semantic_prompt(idx, y))
            .unwrap_or(SemanticPrompt::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagelist::{PointTag, TaggedPoint};

    #[test]
    fn scroll_delta_row_stays_active_with_no_scrollback() {
        let mut list = PageList::new(8, 4, None).unwrap();
        list.scroll(ScrollBehavior::DeltaRow(-1_000_000));
        assert_eq!(list.viewport(), Viewport::Active);
    }

    #[test]
    fn scroll_top_sets_viewport_tag() {
        let mut list = PageList::new(8, 4, None).unwrap();
        list.scroll(ScrollBehavior::Top);
        assert_eq!(list.viewport(), Viewport::Top);
    }

    #[test]
    fn scroll_to_pin_within_active_collapses_to_active() {
        let mut list = PageList::new(8, 4, None).unwrap();
        let pin = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        list.scroll(ScrollBehavior::Pin(pin));
        assert_eq!(list.viewport(), Viewport::Active);
    }
}
