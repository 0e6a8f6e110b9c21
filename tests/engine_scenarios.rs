// End-to-end scenarios for the page list: grow/prune under a byte budget,
// reflow in both directions, erase cascades across a page boundary, and
// scroll-clear/capacity-adjust round trips.

use termstore::pagelist::resize::{Cursor, ResizeRequest};
use termstore::pagelist::scroll::ScrollBehavior;
use termstore::pagelist::{PointTag, TaggedPoint};
use termstore::PageList;

fn write_char(list: &mut PageList, tag: PointTag, x: u32, y: u32, ch: char) {
    let pin = list.pin(TaggedPoint::new(tag, x, y)).unwrap();
    list.row_and_cell_mut(pin).unwrap().1.set_codepoint(ch as u32);
}

fn read_char(list: &PageList, tag: PointTag, x: u32, y: u32) -> u32 {
    let pin = list.pin(TaggedPoint::new(tag, x, y)).unwrap();
    list.get_cell_at_pin(pin).unwrap().codepoint()
}

// S1: grow beyond budget prunes scrollback rather than growing past it,
// and a pin tracking the pruned page's content is remapped to the row
// that survives, not left dangling.
#[test]
fn s1_grow_beyond_budget_prunes_scrollback() {
    let mut list = PageList::new(80, 24, Some(0)).unwrap();
    // Fill both the active page and a full second page of scrollback so
    // the next grow() lands exactly on the byte budget.
    list.grow_by(406).unwrap();
    assert_eq!(list.page_count(), 2);

    let pin = list.pin(TaggedPoint::new(PointTag::Screen, 0, 0)).unwrap();
    let handle = list.track_pin(pin);

    list.grow().unwrap();

    assert_eq!(list.page_count(), 2, "prune should recycle a page, not grow the chain");
    let after = list.pin_at(handle);
    assert_ne!(after.page, pin.page, "the pruned page's content must have been remapped onto a surviving page");
    assert_eq!(after.y, 0);
    assert_eq!(after.x, 0);
}

// S2: reflowing wider unwraps a two-row wrapped line into one row.
#[test]
fn s2_reflow_wider_unwraps_wrapped_line() {
    let mut list = PageList::new(2, 4, None).unwrap();
    write_char(&mut list, PointTag::Active, 0, 0, 'A');
    write_char(&mut list, PointTag::Active, 1, 0, 'B');
    {
        let pin = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
        list.row_and_cell_mut(pin).unwrap().0.set_wrap(true);
    }
    write_char(&mut list, PointTag::Active, 0, 1, 'C');
    write_char(&mut list, PointTag::Active, 1, 1, 'D');
    {
        let pin = list.pin(TaggedPoint::new(PointTag::Active, 0, 1)).unwrap();
        list.row_and_cell_mut(pin).unwrap().0.set_wrap_continuation(true);
    }

    list.resize(ResizeRequest { cols: Some(4), rows: None, reflow: true, cursor: None }).unwrap();

    assert_eq!(read_char(&list, PointTag::Active, 0, 0), 'A' as u32);
    assert_eq!(read_char(&list, PointTag::Active, 1, 0), 'B' as u32);
    assert_eq!(read_char(&list, PointTag::Active, 2, 0), 'C' as u32);
    assert_eq!(read_char(&list, PointTag::Active, 3, 0), 'D' as u32);
    assert_eq!(list.total_rows(), 4);
}

// S3: reflowing narrower wraps the row; every tracked pin on that row,
// including the one on the wrapped-away tail character, still points at
// the same character afterwards. Verified through tracked pins rather
// than re-resolved Active coordinates, since reflow can grow total_rows
// enough to shift where the active area's top now falls.
#[test]
fn s3_reflow_narrower_preserves_per_character_pins() {
    let mut list = PageList::new(5, 10, None).unwrap();
    let mut tracked = Vec::new();
    for (x, ch) in "01234".chars().enumerate() {
        write_char(&mut list, PointTag::Active, x as u32, 5, ch);
        let pin = list.pin(TaggedPoint::new(PointTag::Active, x as u32, 5)).unwrap();
        tracked.push((ch, list.track_pin(pin)));
    }

    list.resize(ResizeRequest {
        cols: Some(4),
        rows: None,
        reflow: true,
        cursor: Some(Cursor { x: 2, y: 5 }),
    })
    .unwrap();

    for (ch, handle) in tracked {
        let pin = list.pin_at(handle);
        let got = list.get_cell_at_pin(pin).unwrap().codepoint();
        assert_eq!(got, ch as u32, "pin tracking {ch:?} must still point at that character after reflow");
    }
}

// S4: erasing a row cascades content up across a page boundary.
#[test]
fn s4_erase_row_cascades_across_page_boundary() {
    // Two full standard pages: force a small page capacity via a narrow
    // column count stays standard-capacity-shaped for this engine, so we
    // instead build up two pages by growing well past one page's rows.
    let mut list = PageList::new(80, 24, None).unwrap();
    list.grow_by(215).unwrap(); // forces a second standard page to exist
    assert!(list.page_count() >= 2, "test setup expects at least two pages");

    let first_page_rows = {
        // Identify the first row of the *second* page by scanning page
        // boundaries through the row iterator's chunking.
        let chunks: Vec<_> = list
            .page_iterator(
                termstore::pagelist::iter::Direction::RightDown,
                TaggedPoint::new(PointTag::Screen, 0, 0),
                None,
            )
            .collect();
        chunks[0].row_end
    };

    let second_page_top = termstore::pagelist::TaggedPoint::new(PointTag::Screen, 0, first_page_rows);
    let pin = list.pin(second_page_top).unwrap();
    write_char(&mut list, PointTag::Screen, 0, first_page_rows, 'Z');
    let handle = list.track_pin(pin);

    list.erase_row(TaggedPoint::new(PointTag::Screen, 0, first_page_rows)).unwrap();

    // The erased row's slot pulled content from below; the tracked pin
    // follows wherever the cascade last wrote content.
    let moved = list.pin_at(handle);
    assert_ne!(moved, pin, "pin must have been remapped by the cascade");
}

// S5: scroll_clear pushes exactly the non-empty prefix of the active
// area into scrollback.
#[test]
fn s5_scroll_clear_pushes_nonblank_prefix_into_scrollback() {
    let mut list = PageList::new(10, 5, None).unwrap();
    write_char(&mut list, PointTag::Active, 0, 0, 'A');
    write_char(&mut list, PointTag::Active, 0, 1, 'A');

    list.scroll_clear().unwrap();

    // Trailing blanks below the two written rows (rows 2-4 of the
    // original 5-row active area) get folded into growth, so the active
    // window — and the viewport, which tracks it by default — slides
    // down by exactly that many rows.
    let top = list.pin(TaggedPoint::new(PointTag::Viewport, 0, 0)).unwrap();
    let top_abs = list.pin_to_absolute_row(top).unwrap();
    assert_eq!(top_abs, 3);

    assert_eq!(read_char(&list, PointTag::Screen, 0, 0), 'A' as u32);
    assert_eq!(read_char(&list, PointTag::Screen, 0, 1), 'A' as u32);
}

// S6: adjusting a page's style capacity upward preserves every cell's
// content unchanged.
#[test]
fn s6_adjust_capacity_preserves_cell_content() {
    let mut list = PageList::new(2, 2, None).unwrap();
    for y in 0..2 {
        for x in 0..2 {
            write_char(&mut list, PointTag::Active, x, y, 'x');
        }
    }
    let top_left = list.pin(TaggedPoint::new(PointTag::Active, 0, 0)).unwrap();
    let page_id = top_left.page;

    list.adjust_capacity(page_id, Some(256), None).unwrap();

    assert_eq!(list.page_count(), 1);
    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(read_char(&list, PointTag::Active, x, y), 'x' as u32);
        }
    }
}

#[test]
fn scroll_with_no_scrollback_stays_pinned_to_active() {
    let mut list = PageList::new(80, 24, None).unwrap();
    list.scroll(ScrollBehavior::DeltaRow(-1_000_000));
    assert_eq!(list.viewport(), termstore::Viewport::Active);
}
