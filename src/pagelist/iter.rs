//! Page/row/cell iterators over tagged-point ranges (spec.md §4.7).
//!
//! New: the teacher iterates buffer-pool frames with a plain `Vec`
//! iterator since nothing there is chunked by page boundary. Grounded on
//! the chunk-yielding shape described in spec.md §4.7 itself rather than
//! any teacher file — each chunk is `(page, row_range)`, collapsing whole
//! pages into one chunk and splitting only the first/last partial chunk.

use crate::pagelist::{PageId, PageList, TaggedPoint};

/// Iteration direction over the page chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    RightDown,
    LeftUp,
}

/// A contiguous run of rows within a single page, yielded by
/// [`PageIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub page: PageId,
    pub row_start: u32,
    /// Exclusive.
    pub row_end: u32,
}

/// Not restartable (spec.md §4.7): holds the absolute row bounds plus a
/// cursor, walked once.
pub struct PageIterator<'a> {
    list: &'a PageList,
    dir: Direction,
    next_abs: i64,
    last_abs: i64,
    done: bool,
}

impl<'a> PageIterator<'a> {
    pub fn new(list: &'a PageList, dir: Direction, top_left: TaggedPoint, bottom_right: Option<TaggedPoint>) -> Self {
        let top_abs = list.point_to_absolute(top_left) as i64;
        let total = list.total_rows();
        let bot_abs = bottom_right
            .map(|p| list.point_to_absolute(p) as i64)
            .unwrap_or(total.saturating_sub(1) as i64);
        let (start, end) = match dir {
            Direction::RightDown => (top_abs, bot_abs),
            Direction::LeftUp => (bot_abs, top_abs),
        };
        Self { list, dir, next_abs: start, last_abs: end, done: total == 0 }
    }
}

impl<'a> Iterator for PageIterator<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }
        let abs = self.next_abs;
        if abs < 0 {
            self.done = true;
            return None;
        }
        let (page_idx, row) = self.list.absolute_to_page_row(abs as u32)?;
        let page_rows = self.list.page_rows_at(page_idx);
        let page_id = self.list.page_id_at(page_idx);

        match self.dir {
            Direction::RightDown => {
                let chunk_end_abs = abs + (page_rows - row) as i64 - 1;
                let clamped_end = chunk_end_abs.min(self.last_abs);
                let row_end = row + (clamped_end - abs) as u32 + 1;
                self.done = clamped_end >= self.last_abs;
                self.next_abs = clamped_end + 1;
                Some(Chunk { page: page_id, row_start: row, row_end })
            }
            Direction::LeftUp => {
                let chunk_start_abs = abs - row as i64;
                let clamped_start = chunk_start_abs.max(self.last_abs);
                let row_start = row - (abs - clamped_start) as u32;
                self.done = clamped_start <= self.last_abs;
                self.next_abs = clamped_start - 1;
                Some(Chunk { page: page_id, row_start, row_end: row + 1 })
            }
        }
    }
}

/// One pin per live row within the chunk stream.
pub struct RowIterator<'a> {
    list: &'a PageList,
    chunks: PageIterator<'a>,
    current: Option<Chunk>,
    cursor: u32,
    dir: Direction,
}

impl<'a> RowIterator<'a> {
    pub fn new(list: &'a PageList, dir: Direction, top_left: TaggedPoint, bottom_right: Option<TaggedPoint>) -> Self {
        let mut chunks = PageIterator::new(list, dir, top_left, bottom_right);
        let current = chunks.next();
        let cursor = match (dir, current) {
            (Direction::RightDown, Some(c)) => c.row_start,
            (Direction::LeftUp, Some(c)) => c.row_end - 1,
            _ => 0,
        };
        Self { list, chunks, current, cursor, dir }
    }
}

impl<'a> Iterator for RowIterator<'a> {
    type Item = crate::pagelist::pin::Pin;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.current?;
        let pin = crate::pagelist::pin::Pin::new(chunk.page, self.cursor, 0);

        match self.dir {
            Direction::RightDown => {
                if self.cursor + 1 < chunk.row_end {
                    self.cursor += 1;
                } else {
                    self.current = self.chunks.next();
                    if let Some(next) = self.current {
                        self.cursor = next.row_start;
                    }
                }
            }
            Direction::LeftUp => {
                if self.cursor > chunk.row_start {
                    self.cursor -= 1;
                } else {
                    self.current = self.chunks.next();
                    if let Some(next) = self.current {
                        self.cursor = next.row_end - 1;
                    }
                }
            }
        }
        let _ = self.list;
        Some(pin)
    }
}

/// Walks cells within a row, wrapping to the next row at column
/// boundaries.
pub struct CellIterator<'a> {
    rows: RowIterator<'a>,
    cols: u32,
    current_row: Option<crate::pagelist::pin::Pin>,
    x: u32,
    dir: Direction,
}

impl<'a> CellIterator<'a> {
    pub fn new(list: &'a PageList, dir: Direction, top_left: TaggedPoint, bottom_right: Option<TaggedPoint>) -> Self {
        let cols = list.cols();
        let mut rows = RowIterator::new(list, dir, top_left, bottom_right);
        let current_row = rows.next();
        let x = match (dir, current_row) {
            (Direction::RightDown, Some(_)) => 0,
            (Direction::LeftUp, Some(_)) => cols.saturating_sub(1),
            _ => 0,
        };
        Self { rows, cols, current_row, x, dir }
    }
}

impl<'a> Iterator for CellIterator<'a> {
    type Item = crate::pagelist::pin::Pin;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.current_row?;
        let pin = crate::pagelist::pin::Pin::new(row.page, row.y, self.x);

        match self.dir {
            Direction::RightDown => {
                if self.x + 1 < self.cols {
                    self.x += 1;
                } else {
                    self.current_row = self.rows.next();
                    self.x = 0;
                }
            }
            Direction::LeftUp => {
                if self.x > 0 {
                    self.x -= 1;
                } else {
                    self.current_row = self.rows.next();
                    self.x = self.cols.saturating_sub(1);
                }
            }
        }
        Some(pin)
    }
}

impl PageList {
    pub fn page_iterator(&self, dir: Direction, top_left: TaggedPoint, bottom_right: Option<TaggedPoint>) -> PageIterator<'_> {
        PageIterator::new(self, dir, top_left, bottom_right)
    }

    pub fn row_iterator(&self, dir: Direction, top_left: TaggedPoint, bottom_right: Option<TaggedPoint>) -> RowIterator<'_> {
        RowIterator::new(self, dir, top_left, bottom_right)
    }

    pub fn cell_iterator(&self, dir: Direction, top_left: TaggedPoint, bottom_right: Option<TaggedPoint>) -> CellIterator<'_> {
        CellIterator::new(self, dir, top_left, bottom_right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagelist::PointTag;

    #[test]
    fn page_iterator_collapses_single_page_to_one_chunk() {
        let list = PageList::new(8, 4, None).unwrap();
        let chunks: Vec<_> = list
            .page_iterator(Direction::RightDown, TaggedPoint::new(PointTag::Active, 0, 0), None)
            .collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].row_start, 0);
        assert_eq!(chunks[0].row_end, 4);
    }

    #[test]
    fn row_iterator_yields_one_pin_per_row() {
        let list = PageList::new(8, 4, None).unwrap();
        let pins: Vec<_> = list
            .row_iterator(Direction::RightDown, TaggedPoint::new(PointTag::Active, 0, 0), None)
            .collect();
        assert_eq!(pins.len(), 4);
        assert_eq!(pins[0].y, 0);
        assert_eq!(pins[3].y, 3);
    }

    #[test]
    fn cell_iterator_walks_full_row_then_wraps() {
        let list = PageList::new(4, 2, None).unwrap();
        let cells: Vec<_> = list
            .cell_iterator(Direction::RightDown, TaggedPoint::new(PointTag::Active, 0, 0), None)
            .collect();
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[0].x, 0);
        assert_eq!(cells[3].x, 3);
        assert_eq!(cells[4].y, 1);
    }
}
