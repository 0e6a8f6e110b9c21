//! Free-list pool for standard-capacity pages.
//!
//! Generalizes the teacher's `memory/allocator.rs` `MemoryPool` (a free list
//! of fixed-size, `NonNull<u8>` blocks handed out and returned without
//! reinitializing the OS mapping each time) from raw bytes to whole
//! [`Page`]s, and drops its atomics — this engine is single-threaded
//! cooperative (spec.md §5).
//!
//! Only standard-capacity pages (spec.md §3) are pooled. Oversize pages
//! (from `adjust_capacity`) are always allocated from and returned directly
//! to the OS, since a free list sized for one unusual capacity would not
//! help any other page.

use crate::error::{PageError, PageResult};
use crate::page::layout::Capacity;
use crate::page::Page;

/// Recycles standard-capacity [`Page`]s instead of remapping/unmapping OS
/// memory on every grow/prune/erase cycle.
pub struct PagePool {
    free: Vec<Page>,
    max_free: usize,
}

impl PagePool {
    /// `max_free` bounds how many spare standard pages are kept zeroed and
    /// ready; beyond that, released pages are simply dropped (unmapped).
    pub fn new(max_free: usize) -> Self {
        Self { free: Vec::new(), max_free }
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Acquire a page at `capacity`. Standard capacity is served from the
    /// free list when available (already zeroed by `release`); anything
    /// else, or an empty pool, allocates fresh from the OS.
    pub fn acquire(&mut self, capacity: Capacity) -> PageResult<Page> {
        if capacity == Capacity::STANDARD {
            if let Some(page) = self.free.pop() {
                return Ok(page);
            }
        }
        Page::init(capacity).map_err(|_| PageError::OutOfMemory)
    }

    /// Return a page for reuse. Zeroes and re-homes it in the free list if
    /// it is standard-capacity and the pool has room; otherwise the page is
    /// dropped, unmapping its OS buffer.
    pub fn release(&mut self, mut page: Page) {
        if page.capacity() == Capacity::STANDARD && self.free.len() < self.max_free {
            page.reinit_in_place();
            self.free.push(page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_without_release_allocates_fresh() {
        let mut pool = PagePool::new(4);
        let page = pool.acquire(Capacity::STANDARD).unwrap();
        assert_eq!(page.capacity(), Capacity::STANDARD);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn released_standard_page_is_reused() {
        let mut pool = PagePool::new(4);
        let page = pool.acquire(Capacity::STANDARD).unwrap();
        pool.release(page);
        assert_eq!(pool.free_count(), 1);
        let reused = pool.acquire(Capacity::STANDARD).unwrap();
        assert_eq!(pool.free_count(), 0);
        assert_eq!(reused.size().rows, 0);
    }

    #[test]
    fn release_beyond_max_free_is_dropped() {
        let mut pool = PagePool::new(1);
        let a = pool.acquire(Capacity::STANDARD).unwrap();
        let b = pool.acquire(Capacity::STANDARD).unwrap();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn oversize_page_is_never_pooled() {
        let mut oversize = Capacity::STANDARD;
        oversize.cols *= 2;
        let mut pool = PagePool::new(4);
        let page = pool.acquire(oversize).unwrap();
        pool.release(page);
        assert_eq!(pool.free_count(), 0);
    }
}
