//! Page-local allocators.
//!
//! Everything here operates purely on `u32` byte offsets and slices handed
//! to it by the caller — no module in this crate ever hands these
//! allocators a pointer, because pointers don't survive the `memcpy`-based
//! page relocation described in spec.md §9. See [`crate::offset`] for the
//! typed-offset wrapper these allocators return.

pub mod bitmap;
pub mod offset_map;

pub use bitmap::BitmapAllocator;
pub use offset_map::OffsetHashMap;
