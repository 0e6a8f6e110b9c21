//! OS-backed, page-aligned, zero-initialized memory.
//!
//! [`PageBuffer`] owns one anonymous private mapping sized to a whole
//! multiple of the OS page size (spec.md §3, §4.2 `init`/`deinit`). It is
//! the crate's one piece of genuinely unsafe raw memory handling; every
//! other module only ever reads/writes through [`Page`](crate::page::Page),
//! which turns this buffer's bytes into typed rows/cells/arenas via
//! [`crate::offset::Offset`]. Generalizes the teacher's page-aligned,
//! `#[repr(C, align(4096))]` `PageBuffer` (`buffer/page_cache.rs`) from a
//! fixed 4 KiB direct-I/O buffer to an arbitrarily-sized, mmap-backed one.

use std::ptr::NonNull;

#[cfg(unix)]
mod os {
    use std::ptr::NonNull;

    pub fn os_page_size() -> usize {
        // SAFETY: sysconf with this argument never fails on a real system.
        unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
    }

    /// # Safety
    /// `len` must be > 0.
    pub unsafe fn map(len: usize) -> Option<NonNull<u8>> {
        let ptr = libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        );
        if ptr == libc::MAP_FAILED {
            None
        } else {
            NonNull::new(ptr as *mut u8)
        }
    }

    /// # Safety
    /// `ptr`/`len` must be the exact mapping returned by [`map`].
    pub unsafe fn unmap(ptr: NonNull<u8>, len: usize) {
        libc::munmap(ptr.as_ptr() as *mut libc::c_void, len);
    }
}

#[cfg(windows)]
mod os {
    use std::ptr::NonNull;
    use windows_sys::Win32::System::Memory::{
        VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
    };

    pub fn os_page_size() -> usize {
        use windows_sys::Win32::System::SystemInformation::GetSystemInfo;
        unsafe {
            let mut info = std::mem::zeroed();
            GetSystemInfo(&mut info);
            info.dwPageSize as usize
        }
    }

    /// # Safety
    /// `len` must be > 0.
    pub unsafe fn map(len: usize) -> Option<NonNull<u8>> {
        let ptr = VirtualAlloc(
            std::ptr::null_mut(),
            len,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_READWRITE,
        );
        NonNull::new(ptr as *mut u8)
    }

    /// # Safety
    /// `ptr` must be the exact mapping returned by [`map`].
    pub unsafe fn unmap(ptr: NonNull<u8>, _len: usize) {
        VirtualFree(ptr.as_ptr() as *mut _, 0, MEM_RELEASE);
    }
}

/// The OS's native page size, in bytes (typically 4096).
pub fn os_page_size() -> usize {
    os::os_page_size()
}

/// Round `n` up to the next whole multiple of the OS page size.
pub fn round_up_to_os_page(n: usize) -> usize {
    let page = os_page_size();
    n.div_ceil(page) * page
}

/// A single anonymous, zero-initialized, page-aligned memory mapping.
///
/// Owns exactly one OS allocation for its whole lifetime: there is no
/// resize-in-place. Growing a page's capacity means allocating a new,
/// larger `PageBuffer` and copying into it ([`crate::page::Page::clone_into`]).
pub struct PageBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: PageBuffer is a plain owned allocation with no interior
// aliasing; the engine's own single-threaded-cooperative contract (spec.md
// §5) means it is never accessed from two threads at once, but the type
// itself has no thread-affinity.
unsafe impl Send for PageBuffer {}

impl PageBuffer {
    /// Allocate a zero-initialized buffer of exactly `len` bytes. `len`
    /// should already be a multiple of [`os_page_size`] (callers compute
    /// this via [`round_up_to_os_page`] in `Layout::compute`); mapping a
    /// non-multiple length still succeeds but wastes the rounding the OS
    /// does internally anyway.
    pub fn new(len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        // SAFETY: len > 0, checked above.
        let ptr = unsafe { os::map(len) }?;
        Some(Self { ptr, len })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr/len describe exactly this mapping, alive for &self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr/len describe exactly this mapping, exclusive via &mut self.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Zero the entire buffer in place (used when a page is reinitialized
    /// rather than freed, e.g. prune-on-grow and single-page erase,
    /// spec.md §4.3, §4.4).
    pub fn zero(&mut self) {
        // SAFETY: writing zeros over the owned mapping is always valid.
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr(), 0, self.len);
        }
    }

    /// Duplicate this buffer's bytes into a freshly allocated mapping of
    /// the same length.
    pub fn duplicate(&self) -> Option<Self> {
        let mut other = PageBuffer::new(self.len)?;
        other.as_mut_slice().copy_from_slice(self.as_slice());
        Some(other)
    }
}

impl Drop for PageBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr/len are exactly what `os::map` returned in `new`.
        unsafe {
            os::unmap(self.ptr, self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_zeroed() {
        let buf = PageBuffer::new(os_page_size()).unwrap();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_after_writes_clears_buffer() {
        let mut buf = PageBuffer::new(os_page_size()).unwrap();
        buf.as_mut_slice()[0] = 0xFF;
        buf.zero();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn duplicate_copies_contents_independently() {
        let mut buf = PageBuffer::new(os_page_size()).unwrap();
        buf.as_mut_slice()[10] = 42;
        let mut dup = buf.duplicate().unwrap();
        assert_eq!(dup.as_slice()[10], 42);
        dup.as_mut_slice()[10] = 7;
        assert_eq!(buf.as_slice()[10], 42, "duplicate must not alias the original");
    }

    #[test]
    fn round_up_matches_multiples() {
        let page = os_page_size();
        assert_eq!(round_up_to_os_page(1), page);
        assert_eq!(round_up_to_os_page(page), page);
        assert_eq!(round_up_to_os_page(page + 1), 2 * page);
    }
}
