//! Page allocation boundary for the thread subsystem.
//!
//! Every thread owns exactly one page: the TCB sits at the low end and the
//! kernel stack occupies the rest, growing down toward it. Pages come from
//! the global allocator, zeroed and `PGSIZE`-aligned, and are returned by
//! the scheduler after the owning thread has died.

use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

/// Size and alignment of a thread page.
///
/// 16 KiB keeps the one-page TCB-plus-stack design while leaving kernel
/// threads headroom for debug-build call frames and formatting.
pub const PGSIZE: usize = 0x4000;

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static FREED: AtomicU64 = AtomicU64::new(0);

fn page_layout() -> Layout {
    // PGSIZE is a power of two, so the layout is always valid.
    unsafe { Layout::from_size_align_unchecked(PGSIZE, PGSIZE) }
}

/// Allocate one zeroed page, or `None` when memory is exhausted.
pub fn alloc_page() -> Option<NonNull<u8>> {
    let page = NonNull::new(unsafe { alloc_zeroed(page_layout()) });
    if page.is_some() {
        ALLOCATED.fetch_add(1, Ordering::Relaxed);
    }
    page
}

/// Return a page previously handed out by [`alloc_page`].
///
/// # Safety
/// `page` must originate from [`alloc_page`] and must not be referenced
/// afterwards.
pub unsafe fn free_page(page: NonNull<u8>) {
    dealloc(page.as_ptr(), page_layout());
    FREED.fetch_add(1, Ordering::Relaxed);
}

/// Round an address within a page down to the page base.
pub fn page_round_down(addr: usize) -> usize {
    addr & !(PGSIZE - 1)
}

/// Page accounting snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    pub allocated: u64,
    pub freed: u64,
}

impl PageStats {
    /// Pages currently outstanding.
    pub fn live(&self) -> u64 {
        self.allocated - self.freed
    }
}

/// Current allocation counters.
pub fn stats() -> PageStats {
    PageStats {
        allocated: ALLOCATED.load(Ordering::Relaxed),
        freed: FREED.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_aligned_zeroed_and_counted() {
        let before = stats();
        let page = alloc_page().expect("host allocator should not fail");
        assert_eq!(page.as_ptr() as usize % PGSIZE, 0);

        let bytes = unsafe { core::slice::from_raw_parts(page.as_ptr(), PGSIZE) };
        assert!(bytes.iter().all(|&b| b == 0));
        assert_eq!(
            page_round_down(page.as_ptr() as usize + PGSIZE / 2),
            page.as_ptr() as usize
        );

        unsafe { free_page(page) };
        // Other tests in this binary allocate concurrently; only monotonic
        // movement of the counters can be asserted here.
        let after = stats();
        assert!(after.allocated > before.allocated);
        assert!(after.freed > before.freed);
    }

    #[test]
    fn live_is_allocated_minus_freed() {
        let s = PageStats {
            allocated: 5,
            freed: 2,
        };
        assert_eq!(s.live(), 3);
    }
}
