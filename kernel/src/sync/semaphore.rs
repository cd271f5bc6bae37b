//! Counting semaphore.

use crate::interrupt;
use crate::scheduler::priority;
use crate::scheduler::thread::{self, ThreadRef};
use alloc::vec::Vec;
use core::cell::UnsafeCell;

/// A counting semaphore: a non-negative value with atomic down (wait for
/// positive, decrement) and up (increment, wake one waiter).
///
/// Interior state is only touched with interrupts off on the single CPU,
/// which is the mutual exclusion discipline of the whole thread core; the
/// `Sync` impl encodes that invariant, not lock-freedom.
pub struct Semaphore {
    value: UnsafeCell<usize>,
    waiters: UnsafeCell<Vec<ThreadRef>>,
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub const fn new(value: usize) -> Self {
        Self {
            value: UnsafeCell::new(value),
            waiters: UnsafeCell::new(Vec::new()),
        }
    }

    /// Wait until the value is positive, then decrement it. May block, so
    /// it is forbidden in an external handler. Calling it with interrupts
    /// off is fine; they are restored on return.
    pub fn down(&self) {
        assert!(!interrupt::is_external_handler());
        let old = interrupt::disable();
        unsafe {
            while *self.value.get() == 0 {
                (*self.waiters.get()).push(thread::current_thread());
                thread::block_current();
            }
            *self.value.get() -= 1;
        }
        interrupt::set_level(old);
    }

    /// Decrement the value if it is positive, without waiting.
    pub fn try_down(&self) -> bool {
        let old = interrupt::disable();
        let got = unsafe {
            let value = self.value.get();
            if *value > 0 {
                *value -= 1;
                true
            } else {
                false
            }
        };
        interrupt::set_level(old);
        got
    }

    /// Increment the value and wake the highest-priority waiter, if any.
    /// Safe from an external handler (the preemption check is skipped
    /// there; the deferred yield covers it).
    pub fn up(&self) {
        let old = interrupt::disable();
        unsafe {
            let waiters = &mut *self.waiters.get();
            if !waiters.is_empty() {
                // Priorities may have shifted (donation) since the waiters
                // queued; order is established at wake time.
                waiters.sort_by(|a, b| b.get().priority.cmp(&a.get().priority));
                let first = waiters.remove(0);
                thread::unblock(first);
            }
            *self.value.get() += 1;
        }
        if !interrupt::is_external_handler() {
            priority::preempt_if_outranked();
        }
        interrupt::set_level(old);
    }

    /// Current value. Racy the instant it returns; useful for assertions
    /// and diagnostics only.
    pub fn value(&self) -> usize {
        let old = interrupt::disable();
        let v = unsafe { *self.value.get() };
        interrupt::set_level(old);
        v
    }

    /// Highest waiter priority, for condvar wake ordering.
    pub(crate) fn top_waiter_priority(&self) -> Option<u8> {
        unsafe {
            (*self.waiters.get())
                .iter()
                .map(|t| t.get().priority)
                .max()
        }
    }
}
