//! Sleeping lock with priority donation.
//!
//! A binary semaphore plus an owner, and the holder/waiter contract the
//! donation engine is built on: a thread about to block on a held lock
//! records itself in the holder's donations set and boosts the wait chain;
//! the releasing thread retracts exactly the donations tied to this lock
//! and recomputes its own priority from what is left.

use crate::interrupt;
use crate::scheduler::priority;
use crate::scheduler::thread::{self, ThreadRef};
use crate::sync::Semaphore;
use core::cell::UnsafeCell;
use core::ptr::NonNull;

pub struct Lock {
    holder: UnsafeCell<Option<ThreadRef>>,
    sema: Semaphore,
}

unsafe impl Send for Lock {}
unsafe impl Sync for Lock {}

impl Lock {
    pub const fn new() -> Self {
        Self {
            holder: UnsafeCell::new(None),
            sema: Semaphore::new(1),
        }
    }

    /// Acquire the lock, sleeping until it is free. Not recursive, and
    /// forbidden in an external handler.
    pub fn acquire(&self) {
        assert!(!interrupt::is_external_handler());
        assert!(!self.held_by_current());

        let old = interrupt::disable();
        if let Some(holder) = self.holder() {
            // Blocking behind someone: register as a donor and boost the
            // chain before going down.
            let cur = thread::current_thread();
            cur.get().wait_on_lock = Some(NonNull::from(self));
            holder.get().donations.push(cur);
            priority::donate();
        }
        self.sema.down();
        let cur = thread::current_thread();
        cur.get().wait_on_lock = None;
        unsafe { *self.holder.get() = Some(cur) };
        interrupt::set_level(old);
    }

    /// Take the lock only if it is free right now.
    pub fn try_acquire(&self) -> bool {
        let old = interrupt::disable();
        let got = self.sema.try_down();
        if got {
            unsafe { *self.holder.get() = Some(thread::current_thread()) };
        }
        interrupt::set_level(old);
        got
    }

    /// Release the lock. Donations received through it are retracted, the
    /// releasing thread's priority drops back to what the rest justifies,
    /// and the highest-priority waiter is woken, which preempts us on the
    /// spot if it now outranks us.
    pub fn release(&self) {
        assert!(self.held_by_current());

        let old = interrupt::disable();
        priority::retract_for_lock(self);
        priority::refresh_current();
        unsafe { *self.holder.get() = None };
        self.sema.up();
        interrupt::set_level(old);
    }

    /// Whether the calling thread holds this lock.
    pub fn held_by_current(&self) -> bool {
        let old = interrupt::disable();
        let held = self.holder() == Some(thread::current_thread());
        interrupt::set_level(old);
        held
    }

    pub(crate) fn holder(&self) -> Option<ThreadRef> {
        unsafe { *self.holder.get() }
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}
