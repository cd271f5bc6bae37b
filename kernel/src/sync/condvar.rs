//! Condition variable.
//!
//! Each waiter parks on a private semaphore pushed onto the condition's
//! list; signal picks the one whose blocked thread ranks highest and ups
//! it. The private semaphore lives on the waiter's stack: it cannot be
//! freed before `wait` returns, and a signaler consumes its entry exactly
//! once with interrupts off, so the reference never dangles.

use crate::interrupt;
use crate::sync::{Lock, Semaphore};
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ptr::NonNull;

pub struct Condvar {
    waiters: UnsafeCell<Vec<NonNull<Semaphore>>>,
}

unsafe impl Send for Condvar {}
unsafe impl Sync for Condvar {}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiters: UnsafeCell::new(Vec::new()),
        }
    }

    /// Atomically release `lock` and wait to be signaled, then reacquire
    /// the lock before returning. The caller must hold `lock`; as with
    /// any sleep, interrupt handlers may not wait.
    pub fn wait(&self, lock: &Lock) {
        assert!(!interrupt::is_external_handler());
        assert!(lock.held_by_current());

        let waiter = Semaphore::new(0);
        let old = interrupt::disable();
        unsafe { (*self.waiters.get()).push(NonNull::from(&waiter)) };
        interrupt::set_level(old);

        lock.release();
        waiter.down();
        lock.acquire();
    }

    /// Wake the highest-priority waiter, if any. The caller must hold the
    /// lock it pairs with; that is what orders the wakeup against the
    /// state change it announces.
    pub fn signal(&self, lock: &Lock) {
        assert!(lock.held_by_current());

        let old = interrupt::disable();
        let picked = {
            let waiters = unsafe { &mut *self.waiters.get() };
            // A waiter that has queued its semaphore but not yet blocked on
            // it ranks lowest; its up is still delivered, never lost.
            let best = waiters
                .iter()
                .enumerate()
                .max_by_key(|(_, s)| {
                    unsafe { s.as_ref() }.top_waiter_priority().unwrap_or(0)
                })
                .map(|(i, _)| i);
            best.map(|i| waiters.remove(i))
        };
        if let Some(sema) = picked {
            unsafe { sema.as_ref() }.up();
        }
        interrupt::set_level(old);
    }

    /// Wake every waiter.
    pub fn broadcast(&self, lock: &Lock) {
        assert!(lock.held_by_current());
        loop {
            let empty = {
                let old = interrupt::disable();
                let empty = unsafe { (*self.waiters.get()).is_empty() };
                interrupt::set_level(old);
                empty
            };
            if empty {
                break;
            }
            self.signal(lock);
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
