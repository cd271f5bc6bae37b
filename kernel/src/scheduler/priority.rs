//! Priority API and the donation engine.
//!
//! Effective priority is always `max(init_priority, donors)`. Donation
//! happens when a thread is about to block on a held lock: the waiter
//! boosts the holder, and transitively the holder's holder, so a
//! high-priority thread is never stalled behind a low-priority lock owner
//! scheduled out by someone in between. Release retracts the donations
//! tied to that lock and recomputes from what remains.

use super::core as sched;
use super::state::Status;
use super::thread::{self, ThreadRef, PRI_MAX};
use crate::interrupt;
use crate::sync::Lock;
use core::ptr::NonNull;

/// Donation chain hop limit. Deep enough that anything past it has no
/// practical value, and it keeps a cyclic wait (a locking bug) from
/// hanging the scheduler.
pub const DONATION_MAX_DEPTH: usize = 8;

/// Set the current thread's base priority and apply the consequences:
/// recompute the effective value (donations may still dominate) and yield
/// if the ready queue front now outranks us.
pub fn set_priority(new_priority: u8) {
    assert!(new_priority <= PRI_MAX);
    let old = interrupt::disable();
    let cur = sched::current();
    cur.get().init_priority = new_priority;
    refresh(cur);
    interrupt::set_level(old);
    preempt_if_outranked();
}

/// Effective priority of the current thread.
pub fn get_priority() -> u8 {
    sched::current().get().priority
}

/// Recompute the current thread's effective priority after an event that
/// may have lowered its claim (own priority set, lock released).
pub(crate) fn refresh_current() {
    refresh(sched::current());
}

fn refresh(t: ThreadRef) {
    let thread = t.get();
    thread.priority = thread.init_priority;
    if thread.donations.is_empty() {
        return;
    }
    thread
        .donations
        .sort_by(|a, b| b.get().priority.cmp(&a.get().priority));
    let top = thread.donations[0].get().priority;
    if top > thread.priority {
        thread.priority = top;
    }
}

/// Walk the wait chain from the current thread, raising every lock holder
/// on it to our effective priority. Runs with interrupts off, from
/// `Lock::acquire` just before the caller blocks.
pub(crate) fn donate() {
    let cur = sched::current();
    let priority = cur.get().priority;

    let mut t = cur;
    for _ in 0..DONATION_MAX_DEPTH {
        let Some(lock) = t.get().wait_on_lock else {
            break;
        };
        let Some(holder) = unsafe { lock.as_ref() }.holder() else {
            break;
        };
        if holder.get().priority < priority {
            log::trace!(
                "donating priority {} to {:?} (was {})",
                priority,
                holder,
                holder.get().priority
            );
            holder.get().priority = priority;
            // A boosted thread sitting on the ready queue must move up.
            if holder.get().status == Status::Ready {
                sched::READY.lock().reposition(holder);
            }
        }
        t = holder;
    }
}

/// Drop every donation made to the current thread by waiters of `lock`.
/// Runs on release, before the holder recomputes its priority.
pub(crate) fn retract_for_lock(lock: &Lock) {
    let lock_ptr = NonNull::from(lock);
    sched::current()
        .get()
        .donations
        .retain(|donor| donor.get().wait_on_lock != Some(lock_ptr));
}

/// Yield if the front of the ready queue outranks the running thread.
/// Every priority mutation funnels through here, which is what keeps the
/// highest-priority-runs invariant without re-sorting on each change.
/// Must not be called from an external handler (the deferred yield is the
/// handler-side equivalent).
pub fn preempt_if_outranked() {
    let old = interrupt::disable();
    let front = sched::READY.lock().front_priority();
    let outranked = match front {
        Some(front) => front > sched::current().get().priority,
        None => false,
    };
    interrupt::set_level(old);
    if outranked {
        thread::yield_now();
    }
}
