//! The sleep queue.
//!
//! An unordered set of blocked threads, each carrying the absolute tick at
//! which it becomes eligible again. The tick handler scans it linearly
//! (sleeper counts at kernel scale do not justify anything cleverer) and
//! unblocks everything that has come due.

use super::thread::{self, ThreadRef};
use alloc::vec::Vec;

pub(crate) struct SleepQueue {
    sleepers: Vec<ThreadRef>,
}

impl SleepQueue {
    pub(crate) const fn new() -> Self {
        Self {
            sleepers: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, t: ThreadRef) {
        self.sleepers.push(t);
    }

    /// Remove every thread with `wakeup_tick <= now` and hand the batch to
    /// the caller for unblocking.
    fn take_due(&mut self, now: i64) -> Vec<ThreadRef> {
        let mut due = Vec::new();
        self.sleepers.retain(|t| {
            if t.get().wakeup_tick <= now {
                due.push(*t);
                false
            } else {
                true
            }
        });
        due
    }
}

/// Wake every sleeper whose deadline has arrived. Runs from the tick
/// handler with interrupts off; the sleep queue lock is released before
/// the ready queue is touched.
pub(crate) fn awake(now: i64) {
    let due = super::core::SLEEPERS.lock().take_due(now);
    for t in due {
        log::trace!("tick {}: waking {}", now, t.get().tid);
        thread::unblock(t);
    }
}
