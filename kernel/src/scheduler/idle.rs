//! The idle thread.
//!
//! A single thread at `PRI_MIN`, chosen by the scheduler only when the
//! ready queue is empty and never placed back on it. Its whole job is to
//! park the CPU cheaply until an interrupt makes someone else runnable.

use super::core as sched;
use super::thread;
use crate::interrupt;
use crate::sync::Semaphore;

/// Boot handshake: `start` waits on this until the idle thread has been
/// scheduled once and registered itself.
static IDLE_STARTED: Semaphore = Semaphore::new(0);

pub(crate) fn wait_started() {
    IDLE_STARTED.down();
}

/// Body of the idle thread.
///
/// Each turn: block (which invokes the scheduler), and once the scheduler
/// hands the CPU back for lack of anything better, atomically re-enable
/// interrupts and wait for the next one. The enable-and-wait pair must be
/// atomic: an interrupt slipping in between would be absorbed with the
/// CPU already committed to halting, wasting up to a full tick.
pub(crate) fn idle_loop() -> ! {
    let me = sched::current();
    sched::register_idle(me);
    log::debug!("idle thread up (tid {})", me.tid());
    IDLE_STARTED.up();

    loop {
        interrupt::disable();
        thread::block_current();
        interrupt::enable_and_wait();
    }
}
