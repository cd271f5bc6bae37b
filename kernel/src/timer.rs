//! System timer.
//!
//! Counts ticks since boot and drives the scheduler's tick handler. On
//! bare metal the interrupt controller calls [`interrupt`] from the timer
//! vector; a hosted build has no controller, so the idle thread (or a
//! test acting as the timer device) delivers ticks by calling it directly.

use crate::interrupt as intr;
use crate::scheduler;
use core::sync::atomic::{AtomicI64, Ordering};

/// Timer interrupts per second.
pub const TIMER_FREQ: i64 = 100;

static TICKS: AtomicI64 = AtomicI64::new(0);

/// Ticks since boot.
pub fn ticks() -> i64 {
    TICKS.load(Ordering::Relaxed)
}

/// Ticks elapsed since `then` (a value previously returned by [`ticks`]).
pub fn elapsed(then: i64) -> i64 {
    ticks() - then
}

/// Body of the timer interrupt: advance the clock and run the scheduler's
/// tick work inside an external-handler frame. Any preemption the handler
/// requests happens on the way out, never inside.
pub fn interrupt() {
    intr::external_frame(|| {
        let now = TICKS.fetch_add(1, Ordering::Relaxed) + 1;
        scheduler::tick(now);
    });
}

/// Sleep for at least `n` ticks. Must be called with interrupts enabled;
/// with them off the clock cannot advance and the wakeup would never come.
pub fn sleep(n: i64) {
    assert_eq!(intr::get_level(), intr::Level::On);
    if n <= 0 {
        return;
    }
    let start = ticks();
    scheduler::thread::sleep_until(start + n);
}
