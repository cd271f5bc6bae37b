//! The thread scheduler.
//!
//! Strict-priority, single CPU, preemptive: the highest-priority ready
//! thread always runs, FIFO among equals, with a four-tick time slice
//! enforced by the timer interrupt and priority donation keeping lock
//! holders from stalling their waiters.

mod core;
pub mod error;
mod idle;
pub mod priority;
mod ready;
mod sleep;
pub mod state;
pub mod switch;
pub mod thread;

pub use self::core::{SchedulerStats, TIME_SLICE};

use crate::interrupt::{self, Level};
use crate::options::{self, KernelOptions};
use ::core::sync::atomic::{AtomicBool, Ordering};
use self::thread::{PRI_DEFAULT, PRI_MIN};

static BOOTED: AtomicBool = AtomicBool::new(false);

/// Initialize the thread system by adopting the running boot code as the
/// first thread ("main", `PRI_DEFAULT`).
///
/// Must run with interrupts off, before any other scheduler call, and
/// exactly once. The page allocator must already be serving.
pub fn init(opts: &KernelOptions) {
    assert_eq!(interrupt::get_level(), Level::Off);
    assert!(
        !BOOTED.swap(true, Ordering::Relaxed),
        "thread system initialized twice"
    );
    options::set(*opts);
    if opts.mlfqs {
        log::info!("-o mlfqs requested; this build carries the strict-priority scheduler");
    }

    switch::capture_boot_selectors();
    let main = thread::bootstrap_initial("main", PRI_DEFAULT);
    log::info!("thread system ready; boot thread is tid {}", main.tid());
}

/// Start preemptive scheduling: create the idle thread, enable interrupts,
/// and wait for idle to come up.
pub fn start() {
    thread::spawn("idle", PRI_MIN, || idle::idle_loop())
        .expect("no page for the idle thread");
    interrupt::enable();
    idle::wait_started();
    log::info!("preemptive scheduling started");
}

/// Timer tick entry, called from the timer interrupt body.
pub(crate) fn tick(now: i64) {
    self::core::tick(now);
}

/// Scheduler counter snapshot.
pub fn stats() -> SchedulerStats {
    self::core::stats()
}

/// Log the tick accounting, the shutdown-time counterpart of the boot
/// banner.
pub fn print_stats() {
    let s = stats();
    log::info!(
        "thread: {} idle ticks, {} kernel ticks, {} user ticks, {} spawns, {} switches",
        s.idle_ticks,
        s.kernel_ticks,
        s.user_ticks,
        s.spawns,
        s.context_switches,
    );
}
