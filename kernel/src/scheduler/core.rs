//! Scheduler core: successor selection, context-switch driving, reaping.
//!
//! Entry contract for [`do_schedule`]: interrupts off, the current thread
//! still marked `Running` (its post-switch status is the argument), and no
//! lock held that the successor might want: every queue guard here is
//! scoped to a single statement and dropped before the switch.
//!
//! The global queues and singletons are initialized exactly once during
//! [`super::init`], before interrupts are ever enabled, and never torn
//! down.

use super::ready::ReadyQueue;
use super::sleep::{self, SleepQueue};
use super::state::Status;
use super::switch;
use super::thread::{Thread, ThreadRef};
use crate::interrupt::{self, Level};
use crate::mm;
use alloc::collections::VecDeque;
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};
use spin::Mutex;

/// Ticks a thread may run before the tick handler forces a yield.
pub const TIME_SLICE: u32 = 4;

/// Runnable threads, highest effective priority first.
pub(crate) static READY: Mutex<ReadyQueue> = Mutex::new(ReadyQueue::new());
/// Threads waiting on a wakeup tick.
pub(crate) static SLEEPERS: Mutex<SleepQueue> = Mutex::new(SleepQueue::new());
/// Pages of dead threads, reaped at the start of the next scheduler pass.
static DESTRUCTION: Mutex<VecDeque<ThreadRef>> = Mutex::new(VecDeque::new());

static CURRENT: AtomicPtr<Thread> = AtomicPtr::new(ptr::null_mut());
static INITIAL: AtomicPtr<Thread> = AtomicPtr::new(ptr::null_mut());
static IDLE: AtomicPtr<Thread> = AtomicPtr::new(ptr::null_mut());

/// Ticks since the running thread was given the CPU.
static SLICE_TICKS: AtomicU32 = AtomicU32::new(0);

static IDLE_TICKS: AtomicU64 = AtomicU64::new(0);
static KERNEL_TICKS: AtomicU64 = AtomicU64::new(0);
static USER_TICKS: AtomicU64 = AtomicU64::new(0);
static SPAWNS: AtomicU64 = AtomicU64::new(0);
static SWITCHES: AtomicU64 = AtomicU64::new(0);

/// The running thread. Tracked in a CPU-local pointer; the page layout
/// would also allow deriving it from the stack pointer, but the pointer
/// works identically on a hosted build whose boot stack the kernel does
/// not control.
pub(crate) fn current() -> ThreadRef {
    let t = ThreadRef::from_raw(CURRENT.load(Ordering::Relaxed))
        .expect("thread system not initialized");
    debug_assert_eq!(t.get().status, Status::Running);
    t
}

pub(crate) fn initial() -> Option<ThreadRef> {
    ThreadRef::from_raw(INITIAL.load(Ordering::Relaxed))
}

pub(crate) fn idle_thread() -> Option<ThreadRef> {
    ThreadRef::from_raw(IDLE.load(Ordering::Relaxed))
}

pub(crate) fn is_idle(t: ThreadRef) -> bool {
    idle_thread() == Some(t)
}

/// Install the boot thread. Called once from `init` with interrupts off.
pub(crate) fn adopt_initial(t: ThreadRef) {
    assert_eq!(interrupt::get_level(), Level::Off);
    assert!(INITIAL.load(Ordering::Relaxed).is_null());
    t.get().status = Status::Running;
    INITIAL.store(t.as_ptr(), Ordering::Relaxed);
    CURRENT.store(t.as_ptr(), Ordering::Relaxed);
}

/// Register the idle singleton; the idle thread itself calls this the
/// first time it is scheduled.
pub(crate) fn register_idle(t: ThreadRef) {
    IDLE.store(t.as_ptr(), Ordering::Relaxed);
}

pub(crate) fn count_spawn() {
    SPAWNS.fetch_add(1, Ordering::Relaxed);
}

/// Free every page on the destruction queue. Runs on the next thread's
/// stack, never the victim's.
fn reap_destruction() {
    loop {
        let victim = DESTRUCTION.lock().pop_front();
        let Some(victim) = victim else { break };
        log::trace!("reaping {:?}", victim);
        let page = victim.as_ptr();
        unsafe {
            ptr::drop_in_place(page);
            mm::free_page(ptr::NonNull::new_unchecked(page.cast()));
        }
    }
}

/// Pick the successor: front of the ready queue, or the idle thread when
/// nothing is runnable.
fn next_thread_to_run() -> ThreadRef {
    READY
        .lock()
        .pop_front()
        .or_else(idle_thread)
        .expect("no runnable thread and no idle thread")
}

/// Record the current thread's post-switch status and hand the CPU to the
/// next one. Interrupts must be off; the current thread must still be
/// `Running`.
pub(crate) fn do_schedule(status: Status) {
    assert_eq!(interrupt::get_level(), Level::Off);
    let cur = current();
    assert_eq!(cur.get().status, Status::Running);
    debug_assert!(Status::Running.may_transition_to(status));
    reap_destruction();
    cur.get().status = status;
    schedule(cur);
}

fn schedule(cur: ThreadRef) {
    assert_eq!(interrupt::get_level(), Level::Off);
    debug_assert_ne!(cur.get().status, Status::Running);

    let next = next_thread_to_run();
    next.get().status = Status::Running;
    SLICE_TICKS.store(0, Ordering::Relaxed);
    CURRENT.store(next.as_ptr(), Ordering::Relaxed);

    if cur != next {
        // The dying thread still occupies its stack; queue the page and let
        // the next scheduler pass free it. The boot thread is exempt.
        if cur.get().status == Status::Dying && Some(cur) != initial() {
            DESTRUCTION.lock().push_back(cur);
        }
        SWITCHES.fetch_add(1, Ordering::Relaxed);
        unsafe {
            switch::switch_frames(&mut cur.get().frame, &next.get().frame);
        }
        // Control returns here when `cur` is next scheduled.
    }
}

/// Timer tick handler. Runs in external interrupt context: counts the
/// tick against its category, wakes due sleepers, and at the end of the
/// slice asks for a yield on interrupt return; it never switches itself.
pub(crate) fn tick(now: i64) {
    debug_assert!(interrupt::is_external_handler());
    let cur = current();
    if is_idle(cur) {
        IDLE_TICKS.fetch_add(1, Ordering::Relaxed);
    } else {
        // A build with user processes would classify by address space here.
        KERNEL_TICKS.fetch_add(1, Ordering::Relaxed);
    }

    sleep::awake(now);

    if SLICE_TICKS.fetch_add(1, Ordering::Relaxed) + 1 >= TIME_SLICE {
        interrupt::yield_on_return();
    }
}

/// Snapshot of scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub idle_ticks: u64,
    pub kernel_ticks: u64,
    pub user_ticks: u64,
    pub spawns: u64,
    pub context_switches: u64,
}

pub(crate) fn stats() -> SchedulerStats {
    SchedulerStats {
        idle_ticks: IDLE_TICKS.load(Ordering::Relaxed),
        kernel_ticks: KERNEL_TICKS.load(Ordering::Relaxed),
        user_ticks: USER_TICKS.load(Ordering::Relaxed),
        spawns: SPAWNS.load(Ordering::Relaxed),
        context_switches: SWITCHES.load(Ordering::Relaxed),
    }
}
