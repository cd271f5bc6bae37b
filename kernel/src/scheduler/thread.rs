//! Thread control blocks and the thread lifecycle API.
//!
//! A thread owns one page: the `Thread` record sits at the page base and
//! the kernel stack fills the rest, growing down toward it. The `magic`
//! canary is the last field of the record, so a stack that grows into the
//! TCB corrupts it first; every handle dereference checks it.
//!
//! ```text
//! page base                                              page end
//! +-----------+--------------------- stack ---------------------+
//! | Thread .. | ...                                  <- grows <- |
//! +-----------+-------------------------------------------------+
//! ```

use super::core as sched;
use super::error::{SchedError, SchedResult};
use super::priority;
use super::state::Status;
use super::switch::InterruptFrame;
use crate::interrupt;
use crate::mm;
use crate::sync::Lock;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

/// Thread identifier. Allocation is monotonic and serialized.
pub type Tid = u64;

/// Lowest priority.
pub const PRI_MIN: u8 = 0;
/// Priority of the boot thread and the default for ordinary threads.
pub const PRI_DEFAULT: u8 = 31;
/// Highest priority.
pub const PRI_MAX: u8 = 63;

/// Canary written into every live TCB; a mismatch means the thread's stack
/// grew into its control block.
pub(crate) const THREAD_MAGIC: u64 = 0xcd6a_bf4b_d42d_f210;

/// Per-thread record, placed at the base of the thread's page.
#[repr(C)]
pub(crate) struct Thread {
    pub(crate) tid: Tid,
    pub(crate) name: Box<str>,
    pub(crate) status: Status,
    /// Effective priority: `max(init_priority, donors)`.
    pub(crate) priority: u8,
    /// Priority last set explicitly; the floor when donations unwind.
    pub(crate) init_priority: u8,
    /// Lock this thread is currently blocked on, if any.
    pub(crate) wait_on_lock: Option<NonNull<Lock>>,
    /// Threads donating their priority to this one (waiters on locks this
    /// thread holds). Sorted only when read.
    pub(crate) donations: Vec<ThreadRef>,
    /// Absolute tick at which a sleeping thread comes due.
    pub(crate) wakeup_tick: i64,
    /// Saved register image; the switch path resumes the thread from it.
    pub(crate) frame: InterruptFrame,
    /// Stack-overflow canary. Keep last: the stack reaches it first.
    pub(crate) magic: u64,
}

impl Thread {
    /// Write a fresh blocked TCB onto its page and hand back the handle.
    fn init_on_page(page: NonNull<u8>, name: &str, priority: u8) -> ThreadRef {
        assert!(priority <= PRI_MAX);
        let tcb = page.cast::<Thread>();
        debug_assert_eq!(tcb.as_ptr() as usize % core::mem::align_of::<Thread>(), 0);
        unsafe {
            tcb.as_ptr().write(Thread {
                tid: 0,
                name: Box::from(name),
                status: Status::Blocked,
                priority,
                init_priority: priority,
                wait_on_lock: None,
                donations: Vec::new(),
                wakeup_tick: 0,
                frame: InterruptFrame::zeroed(),
                magic: THREAD_MAGIC,
            });
        }
        ThreadRef(tcb)
    }

    #[cfg(test)]
    pub(crate) fn leak_dummy(name: &str, priority: u8) -> ThreadRef {
        let page = mm::alloc_page().unwrap();
        Thread::init_on_page(page, name, priority)
    }
}

/// Copyable handle to a TCB.
///
/// TCBs are owned by their pages; handles are relations, not ownership.
/// Dereferencing is only done on the CPU that owns the scheduler state,
/// with interrupts off where the field is mutable, the same single-CPU
/// discipline every queue in this subsystem follows.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ThreadRef(NonNull<Thread>);

unsafe impl Send for ThreadRef {}

impl ThreadRef {
    pub(crate) fn from_raw(ptr: *mut Thread) -> Option<Self> {
        NonNull::new(ptr).map(ThreadRef)
    }

    pub(crate) fn as_ptr(self) -> *mut Thread {
        self.0.as_ptr()
    }

    /// Access the TCB, verifying the canary.
    pub(crate) fn get(self) -> &'static mut Thread {
        let t = unsafe { &mut *self.0.as_ptr() };
        assert_eq!(
            t.magic, THREAD_MAGIC,
            "thread stack overflowed into its control block"
        );
        t
    }

    /// Thread id.
    pub fn tid(self) -> Tid {
        self.get().tid
    }
}

impl core::fmt::Debug for ThreadRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let t = self.get();
        write!(f, "Thread({} \"{}\", {})", t.tid, t.name, t.status)
    }
}

/// Turn the code that is already running into the first thread. Only
/// possible at boot: the caller's stack is not on a thread page, so the
/// boot thread keeps its TCB page forever and is never reaped.
pub(crate) fn bootstrap_initial(name: &str, priority: u8) -> ThreadRef {
    let page = mm::alloc_page().expect("out of pages bootstrapping the thread system");
    let t = Thread::init_on_page(page, name, priority);
    sched::adopt_initial(t);
    t.get().tid = allocate_tid();
    t
}

static NEXT_TID: AtomicU64 = AtomicU64::new(1);
static TID_LOCK: Lock = Lock::new();

/// Next tid, serialized under the global tid lock.
fn allocate_tid() -> Tid {
    TID_LOCK.acquire();
    let tid = NEXT_TID.fetch_add(1, Ordering::Relaxed);
    TID_LOCK.release();
    tid
}

/// Create a kernel thread running `thread_fn` and make it schedulable.
///
/// The new thread may run (and even exit) before `spawn` returns: if its
/// priority beats the caller's, the preemption check at the end yields
/// immediately. Returns [`SchedError::OutOfPages`] when no page is
/// available; no partial state is left behind in that case.
pub fn spawn<F>(name: &str, priority: u8, thread_fn: F) -> SchedResult<Tid>
where
    F: FnOnce() + Send + 'static,
{
    assert!(priority <= PRI_MAX);
    let page = mm::alloc_page().ok_or(SchedError::OutOfPages)?;
    let t = Thread::init_on_page(page, name, priority);

    let arg = Box::into_raw(Box::new(thread_fn));
    t.get().frame = InterruptFrame::for_new_thread(
        thread_entry::<F> as usize as u64,
        arg as usize as u64,
        page.as_ptr() as usize,
    );

    let tid = allocate_tid();
    t.get().tid = tid;
    log::debug!("spawn {} \"{}\" priority {}", tid, name, priority);
    sched::count_spawn();

    unblock(t);
    priority::preempt_if_outranked();
    Ok(tid)
}

/// First code a fresh thread runs, `iretq`-ed into by the scheduler: the
/// scheduler hands over with interrupts off, so enable them, run the
/// thread's closure, and exit when it returns.
extern "C" fn thread_entry<F>(thread_fn: *mut F) -> !
where
    F: FnOnce() + Send + 'static,
{
    interrupt::enable();
    let thread_fn = unsafe { Box::from_raw(thread_fn) };
    thread_fn();
    exit()
}

/// Deschedule and destroy the current thread. The page is reclaimed by the
/// next scheduler pass, not here; this code is still running on it.
pub fn exit() -> ! {
    assert!(!interrupt::is_external_handler());
    log::trace!("thread {} exiting", current_tid());
    interrupt::disable();
    sched::do_schedule(Status::Dying);
    unreachable!("dying thread was rescheduled");
}

/// Block the current thread until [`unblock`]. The caller must already
/// have interrupts off; pairing the state change with whatever condition
/// the caller is recording is its business.
pub fn block_current() {
    assert!(!interrupt::is_external_handler());
    assert_eq!(interrupt::get_level(), interrupt::Level::Off);
    sched::do_schedule(Status::Blocked);
}

/// Make a blocked thread schedulable.
///
/// Does **not** preempt: a caller may unblock several threads atomically
/// and decide afterwards whether to yield (see
/// [`priority::preempt_if_outranked`]).
pub fn unblock(t: ThreadRef) {
    let old = interrupt::disable();
    debug_assert!(t.get().status.may_transition_to(Status::Ready));
    assert_eq!(t.get().status, Status::Blocked);
    sched::READY.lock().insert(t);
    t.get().status = Status::Ready;
    interrupt::set_level(old);
}

/// Give up the CPU; the thread stays runnable and re-enters the ready
/// queue behind its priority peers.
pub fn yield_now() {
    assert!(!interrupt::is_external_handler());
    let old = interrupt::disable();
    let cur = sched::current();
    if !sched::is_idle(cur) {
        sched::READY.lock().insert(cur);
    }
    sched::do_schedule(Status::Ready);
    interrupt::set_level(old);
}

/// Sleep until the timer reaches `wake_tick` (absolute). The idle thread
/// must never sleep; it is what runs while everyone else does.
pub fn sleep_until(wake_tick: i64) {
    let old = interrupt::disable();
    let cur = sched::current();
    assert!(!sched::is_idle(cur));
    cur.get().wakeup_tick = wake_tick;
    sched::SLEEPERS.lock().push(cur);
    block_current();
    interrupt::set_level(old);
}

/// Handle to the running thread.
pub fn current_thread() -> ThreadRef {
    sched::current()
}

/// Tid of the running thread.
pub fn current_tid() -> Tid {
    sched::current().get().tid
}

/// Name of the running thread.
pub fn current_name() -> String {
    String::from(&*sched::current().get().name)
}
