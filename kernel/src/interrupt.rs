//! Interrupt level management.
//!
//! The interrupt mask is the only synchronization primitive the thread core
//! relies on: every queue mutation, status transition, and donation walk
//! runs with interrupts disabled. The level is tracked in a software flag
//! that is authoritative on every build; bare metal additionally toggles the
//! hardware mask so the flag and the CPU never disagree.
//!
//! External interrupt handlers run with the level off and the context flag
//! set. A handler must never switch threads itself: it arms the deferred
//! yield with [`yield_on_return`], and the return path honors it once the
//! handler has unwound.

use crate::arch;
use core::sync::atomic::{AtomicBool, Ordering};

/// Interrupt state of the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Maskable interrupts are deliverable.
    On,
    /// Maskable interrupts are held off.
    Off,
}

/// Software copy of the interrupt-enable flag. Boot starts with interrupts
/// off; `scheduler::start` is what first turns them on.
static ENABLED: AtomicBool = AtomicBool::new(false);

/// Set while an external interrupt handler is running.
static IN_EXTERNAL: AtomicBool = AtomicBool::new(false);

/// Deferred-yield latch armed by the tick handler at slice expiry.
static YIELD_PENDING: AtomicBool = AtomicBool::new(false);

/// Current interrupt level.
pub fn get_level() -> Level {
    if ENABLED.load(Ordering::Relaxed) {
        Level::On
    } else {
        Level::Off
    }
}

/// Disable interrupts and return the previous level.
pub fn disable() -> Level {
    let prev = get_level();
    arch::x86_64::mask_interrupts();
    ENABLED.store(false, Ordering::Relaxed);
    prev
}

/// Enable interrupts and return the previous level.
///
/// Must not be called from an external handler: the handler's return path
/// owns re-enabling.
pub fn enable() -> Level {
    assert!(!is_external_handler());
    let prev = get_level();
    ENABLED.store(true, Ordering::Relaxed);
    arch::x86_64::unmask_interrupts();
    prev
}

/// Restore a level previously returned by [`disable`] or [`enable`].
pub fn set_level(level: Level) -> Level {
    match level {
        Level::On => enable(),
        Level::Off => disable(),
    }
}

/// True while an external interrupt handler is executing.
pub fn is_external_handler() -> bool {
    IN_EXTERNAL.load(Ordering::Relaxed)
}

/// Arm a thread switch to happen when the current external handler returns.
/// Only meaningful inside one.
pub fn yield_on_return() {
    assert!(is_external_handler());
    YIELD_PENDING.store(true, Ordering::Relaxed);
}

/// Run `handler` as the body of an external interrupt, then honor a pending
/// deferred yield.
///
/// On bare metal the surrounding interrupt stub has already masked delivery;
/// on a hosted build this is the delivery. Either way the handler observes
/// interrupts off and handler context, and any switch it requested happens
/// only after it has fully unwound.
pub(crate) fn external_frame(handler: impl FnOnce()) {
    let prev = disable();
    assert!(!is_external_handler(), "nested external interrupt");
    IN_EXTERNAL.store(true, Ordering::Relaxed);

    handler();

    IN_EXTERNAL.store(false, Ordering::Relaxed);
    let wants_yield = YIELD_PENDING.swap(false, Ordering::Relaxed);
    set_level(prev);
    if wants_yield {
        crate::scheduler::thread::yield_now();
    }
}

/// Re-enable interrupts and idle until the next one arrives.
///
/// Bare metal executes the atomic `sti; hlt` pair; a hosted build delivers
/// the next virtual timer tick instead, which is what the wait amounts to
/// when the timer is the only interrupt source.
pub(crate) fn enable_and_wait() {
    #[cfg(target_os = "none")]
    {
        ENABLED.store(true, Ordering::Relaxed);
        arch::x86_64::unmask_and_halt();
    }
    #[cfg(not(target_os = "none"))]
    {
        enable();
        crate::timer::interrupt();
    }
}
