//! x86-64 instruction leaves.
//!
//! Everything here is a thin wrapper over single instructions. The hardware
//! interrupt mask is only touched on bare metal (`target_os = "none"`); on a
//! hosted build the software level in [`crate::interrupt`] stands alone and
//! the timer is virtual.

use core::arch::asm;

/// RFLAGS image installed into the saved frame of every newly created
/// thread: interrupt-enable plus the always-one reserved bit.
pub const NEW_THREAD_RFLAGS: u64 =
    ::x86_64::registers::rflags::RFlags::INTERRUPT_FLAG.bits() | 0x2;

/// Segment selectors the kernel is executing on.
///
/// The switch path restores `ds`/`es` and `iretq` reloads `cs`/`ss`, so the
/// values stamped into new thread frames must be the ones the CPU is already
/// running with. Capturing them at boot keeps the frame layout identical on
/// bare metal (kernel selectors) and under a host test process (the host's
/// user selectors).
#[derive(Debug, Clone, Copy)]
pub struct Selectors {
    pub cs: u16,
    pub ds: u16,
    pub es: u16,
    pub ss: u16,
}

impl Selectors {
    /// Read the live segment registers.
    pub fn capture() -> Self {
        let (cs, ds, es, ss): (u16, u16, u16, u16);
        unsafe {
            asm!(
                "mov {0:x}, cs",
                "mov {1:x}, ds",
                "mov {2:x}, es",
                "mov {3:x}, ss",
                out(reg) cs,
                out(reg) ds,
                out(reg) es,
                out(reg) ss,
                options(nomem, nostack, preserves_flags),
            );
        }
        Selectors { cs, ds, es, ss }
    }
}

/// Mask maskable interrupts.
#[inline]
pub fn mask_interrupts() {
    #[cfg(target_os = "none")]
    ::x86_64::instructions::interrupts::disable();
}

/// Unmask maskable interrupts.
#[inline]
pub fn unmask_interrupts() {
    #[cfg(target_os = "none")]
    ::x86_64::instructions::interrupts::enable();
}

/// Atomically unmask interrupts and wait for the next one.
///
/// `sti` holds interrupts off until the instruction after it has executed,
/// so the halt cannot lose a wakeup that arrives in between. Bare metal
/// only; the caller keeps the software level in sync.
#[cfg(target_os = "none")]
pub fn unmask_and_halt() {
    unsafe {
        asm!("sti", "hlt", options(nomem, nostack));
    }
}
