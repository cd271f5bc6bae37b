//! Architectural context save and restore.
//!
//! Each TCB embeds an [`InterruptFrame`]: the full register image an
//! `iretq` needs to resume the thread. [`switch_frames`] stores the current
//! thread's continuation (callee-visible registers, segments, flags, and
//! the caller's return address as the resume point) into the outgoing frame
//! and tail-jumps into [`restore_frame`], which reloads the successor's
//! image and `iretq`s into it. A thread resumes exactly where its own last
//! `switch_frames` call would have returned, or at the entry trampoline if
//! it has never run.
//!
//! Both routines are naked leaves: no prologue, no stack protector, no
//! probes, no compiler-inserted anything. The frame layout below is what
//! the instruction sequences index with hard offsets; the `offset_of`
//! assertions keep the two in lockstep. Between the first store and the
//! `iretq` there is no usable stack, so nothing else may run here;
//! interrupts are off for the whole window (asserted by the scheduler
//! before it calls in).
//!
//! Segment selectors are not hard-coded: the boot path captures the ones
//! the CPU is running with, so the same code runs ring 0 on the real
//! machine and ring 3 under a host test process.

use crate::arch::Selectors;
use crate::mm::PGSIZE;
use core::arch::naked_asm;
use spin::Once;

/// Saved register image, restored by `iretq`.
///
/// Layout is load-bearing: `restore_frame` pops fields in declaration
/// order, and the trailing five form the hardware `iretq` frame. The two
/// vector fields are unused by the switch path but keep the layout
/// identical to the external interrupt stubs' frame.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct InterruptFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub es: u16,
    _pad_es: [u16; 3],
    pub ds: u16,
    _pad_ds: [u16; 3],
    pub vec_no: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u16,
    _pad_cs: [u16; 3],
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u16,
    _pad_ss: [u16; 3],
}

const _: () = assert!(core::mem::size_of::<InterruptFrame>() == 0xc0);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, rsi) == 0x40);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, rax) == 0x70);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, es) == 0x78);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, ds) == 0x80);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, rip) == 0x98);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, cs) == 0xa0);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, rflags) == 0xa8);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, rsp) == 0xb0);
const _: () = assert!(core::mem::offset_of!(InterruptFrame, ss) == 0xb8);

static BOOT_SELECTORS: Once<Selectors> = Once::new();

/// Capture the selectors new thread frames will be stamped with. Called
/// once from `scheduler::init`, before any thread can be created.
pub(crate) fn capture_boot_selectors() {
    BOOT_SELECTORS.call_once(Selectors::capture);
}

impl InterruptFrame {
    pub(crate) fn zeroed() -> Self {
        // All-zero is a valid (never-restored) image; the first switch away
        // from a thread overwrites it completely.
        unsafe { core::mem::zeroed() }
    }

    /// Build the initial image for a thread that has never run: entry
    /// trampoline in `rip`, its argument in the first argument register,
    /// a full empty stack, and interrupts enabled in the saved flags.
    pub(crate) fn for_new_thread(entry: u64, arg: u64, page_base: usize) -> Self {
        let sel = BOOT_SELECTORS
            .get()
            .expect("thread system not initialized");
        let mut frame = Self::zeroed();
        frame.rip = entry;
        frame.rdi = arg;
        frame.cs = sel.cs;
        frame.ds = sel.ds;
        frame.es = sel.es;
        frame.ss = sel.ss;
        frame.rflags = crate::arch::x86_64::NEW_THREAD_RFLAGS;
        // Top of the page, minus a zeroed slot where a return address would
        // sit; the trampoline never returns through it.
        frame.rsp = (page_base + PGSIZE - 8) as u64;
        frame
    }
}

/// Save the current continuation into `cur` and resume `next`.
///
/// "Returns" when some later scheduler pass restores `cur`: control
/// reappears at this call site with every register, callee- and
/// caller-saved alike, holding its pre-call value.
///
/// # Safety
/// Interrupts must be off. `cur` and `next` must be frames embedded in
/// live TCBs; `next` must be a valid image (a prior save, or
/// [`InterruptFrame::for_new_thread`]).
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_frames(
    _cur: *mut InterruptFrame,
    _next: *const InterruptFrame,
) {
    naked_asm!(
        // rdi = outgoing frame, rsi = incoming frame.
        "mov [rdi + 0x00], r15",
        "mov [rdi + 0x08], r14",
        "mov [rdi + 0x10], r13",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r11",
        "mov [rdi + 0x28], r10",
        "mov [rdi + 0x30], r9",
        "mov [rdi + 0x38], r8",
        "mov [rdi + 0x40], rsi",
        "mov [rdi + 0x48], rdi",
        "mov [rdi + 0x50], rbp",
        "mov [rdi + 0x58], rdx",
        "mov [rdi + 0x60], rcx",
        "mov [rdi + 0x68], rbx",
        "mov [rdi + 0x70], rax",
        "mov word ptr [rdi + 0x78], es",
        "mov word ptr [rdi + 0x80], ds",
        // The resume point is this call's own return: reappear in the
        // caller as if switch_frames had returned normally.
        "mov rax, [rsp]",
        "mov [rdi + 0x98], rax",
        "mov word ptr [rdi + 0xa0], cs",
        "pushfq",
        "pop qword ptr [rdi + 0xa8]",
        "lea rax, [rsp + 8]",
        "mov [rdi + 0xb0], rax",
        "mov word ptr [rdi + 0xb8], ss",
        // Launch the successor.
        "mov rdi, rsi",
        "jmp {restore}",
        restore = sym restore_frame,
    )
}

/// Load a saved register image and `iretq` into it. The incoming frame is
/// walked with `rsp` itself, so from the first `pop` until the `iretq` the
/// routine runs on the frame, not on any stack.
///
/// # Safety
/// Interrupts must be off and `frame` must be a valid image.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn restore_frame(_frame: *const InterruptFrame) -> ! {
    naked_asm!(
        "mov rsp, rdi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rsi",
        "pop rdi",
        "pop rbp",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        "mov es, word ptr [rsp]",
        "mov ds, word ptr [rsp + 8]",
        // Skip es/ds (with padding) and the two vector slots; rsp then
        // points at the rip/cs/rflags/rsp/ss tail iretq consumes.
        "add rsp, 0x20",
        "iretq",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_matches_restore_offsets() {
        // The asm indexes the frame with immediates; these mirror the
        // compile-time assertions so a layout slip fails loudly here too.
        assert_eq!(core::mem::size_of::<InterruptFrame>(), 0xc0);
        assert_eq!(core::mem::offset_of!(InterruptFrame, r15), 0x00);
        assert_eq!(core::mem::offset_of!(InterruptFrame, rdi), 0x48);
        assert_eq!(core::mem::offset_of!(InterruptFrame, vec_no), 0x88);
        assert_eq!(core::mem::offset_of!(InterruptFrame, error_code), 0x90);
        assert_eq!(core::mem::offset_of!(InterruptFrame, rip), 0x98);
    }

    #[test]
    fn new_thread_frame_has_interrupts_enabled() {
        capture_boot_selectors();
        let page = crate::mm::alloc_page().unwrap();
        let frame = InterruptFrame::for_new_thread(0x1000, 0xdead, page.as_ptr() as usize);
        assert_eq!(frame.rflags & 0x200, 0x200);
        assert_eq!(frame.rip, 0x1000);
        assert_eq!(frame.rdi, 0xdead);
        assert_eq!(frame.rsp as usize, page.as_ptr() as usize + PGSIZE - 8);
        unsafe { crate::mm::free_page(page) };
    }
}
