//! Boot command line options.
//!
//! The loader hands the kernel a single option string. The thread core
//! recognizes `-o mlfqs`, which selects the multi-level feedback queue
//! policy in builds that carry it; this kernel records the flag and keeps
//! the strict-priority scheduler.

use spin::Once;

/// Parsed boot options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelOptions {
    /// `-o mlfqs` was present on the command line.
    pub mlfqs: bool,
}

static OPTIONS: Once<KernelOptions> = Once::new();

/// Parse a kernel command line.
///
/// Unknown `-o` arguments are ignored by the thread core; they belong to
/// other subsystems.
pub fn parse(cmdline: &str) -> KernelOptions {
    let mut opts = KernelOptions::default();
    let mut args = cmdline.split_whitespace();
    while let Some(arg) = args.next() {
        if arg == "-o" {
            if let Some("mlfqs") = args.next() {
                opts.mlfqs = true;
            }
        }
    }
    opts
}

/// Record the boot options. Effective once; later calls keep the first value.
pub fn set(opts: KernelOptions) -> &'static KernelOptions {
    OPTIONS.call_once(|| opts)
}

/// Options the kernel booted with, or defaults before [`set`].
pub fn get() -> KernelOptions {
    OPTIONS.get().copied().unwrap_or_default()
}
