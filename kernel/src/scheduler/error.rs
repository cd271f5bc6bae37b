//! Scheduler error types.
//!
//! Resource exhaustion is the only recoverable failure the thread core can
//! produce; contract violations (bad state transitions, out-of-range
//! priorities, interrupt-context misuse) are assertions and panic the
//! kernel.

use core::fmt;

/// Errors reported by scheduler operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// The page allocator could not supply a thread page.
    OutOfPages,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::OutOfPages => write!(f, "no page available for a new thread"),
        }
    }
}

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;
