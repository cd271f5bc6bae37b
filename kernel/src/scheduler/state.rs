//! Thread lifecycle states.
//!
//! ```text
//!  Blocked --unblock-->  Ready  --schedule-->  Running
//!  Running --block-->    Blocked
//!  Running --yield-->    Ready
//!  Running --exit-->     Dying --(next schedule reaps)--> destroyed
//! ```
//!
//! A thread is born `Blocked`; `unblock` makes it schedulable; only the
//! scheduler moves a thread to `Running`. The `Dying` → destroyed edge is
//! split across two scheduler invocations because a dying thread is still
//! executing on the stack that would be freed.

use core::fmt;

/// Lifecycle state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Schedulable; a member of the ready queue.
    Ready,
    /// Owns the CPU.
    Running,
    /// Waiting on the sleep queue or inside a synchronization primitive.
    Blocked,
    /// Exited; the page is reclaimed by the next scheduler pass.
    Dying,
}

impl Status {
    /// Whether a transition `self` → `to` is part of the lifecycle.
    pub fn may_transition_to(self, to: Status) -> bool {
        matches!(
            (self, to),
            (Status::Blocked, Status::Ready)
                | (Status::Ready, Status::Running)
                | (Status::Running, Status::Ready)
                | (Status::Running, Status::Blocked)
                | (Status::Running, Status::Dying)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ready => "ready",
            Status::Running => "running",
            Status::Blocked => "blocked",
            Status::Dying => "dying",
        };
        f.write_str(name)
    }
}
