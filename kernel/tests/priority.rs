//! Strict-priority scheduling scenarios.

mod common;

use common::{kernel, record, settle, take_records};
use filament_kernel::scheduler::priority::{get_priority, set_priority};
use filament_kernel::thread::{self, PRI_DEFAULT};

#[test]
fn higher_priority_thread_preempts_its_creator() {
    let _k = kernel();
    assert_eq!(get_priority(), PRI_DEFAULT);

    let tid = thread::spawn("preemptor", PRI_DEFAULT + 1, || {
        record("preemptor-ran");
    })
    .unwrap();

    // The new thread outranked us, so it ran to completion before spawn
    // returned; we are back because it exited.
    assert_eq!(take_records(), vec!["preemptor-ran".to_string()]);
    assert_ne!(thread::current_tid(), tid);
    settle();
}

#[test]
fn equal_priorities_run_fifo() {
    let _k = kernel();
    assert_eq!(get_priority(), PRI_DEFAULT);

    for name in ["a", "b", "c"] {
        thread::spawn(name, PRI_DEFAULT, move || record(name)).unwrap();
    }
    // Nobody outranks us, so nothing has run yet.
    assert!(take_records().is_empty());

    thread::yield_now();

    // One yield suffices: each peer runs to exit and the scheduler takes
    // the next in insertion order, with us re-queued behind all of them.
    assert_eq!(take_records(), vec!["a", "b", "c"]);
    settle();
}

#[test]
fn yield_is_idempotent_when_alone() {
    let _k = kernel();
    settle();
    let tid = thread::current_tid();
    thread::yield_now();
    thread::yield_now();
    assert_eq!(thread::current_tid(), tid);
}

#[test]
fn set_priority_updates_and_preempts() {
    let _k = kernel();
    assert_eq!(get_priority(), PRI_DEFAULT);

    thread::spawn("peer", PRI_DEFAULT, || record("peer-ran")).unwrap();
    record("before-drop");
    // Dropping below the ready queue front must yield on the spot.
    set_priority(PRI_DEFAULT - 10);
    record("after-drop");

    assert_eq!(
        take_records(),
        vec!["before-drop", "peer-ran", "after-drop"]
    );
    assert_eq!(get_priority(), PRI_DEFAULT - 10);

    set_priority(PRI_DEFAULT);
    assert_eq!(get_priority(), PRI_DEFAULT);
    settle();
}

#[test]
fn scheduler_always_runs_highest_ready_priority() {
    let _k = kernel();

    static DONE: filament_kernel::Semaphore = filament_kernel::Semaphore::new(0);
    // All below our priority: creation order deliberately scrambled.
    thread::spawn("lo", 10, || {
        record("lo");
        DONE.up();
    })
    .unwrap();
    thread::spawn("hi", 25, || {
        record("hi");
        DONE.up();
    })
    .unwrap();
    thread::spawn("mid", 20, || {
        record("mid");
        DONE.up();
    })
    .unwrap();

    for _ in 0..3 {
        DONE.down();
    }
    assert_eq!(take_records(), vec!["hi", "mid", "lo"]);
    settle();
}
