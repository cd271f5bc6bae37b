//! Shared harness for whole-kernel scenarios.
//!
//! The thread system is a process-wide singleton, so each integration
//! binary boots exactly one kernel and runs its scenarios one at a time:
//! every test takes the serial guard before touching scheduler state, and
//! leaves the system quiesced (all spawned threads exited) on the way out.

#![allow(dead_code)] // each test binary uses its own subset of the harness

use std::sync::{Mutex, MutexGuard, Once, OnceLock};

static BOOT: Once = Once::new();

fn serial() -> &'static Mutex<()> {
    static SERIAL: OnceLock<Mutex<()>> = OnceLock::new();
    SERIAL.get_or_init(|| Mutex::new(()))
}

/// Boot the kernel on first use and serialize the calling test.
pub fn kernel() -> MutexGuard<'static, ()> {
    let guard = serial().lock().unwrap_or_else(|e| e.into_inner());
    BOOT.call_once(|| {
        let opts = filament_kernel::options::parse("");
        filament_kernel::scheduler::init(&opts);
        filament_kernel::scheduler::start();
    });
    take_records();
    guard
}

/// Observation log shared between the scenario's threads. Entries are
/// pushed without any suspension point under the lock, so green threads
/// cannot deadlock on it.
fn records() -> &'static Mutex<Vec<String>> {
    static RECORDS: OnceLock<Mutex<Vec<String>>> = OnceLock::new();
    RECORDS.get_or_init(|| Mutex::new(Vec::new()))
}

pub fn record(entry: impl Into<String>) {
    records().lock().unwrap().push(entry.into());
}

pub fn take_records() -> Vec<String> {
    std::mem::take(&mut *records().lock().unwrap())
}

/// Yield a few times so dying threads from this (or an earlier) scenario
/// get reaped and the ready queue drains.
pub fn settle() {
    for _ in 0..3 {
        filament_kernel::thread::yield_now();
    }
}
