//! Timed sleep scenarios. The tests play the timer device, delivering
//! ticks by calling the interrupt body directly.

mod common;

use common::{kernel, record, settle, take_records};
use filament_kernel::thread::{self, PRI_DEFAULT};
use filament_kernel::{scheduler, timer};

#[test]
fn sleepers_wake_in_deadline_order_at_exact_ticks() {
    let _k = kernel();
    let start = timer::ticks();

    for (name, delay) in [("b", 10i64), ("a", 20), ("c", 30)] {
        thread::spawn(name, PRI_DEFAULT, move || {
            thread::sleep_until(start + delay);
            record(format!("{} at +{}", name, timer::ticks() - start));
        })
        .unwrap();
    }
    // Let all three reach their beds before the clock moves.
    thread::yield_now();
    assert!(take_records().is_empty());

    // Tick past the last deadline, yielding after each tick so a thread
    // woken at tick T runs (and reads the clock) at tick T.
    while timer::ticks() - start <= 31 {
        timer::interrupt();
        thread::yield_now();
    }

    assert_eq!(
        take_records(),
        vec!["b at +10", "a at +20", "c at +30"]
    );
    settle();
}

#[test]
fn sleep_does_not_wake_early() {
    let _k = kernel();
    let start = timer::ticks();
    static WOKE: filament_kernel::Semaphore = filament_kernel::Semaphore::new(0);

    thread::spawn("sleeper", PRI_DEFAULT + 1, move || {
        thread::sleep_until(start + 5);
        WOKE.up();
    })
    .unwrap();

    for n in 1..=4 {
        timer::interrupt();
        thread::yield_now();
        assert!(!WOKE.try_down(), "woke after only {} ticks", n);
    }
    timer::interrupt();
    thread::yield_now();
    assert!(WOKE.try_down(), "did not wake at its deadline");
    settle();
}

#[test]
fn relative_sleep_rides_the_idle_clock() {
    // With everyone asleep, the idle thread is what keeps time moving.
    let _k = kernel();
    let start = timer::ticks();
    timer::sleep(5);
    assert!(timer::elapsed(start) >= 5);
    settle();
}

#[test]
fn ticks_are_accounted_to_the_running_thread() {
    let _k = kernel();
    let before = scheduler::stats();
    for _ in 0..3 {
        timer::interrupt();
    }
    let after = scheduler::stats();
    // We were running while those ticks arrived.
    assert!(after.kernel_ticks >= before.kernel_ticks + 3);
    settle();
}

#[test]
fn zero_and_negative_sleep_return_immediately() {
    let _k = kernel();
    let tid = thread::current_tid();
    timer::sleep(0);
    timer::sleep(-3);
    assert_eq!(thread::current_tid(), tid);
    settle();
}
