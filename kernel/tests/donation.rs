//! Priority donation scenarios.

mod common;

use common::{kernel, record, settle, take_records};
use filament_kernel::scheduler::priority::get_priority;
use filament_kernel::thread::{self, PRI_DEFAULT};
use filament_kernel::Lock;

#[test]
fn single_donation_boosts_holder_until_release() {
    let _k = kernel();
    static L: Lock = Lock::new();
    assert_eq!(get_priority(), PRI_DEFAULT);

    L.acquire();
    thread::spawn("high", PRI_DEFAULT + 2, || {
        L.acquire();
        record(format!("high-got-lock at {}", get_priority()));
        L.release();
    })
    .unwrap();

    // "high" preempted us, hit the held lock, and donated before blocking.
    assert_eq!(get_priority(), PRI_DEFAULT + 2);
    assert!(take_records().is_empty());

    L.release();
    // The waiter outranks us the moment the lock moves: it already ran.
    assert_eq!(get_priority(), PRI_DEFAULT);
    assert_eq!(
        take_records(),
        vec![format!("high-got-lock at {}", PRI_DEFAULT + 2)]
    );
    settle();
}

#[test]
fn nested_donation_boosts_the_whole_chain() {
    let _k = kernel();
    static OUTER: Lock = Lock::new();
    static INNER: Lock = Lock::new();
    let mid_priority = PRI_DEFAULT + 2;
    let high_priority = PRI_DEFAULT + 4;
    assert_eq!(get_priority(), PRI_DEFAULT);

    OUTER.acquire();
    thread::spawn("mid", mid_priority, move || {
        INNER.acquire();
        OUTER.acquire(); // blocks behind main, donating down the chain
        record(format!("mid-in-outer at {}", get_priority()));
        OUTER.release();
        INNER.release();
        record("mid-done");
    })
    .unwrap();
    assert_eq!(get_priority(), mid_priority);

    thread::spawn("high", high_priority, move || {
        INNER.acquire(); // blocks behind mid; the boost must reach main
        record(format!("high-in-inner at {}", get_priority()));
        INNER.release();
    })
    .unwrap();
    // Transitive: high -> mid (inner) -> main (outer).
    assert_eq!(get_priority(), high_priority);

    OUTER.release();
    assert_eq!(get_priority(), PRI_DEFAULT);
    assert_eq!(
        take_records(),
        vec![
            format!("mid-in-outer at {}", high_priority),
            format!("high-in-inner at {}", high_priority),
            "mid-done".to_string(),
        ]
    );
    settle();
}

#[test]
fn multiple_donations_unwind_lock_by_lock() {
    let _k = kernel();
    static A: Lock = Lock::new();
    static B: Lock = Lock::new();
    let h1_priority = PRI_DEFAULT + 2;
    let h2_priority = PRI_DEFAULT + 4;
    assert_eq!(get_priority(), PRI_DEFAULT);

    A.acquire();
    B.acquire();

    thread::spawn("h1", h1_priority, || {
        A.acquire();
        record("h1-got-a");
        A.release();
    })
    .unwrap();
    assert_eq!(get_priority(), h1_priority);

    thread::spawn("h2", h2_priority, || {
        B.acquire();
        record("h2-got-b");
        B.release();
    })
    .unwrap();
    assert_eq!(get_priority(), h2_priority);

    // Each release sheds only that lock's donations.
    B.release();
    assert_eq!(get_priority(), h1_priority);
    A.release();
    assert_eq!(get_priority(), PRI_DEFAULT);

    assert_eq!(take_records(), vec!["h2-got-b", "h1-got-a"]);
    settle();
}

#[test]
fn donation_does_not_survive_set_priority_raise() {
    let _k = kernel();
    static L: Lock = Lock::new();
    use filament_kernel::scheduler::priority::set_priority;
    assert_eq!(get_priority(), PRI_DEFAULT);

    L.acquire();
    thread::spawn("donor", PRI_DEFAULT + 2, || {
        L.acquire();
        L.release();
    })
    .unwrap();
    assert_eq!(get_priority(), PRI_DEFAULT + 2);

    // Raising the base above the donation: effective follows the base.
    set_priority(PRI_DEFAULT + 5);
    assert_eq!(get_priority(), PRI_DEFAULT + 5);
    // Lowering it again: the donation is still the floor.
    set_priority(PRI_DEFAULT);
    assert_eq!(get_priority(), PRI_DEFAULT + 2);

    L.release();
    assert_eq!(get_priority(), PRI_DEFAULT);
    settle();
}

#[test]
fn condvar_signal_wakes_highest_priority_waiter() {
    let _k = kernel();
    static L: Lock = Lock::new();
    static C: filament_kernel::Condvar = filament_kernel::Condvar::new();

    for (name, priority) in [("w-low", 20u8), ("w-high", 25u8)] {
        thread::spawn(name, priority, move || {
            L.acquire();
            C.wait(&L);
            record(name);
            L.release();
        })
        .unwrap();
    }
    // Let both park on the condition.
    static GATE: filament_kernel::Semaphore = filament_kernel::Semaphore::new(0);
    thread::spawn("gate", 10, || GATE.up()).unwrap();
    GATE.down();

    L.acquire();
    C.signal(&L);
    L.release();
    L.acquire();
    C.signal(&L);
    L.release();

    static DRAIN: filament_kernel::Semaphore = filament_kernel::Semaphore::new(0);
    thread::spawn("drain", 10, || DRAIN.up()).unwrap();
    DRAIN.down();

    assert_eq!(take_records(), vec!["w-high", "w-low"]);
    settle();
}
