//! Tests for `AtomicFlag`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use weakptr::AtomicFlag;

#[test]
fn test_starts_unset() {
    let flag = AtomicFlag::new();
    assert!(!flag.is_set());
    assert!(!AtomicFlag::default().is_set());
}

#[test]
fn test_set_is_idempotent() {
    let flag = AtomicFlag::new();
    flag.set();
    assert!(flag.is_set());
    flag.set();
    assert!(flag.is_set());
}

#[test]
fn test_reset_for_testing() {
    let flag = AtomicFlag::new();
    flag.set();
    flag.unsafe_reset_for_testing();
    assert!(!flag.is_set());
    flag.set();
    assert!(flag.is_set());
}

#[test]
fn test_read_from_other_thread() {
    let flag = Arc::new(AtomicFlag::new());
    flag.set();

    let observed = thread::spawn({
        let flag = Arc::clone(&flag);
        move || flag.is_set()
    })
    .join()
    .unwrap();
    assert!(observed);
}

#[test]
fn test_set_on_other_thread_is_observed() {
    let flag = Arc::new(AtomicFlag::new());

    let setter = thread::spawn({
        let flag = Arc::clone(&flag);
        move || flag.set()
    });

    let deadline = Instant::now() + Duration::from_secs(10);
    while !flag.is_set() {
        assert!(Instant::now() < deadline, "set() never became visible");
        thread::yield_now();
    }
    setter.join().unwrap();
}

/// Data written before `set()` is visible to a thread that observes the flag.
#[test]
fn test_set_publishes_prior_writes() {
    let flag = Arc::new(AtomicFlag::new());
    let data = Arc::new(AtomicUsize::new(0));

    let reader = thread::spawn({
        let flag = Arc::clone(&flag);
        let data = Arc::clone(&data);
        move || {
            while !flag.is_set() {
                std::hint::spin_loop();
            }
            data.load(Ordering::Relaxed)
        }
    });

    data.store(1234, Ordering::Relaxed);
    flag.set();
    assert_eq!(reader.join().unwrap(), 1234);
}

#[test]
#[cfg(any(debug_assertions, feature = "dcheck-always-on"))]
fn test_set_from_two_threads_panics() {
    let flag = Arc::new(AtomicFlag::new());
    flag.set();

    let result = thread::spawn({
        let flag = Arc::clone(&flag);
        move || flag.set()
    })
    .join();
    assert!(result.is_err(), "set() from a second thread must panic");
}
