// tests/lock_wait.rs

//! The lock guard waits with 1-second granularity and fails hard at the
//! configured bound.

use fs2::FileExt;
use pvemirror::{Error, LockGuard};
use std::fs::File;
use std::time::{Duration, Instant};

#[test]
fn unheld_lock_is_ready_immediately() {
    let temp = tempfile::tempdir().unwrap();
    let guard = LockGuard::new(vec![temp.path().join("lock")], 300);

    let start = Instant::now();
    guard.wait().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn held_lock_times_out_at_the_bound() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("lock");
    let holder = File::create(&path).unwrap();
    holder.lock_exclusive().unwrap();

    let guard = LockGuard::new(vec![path], 2);
    let start = Instant::now();
    let err = guard.wait().unwrap_err();

    assert!(matches!(err, Error::LockTimeout { seconds: 2 }));
    // never before the bound; the 1s poll allows a little overshoot
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(4));
}
