use std::time::Duration;

use crate::WatchPolicy;

fn policy() -> WatchPolicy {
    WatchPolicy {
        buffer_size: 10,
        free_retries: 3,
        delay_step_ms: 100,
        max_delay_ms: 500,
        poll_interval_ms: 50,
    }
}

#[test]
fn test_free_retries_have_no_delay() {
    let policy = policy();
    for retries in 0..=3 {
        assert_eq!(policy.backoff(retries), Duration::ZERO);
    }
}

#[test]
fn test_backoff_grows_with_retry_count() {
    let policy = policy();

    // Jitter adds at most 10% on top of the proportional base.
    let fourth = policy.backoff(4);
    assert!(fourth >= Duration::from_millis(100));
    assert!(fourth <= Duration::from_millis(110));

    let sixth = policy.backoff(6);
    assert!(sixth >= Duration::from_millis(300));
    assert!(sixth <= Duration::from_millis(330));
}

#[test]
fn test_backoff_is_capped() {
    let policy = policy();
    for retries in [8, 50, 10_000] {
        let delay = policy.backoff(retries);
        assert!(delay >= Duration::from_millis(500));
        assert!(delay <= Duration::from_millis(550));
    }
}

#[test]
fn test_poll_interval() {
    assert_eq!(policy().poll_interval(), Duration::from_millis(50));
}

#[test]
fn test_defaults_are_sane() {
    let policy = WatchPolicy::default();
    assert!(policy.buffer_size > 0);
    assert_eq!(policy.backoff(1), Duration::ZERO);
    assert!(policy.backoff(policy.free_retries + 1) > Duration::ZERO);
}
