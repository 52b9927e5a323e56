//! Integration tests for fixed-window admission control.
//!
//! Tests cover:
//! - Window counting and reset
//! - Retry-after computation
//! - Per-client isolation
//! - Concurrent admission
//! - Background reaping

use std::sync::Arc;
use std::time::Duration;

use feedgate_core::ratelimit::{ClientKey, FixedWindowLimiter, RateLimitConfig};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn limiter(limit: u64, window_secs: u64) -> FixedWindowLimiter {
    FixedWindowLimiter::with_limits(limit, Duration::from_secs(window_secs)).unwrap()
}

// ============================================================================
// Window Behaviour
// ============================================================================

#[test]
fn test_five_per_five_seconds() {
    let limiter = limiter(5, 5);
    let c1 = ClientKey::from("c1");
    let t0 = Instant::now();

    for i in 0..5 {
        let decision = limiter.allow_at(&c1, t0);
        assert!(decision.allowed, "request {} should be allowed", i + 1);
        assert_eq!(decision.retry_after, Duration::ZERO);
    }

    let denied = limiter.allow_at(&c1, t0 + Duration::from_secs(1));
    assert!(!denied.allowed);
    assert_eq!(denied.retry_after, Duration::from_secs(4));
    assert_eq!(denied.remaining, 0);

    let reset = limiter.allow_at(&c1, t0 + Duration::from_secs(6));
    assert!(reset.allowed);
    assert_eq!(reset.remaining, 4);
}

#[test]
fn test_window_boundary_is_exclusive() {
    let limiter = limiter(1, 5);
    let key = ClientKey::from("edge");
    let t0 = Instant::now();

    assert!(limiter.allow_at(&key, t0).allowed);
    assert!(!limiter.allow_at(&key, t0 + Duration::from_millis(4_999)).allowed);
    assert!(limiter.allow_at(&key, t0 + Duration::from_secs(5)).allowed);
}

#[test]
fn test_clients_are_isolated() {
    let limiter = limiter(2, 10);
    let t0 = Instant::now();
    let a = ClientKey::from("10.0.0.1");
    let b = ClientKey::from("10.0.0.2");

    assert!(limiter.allow_at(&a, t0).allowed);
    assert!(limiter.allow_at(&a, t0).allowed);
    assert!(!limiter.allow_at(&a, t0).allowed);

    assert!(limiter.allow_at(&b, t0).allowed);
    assert_eq!(limiter.tracked_clients(), 2);
}

#[test]
fn test_zero_limit_denies_everything() {
    let limiter = limiter(0, 5);
    let decision = limiter.allow(&ClientKey::from("anyone"));

    assert!(!decision.allowed);
    assert_eq!(decision.retry_after, Duration::from_secs(5));
}

#[test]
fn test_disabled_limiter_admits_everything() {
    let config = RateLimitConfig::builder()
        .enabled(false)
        .limit(1)
        .window(Duration::from_secs(60))
        .build();
    let limiter = FixedWindowLimiter::new(config).unwrap();
    let key = ClientKey::from("c");

    for _ in 0..100 {
        assert!(limiter.allow(&key).allowed);
    }
    assert_eq!(limiter.tracked_clients(), 0);
}

#[test]
fn test_zero_window_is_rejected() {
    assert!(FixedWindowLimiter::with_limits(5, Duration::ZERO).is_err());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_never_exceed_limit() {
    let limiter = Arc::new(limiter(50, 60));
    let mut handles = Vec::new();

    for _ in 0..8 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            let key = ClientKey::from("shared");
            (0..25).filter(|_| limiter.allow(&key).allowed).count()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        admitted += handle.await.unwrap();
    }
    assert_eq!(admitted, 50);
}

// ============================================================================
// Reaper
// ============================================================================

#[test]
fn test_sweep_removes_only_closed_windows() {
    let limiter = limiter(3, 5);
    let t0 = Instant::now();

    limiter.allow_at(&ClientKey::from("old"), t0);
    limiter.allow_at(&ClientKey::from("new"), t0 + Duration::from_secs(4));

    assert_eq!(limiter.sweep_expired_at(t0 + Duration::from_secs(6)), 1);
    assert_eq!(limiter.tracked_clients(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reaper_sweeps_and_stops_on_cancel() {
    let config = RateLimitConfig::builder()
        .limit(5)
        .window(Duration::from_secs(5))
        .sweep_interval(Duration::from_secs(1))
        .build();
    let limiter = Arc::new(FixedWindowLimiter::new(config).unwrap());
    let shutdown = CancellationToken::new();
    let reaper = limiter.spawn_reaper(shutdown.clone());

    limiter.allow(&ClientKey::from("idle"));
    assert_eq!(limiter.tracked_clients(), 1);

    tokio::time::sleep(Duration::from_millis(6_500)).await;
    assert_eq!(limiter.tracked_clients(), 0);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), reaper)
        .await
        .expect("reaper should stop after cancellation")
        .unwrap();
}
