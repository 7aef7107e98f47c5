//! Behavior-driven tests for the per-provider circuit breaker
//!
//! These tests verify how a breaker moves between closed, open and
//! half-open, and that half-open admits exactly one probe even when many
//! callers race for it.

use sleuth_core::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use std::sync::Arc;
use std::time::Duration;

fn breaker(threshold: u32, cooldown: Duration) -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new(
        "registry",
        CircuitBreakerConfig {
            failure_threshold: threshold,
            open_timeout: cooldown,
        },
    ))
}

// =============================================================================
// Circuit Breaker: Closed → Open
// =============================================================================

#[test]
fn when_failures_stay_below_threshold_breaker_keeps_dispatching() {
    // Given: A breaker with threshold 3
    let breaker = breaker(3, Duration::from_secs(60));

    // When: Two failures are recorded
    breaker.record_failure();
    breaker.record_failure();

    // Then: It is still closed and counts both failures
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 2);
    assert!(breaker.allows_dispatch());
}

#[test]
fn when_success_interrupts_a_failure_streak_count_resets() {
    // Given: A breaker with one failure on record
    let breaker = breaker(2, Duration::from_secs(60));
    breaker.record_failure();

    // When: A success follows, then another failure
    breaker.record_success();
    breaker.record_failure();

    // Then: The streak restarted, so the breaker stays closed
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 1);
}

#[test]
fn when_threshold_is_reached_breaker_opens_and_records_failure_time() {
    // Given: A breaker with threshold 2
    let breaker = breaker(2, Duration::from_secs(60));

    // When: Two consecutive failures are recorded
    breaker.record_failure();
    breaker.record_failure();

    // Then: The breaker is open, refuses calls and reports when it failed
    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, CircuitState::Open);
    assert!(snapshot.open);
    assert_eq!(snapshot.failure_count, 2);
    assert!(snapshot.last_failure_at.is_some());
    assert!(breaker.try_acquire().is_none());
}

// =============================================================================
// Circuit Breaker: Open → Half-Open → Closed/Open
// =============================================================================

#[test]
fn when_cooldown_elapses_a_single_probe_may_close_the_breaker() {
    // Given: An open breaker with a short cooldown
    let breaker = breaker(1, Duration::from_millis(20));
    breaker.record_failure();
    assert!(!breaker.allows_dispatch());

    // When: The cooldown elapses and the probe succeeds
    std::thread::sleep(Duration::from_millis(30));
    assert!(breaker.allows_dispatch());
    let probe = breaker.try_acquire().expect("probe admitted after cooldown");
    assert!(probe.is_probe());
    probe.succeed();

    // Then: The breaker is closed with a clean count
    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
}

#[test]
fn when_probe_fails_cooldown_restarts() {
    // Given: A half-open breaker with its probe in flight
    let breaker = breaker(1, Duration::from_millis(20));
    breaker.record_failure();
    std::thread::sleep(Duration::from_millis(30));
    let probe = breaker.try_acquire().expect("probe admitted");

    // When: The probe fails
    probe.fail();

    // Then: The breaker re-opens and refuses calls until a new cooldown passes
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(breaker.try_acquire().is_none());
    std::thread::sleep(Duration::from_millis(30));
    assert!(breaker.try_acquire().is_some());
}

#[test]
fn when_many_threads_race_for_the_probe_exactly_one_wins() {
    // Given: An open breaker whose cooldown has elapsed
    let breaker = breaker(1, Duration::from_millis(10));
    breaker.record_failure();
    std::thread::sleep(Duration::from_millis(20));

    // When: Eight threads try to acquire at the same time
    let barrier = Arc::new(std::sync::Barrier::new(8));
    let handles = (0..8)
        .map(|_| {
            let breaker = Arc::clone(&breaker);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                breaker.try_acquire()
            })
        })
        .collect::<Vec<_>>();
    let permits = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread finished"))
        .collect::<Vec<_>>();

    // Then: Exactly one permit was handed out and it is the probe
    let admitted = permits.iter().flatten().collect::<Vec<_>>();
    assert_eq!(admitted.len(), 1);
    assert!(admitted[0].is_probe());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[test]
fn when_probe_is_abandoned_next_caller_can_probe() {
    // Given: A half-open breaker
    let breaker = breaker(1, Duration::from_millis(10));
    breaker.record_failure();
    std::thread::sleep(Duration::from_millis(20));

    // When: The probe permit is dropped without an outcome
    drop(breaker.try_acquire().expect("probe admitted"));

    // Then: The failure count is untouched and a new probe is admitted
    assert_eq!(breaker.consecutive_failures(), 1);
    assert!(breaker.try_acquire().is_some_and(|permit| permit.is_probe()));
}

// =============================================================================
// Circuit Breaker: Manual Control
// =============================================================================

#[test]
fn when_reset_manually_breaker_closes_from_any_state() {
    // Given: An open breaker
    let breaker = breaker(1, Duration::from_secs(60));
    breaker.record_failure();

    // When: It is reset
    breaker.reset();

    // Then: It is closed, clean and dispatching
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 0);
    assert!(breaker.allows_dispatch());
}

#[test]
fn when_reconfigured_new_threshold_applies_to_the_current_streak() {
    // Given: A breaker with threshold 5 and two failures
    let breaker = breaker(5, Duration::from_secs(60));
    breaker.record_failure();
    breaker.record_failure();

    // When: The threshold drops to 3 and one more failure arrives
    breaker.reconfigure(CircuitBreakerConfig {
        failure_threshold: 3,
        open_timeout: Duration::from_secs(60),
    });
    breaker.record_failure();

    // Then: The breaker opens under the new threshold
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.snapshot().threshold, 3);
}
