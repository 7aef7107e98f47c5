//! Per-provider circuit breaker.
//!
//! ```text
//! ┌────────┐  threshold failures  ┌────────┐  cooldown + call  ┌──────────┐
//! │ Closed ├─────────────────────►│  Open  ├──────────────────►│ HalfOpen │
//! └───▲────┘                      └───▲────┘                   └────┬─────┘
//!     │                               │  probe fails                │
//!     │  probe succeeds               └─────────────────────────────┤
//!     └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `HalfOpen` admits exactly one in-flight probe; every other caller is
//! refused until the probe settles.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use time::OffsetDateTime;

/// Runtime circuit state for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of a breaker, safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub open: bool,
    pub failure_count: u32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_failure_at: Option<OffsetDateTime>,
    pub threshold: u32,
    pub cooldown_ms: u64,
}

#[derive(Debug)]
struct CircuitInner {
    config: CircuitBreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    last_failure_at: Option<OffsetDateTime>,
    probe_in_flight: bool,
}

impl CircuitInner {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            last_failure_at: None,
            probe_in_flight: false,
        }
    }

    fn cooldown_elapsed(&self) -> bool {
        self.opened_at
            .map(|opened_at| opened_at.elapsed() >= self.config.open_timeout)
            .unwrap_or(true)
    }

    fn trip(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.probe_in_flight = false;
    }
}

/// Thread-safe circuit breaker guarding calls to one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(CircuitInner::new(config)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a call attempted right now would be admitted. Does not
    /// change state.
    pub fn allows_dispatch(&self) -> bool {
        let inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => !inner.probe_in_flight,
            CircuitState::Open => inner.cooldown_elapsed(),
        }
    }

    /// Admits a call, promoting `Open` to `HalfOpen` once the cooldown has
    /// elapsed. Returns `None` when the call must be refused.
    pub fn try_acquire(self: &Arc<Self>) -> Option<CallPermit> {
        let probe = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => false,
                CircuitState::HalfOpen if !inner.probe_in_flight => {
                    inner.probe_in_flight = true;
                    true
                }
                CircuitState::HalfOpen => return None,
                CircuitState::Open if inner.cooldown_elapsed() => {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                }
                CircuitState::Open => return None,
            }
        };

        if probe {
            tracing::debug!(provider = %self.name, "circuit half-open, admitting probe");
        }

        Some(CallPermit {
            breaker: Arc::clone(self),
            probe,
            settled: false,
        })
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Open => {
                tracing::debug!(provider = %self.name, "ignoring late success while circuit is open");
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
                tracing::info!(provider = %self.name, "probe succeeded, circuit closed");
            }
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_at = Some(OffsetDateTime::now_utc());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.trip();
                tracing::warn!(provider = %self.name, "probe failed, circuit re-opened");
            }
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed if inner.consecutive_failures >= inner.config.failure_threshold => {
                inner.trip();
                tracing::warn!(
                    provider = %self.name,
                    failures = inner.consecutive_failures,
                    "failure threshold reached, circuit opened"
                );
            }
            CircuitState::Closed => {}
        }
    }

    /// Forces `Closed` with a zero failure count regardless of state.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let (previous, config) = (inner.state, inner.config);
        *inner = CircuitInner::new(config);
        tracing::info!(provider = %self.name, from = previous.as_str(), "circuit manually reset");
    }

    /// Applies new thresholds; the current state is kept.
    pub fn reconfigure(&self, config: CircuitBreakerConfig) {
        self.lock().config = config;
    }

    /// Returns a probe that was admitted but never settled to `Open`. The
    /// original cooldown has already elapsed, so the next call may probe.
    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe_in_flight {
            inner.state = CircuitState::Open;
            inner.probe_in_flight = false;
            tracing::debug!(provider = %self.name, "abandoned probe released");
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            open: inner.state == CircuitState::Open,
            failure_count: inner.consecutive_failures,
            last_failure_at: inner.last_failure_at,
            threshold: inner.config.failure_threshold,
            cooldown_ms: u64::try_from(inner.config.open_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Admission ticket for one call through a breaker.
///
/// Settle it with [`CallPermit::succeed`] or [`CallPermit::fail`]. Dropping
/// an unsettled probe permit hands the probe slot back.
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}

impl CallPermit {
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "p1",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                open_timeout: cooldown,
            },
        ))
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = breaker(2, Duration::from_millis(10));

        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_none());
        assert!(!breaker.allows_dispatch());
    }

    #[test]
    fn transitions_to_half_open_after_timeout_then_closes_on_success() {
        let breaker = breaker(1, Duration::from_millis(1));

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(2));
        let permit = breaker.try_acquire().expect("probe admitted");
        assert!(permit.is_probe());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        permit.succeed();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn half_open_refuses_second_caller_while_probe_is_in_flight() {
        let breaker = breaker(1, Duration::from_millis(1));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(2));

        let probe = breaker.try_acquire().expect("probe admitted");
        assert!(breaker.try_acquire().is_none());
        assert!(!breaker.allows_dispatch());

        probe.fail();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_none(), "cooldown restarted");
    }

    #[test]
    fn dropped_probe_returns_slot() {
        let breaker = breaker(1, Duration::from_millis(1));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(2));

        drop(breaker.try_acquire().expect("probe admitted"));

        assert_eq!(breaker.state(), CircuitState::Open);
        let retry = breaker.try_acquire().expect("slot handed back");
        assert!(retry.is_probe());
    }

    #[test]
    fn late_success_does_not_reset_open_breaker() {
        let breaker = breaker(2, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();

        breaker.record_success();

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.consecutive_failures(), 2);
    }

    #[test]
    fn reset_forces_closed_from_any_state() {
        let breaker = breaker(1, Duration::from_secs(60));
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert!(!snapshot.open);
        assert_eq!(snapshot.failure_count, 0);
        assert!(breaker.try_acquire().is_some());
    }
}
