//! Retry policy and backoff shared by per-provider retries and recovery.

use std::time::Duration;

use crate::domain::{OutcomeStatus, ProviderOutcome};

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    let spread = millis / 2;
                    let offset = fastrand::u64(0..=spread.saturating_mul(2));
                    delay = Duration::from_millis((millis - spread).saturating_add(offset));
                }

                delay
            }
        }
    }
}

/// Per-provider retry policy applied inside one fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1), 2)
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
        }
    }

    /// Whether an outcome produced on retry number `attempt` (0-based)
    /// warrants another call.
    pub fn should_retry(&self, outcome: &ProviderOutcome, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        match outcome.status {
            OutcomeStatus::Timeout => true,
            OutcomeStatus::Error => outcome.error_code.is_some_and(|code| code.retryable()),
            OutcomeStatus::Success | OutcomeStatus::NoData | OutcomeStatus::CircuitOpen => false,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ErrorCode, ProviderResponse};

    fn failed(code: ErrorCode) -> ProviderOutcome {
        ProviderOutcome::from_response("p1", ProviderResponse::failed("p1", code, "boom"), 1)
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1)); // capped
    }

    #[test]
    fn test_exponential_backoff_with_jitter() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for attempt in 0..5 {
                let delay_ms = backoff.delay(attempt).as_millis() as f64;
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);

                assert!(delay_ms >= expected * 0.49, "attempt={attempt}, delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "attempt={attempt}, delay_ms={delay_ms}");
            }
        }
    }

    #[test]
    fn retries_transient_failures_until_budget_is_spent() {
        let policy = RetryPolicy::fixed(Duration::from_millis(5), 2);
        let outcome = failed(ErrorCode::ProviderUnavailable);

        assert!(policy.should_retry(&outcome, 0));
        assert!(policy.should_retry(&outcome, 1));
        assert!(!policy.should_retry(&outcome, 2));
    }

    #[test]
    fn never_retries_validation_or_credential_failures() {
        let policy = RetryPolicy::fixed(Duration::from_millis(5), 3);

        assert!(!policy.should_retry(&failed(ErrorCode::ValidationError), 0));
        assert!(!policy.should_retry(&failed(ErrorCode::InvalidCredential), 0));
    }

    #[test]
    fn timeouts_are_retried_and_clean_answers_are_not() {
        let policy = RetryPolicy::fixed(Duration::from_millis(5), 1);
        let timeout = ProviderOutcome::timeout("p1", Duration::from_millis(10), 10);
        let empty = ProviderOutcome::from_response("p1", ProviderResponse::empty("p1"), 1);

        assert!(policy.should_retry(&timeout, 0));
        assert!(!policy.should_retry(&empty, 0));
    }

    #[test]
    fn no_retry_policy_never_retries() {
        let policy = RetryPolicy::no_retry();
        assert!(!policy.should_retry(&failed(ErrorCode::NetworkError), 0));
    }
}
