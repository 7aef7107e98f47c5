//! Configuration for the orchestration engine.
//!
//! Loaded from TOML (durations as integer milliseconds) with optional
//! environment overrides:
//!
//! ```toml
//! [orchestrator]
//! max_concurrent_requests = 5
//! default_timeout_ms = 30000
//! retry_attempts = 2
//! retry_delay_ms = 1000
//! circuit_breaker_threshold = 5
//! circuit_breaker_timeout_ms = 60000
//!
//! [recovery]
//! max_recovery_attempts = 3
//!
//! [[providers]]
//! id = "registry-a"
//! priority = 1
//! endpoint = "https://registry-a.example/api/lookup"
//! api_key_env = "REGISTRY_A_KEY"
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `SLEUTH_MAX_CONCURRENT` | `orchestrator.max_concurrent_requests` |
//! | `SLEUTH_TIMEOUT_MS` | `orchestrator.default_timeout_ms` |
//! | `SLEUTH_RETRY_ATTEMPTS` | `orchestrator.retry_attempts` |
//! | `SLEUTH_RETRY_DELAY_MS` | `orchestrator.retry_delay_ms` |
//! | `SLEUTH_BREAKER_THRESHOLD` | `orchestrator.circuit_breaker_threshold` |
//! | `SLEUTH_BREAKER_TIMEOUT_MS` | `orchestrator.circuit_breaker_timeout_ms` |

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::retry::{Backoff, RetryPolicy};

/// Fan-out, retry and breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_concurrent_requests: usize,
    #[serde(rename = "default_timeout_ms", with = "duration_ms")]
    pub default_timeout: Duration,
    pub retry_attempts: u32,
    #[serde(rename = "retry_delay_ms", with = "duration_ms")]
    pub retry_delay: Duration,
    pub circuit_breaker_threshold: u32,
    #[serde(rename = "circuit_breaker_timeout_ms", with = "duration_ms")]
    pub circuit_breaker_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 5,
            default_timeout: Duration::from_secs(30),
            retry_attempts: 2,
            retry_delay: Duration::from_secs(1),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(60),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::ZeroValue {
                field: "max_concurrent_requests",
            });
        }
        if self.max_concurrent_requests > Semaphore::MAX_PERMITS {
            return Err(ConfigError::TooLarge {
                field: "max_concurrent_requests",
                max: Semaphore::MAX_PERMITS,
            });
        }
        if self.default_timeout.is_zero() {
            return Err(ConfigError::ZeroValue {
                field: "default_timeout_ms",
            });
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(ConfigError::ZeroValue {
                field: "circuit_breaker_threshold",
            });
        }
        Ok(())
    }

    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_threshold,
            open_timeout: self.circuit_breaker_timeout,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.retry_delay, self.retry_attempts)
    }

    /// Returns a copy with every field present in `update` replaced.
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        Self {
            max_concurrent_requests: update
                .max_concurrent_requests
                .unwrap_or(self.max_concurrent_requests),
            default_timeout: update.default_timeout.unwrap_or(self.default_timeout),
            retry_attempts: update.retry_attempts.unwrap_or(self.retry_attempts),
            retry_delay: update.retry_delay.unwrap_or(self.retry_delay),
            circuit_breaker_threshold: update
                .circuit_breaker_threshold
                .unwrap_or(self.circuit_breaker_threshold),
            circuit_breaker_timeout: update
                .circuit_breaker_timeout
                .unwrap_or(self.circuit_breaker_timeout),
        }
    }
}

/// Partial update for [`OrchestratorConfig`]; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub max_concurrent_requests: Option<usize>,
    pub default_timeout: Option<Duration>,
    pub retry_attempts: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub circuit_breaker_threshold: Option<u32>,
    pub circuit_breaker_timeout: Option<Duration>,
}

impl ConfigUpdate {
    pub fn touches_breakers(&self) -> bool {
        self.circuit_breaker_threshold.is_some() || self.circuit_breaker_timeout.is_some()
    }
}

/// Recovery coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Retry-with-delay is only chosen while the attempt number is below this.
    pub max_recovery_attempts: u32,
    #[serde(rename = "backoff_base_ms", with = "duration_ms")]
    pub backoff_base: Duration,
    #[serde(rename = "backoff_max_ms", with = "duration_ms")]
    pub backoff_max: Duration,
    pub jitter: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RecoveryConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::Exponential {
            base: self.backoff_base,
            factor: 2.0,
            max: self.backoff_max,
            jitter: self.jitter,
        }
    }
}

/// One configured provider. Credentials stay with the client; only the
/// name of the environment variable holding them is configured here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Probed by availability checks instead of `endpoint` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            priority,
            active: true,
            endpoint: None,
            health_url: None,
            api_key_env: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

const fn default_active() -> bool {
    true
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleuthConfig {
    pub orchestrator: OrchestratorConfig,
    pub recovery: RecoveryConfig,
    pub providers: Vec<ProviderConfig>,
}

impl SleuthConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Applies `SLEUTH_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let orchestrator = &mut self.orchestrator;

        if let Some(value) = parse_override(&lookup, "SLEUTH_MAX_CONCURRENT")? {
            orchestrator.max_concurrent_requests = usize::try_from(value).unwrap_or(usize::MAX);
        }
        if let Some(value) = parse_override(&lookup, "SLEUTH_TIMEOUT_MS")? {
            orchestrator.default_timeout = Duration::from_millis(value);
        }
        if let Some(value) = parse_override(&lookup, "SLEUTH_RETRY_ATTEMPTS")? {
            orchestrator.retry_attempts = u32::try_from(value).unwrap_or(u32::MAX);
        }
        if let Some(value) = parse_override(&lookup, "SLEUTH_RETRY_DELAY_MS")? {
            orchestrator.retry_delay = Duration::from_millis(value);
        }
        if let Some(value) = parse_override(&lookup, "SLEUTH_BREAKER_THRESHOLD")? {
            orchestrator.circuit_breaker_threshold = u32::try_from(value).unwrap_or(u32::MAX);
        }
        if let Some(value) = parse_override(&lookup, "SLEUTH_BREAKER_TIMEOUT_MS")? {
            orchestrator.circuit_breaker_timeout = Duration::from_millis(value);
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.orchestrator.validate()?;

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(ConfigError::EmptyProviderId);
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::DuplicateProvider {
                    id: provider.id.clone(),
                });
            }
        }
        Ok(())
    }
}

fn parse_override<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidOverride { name, value: raw.clone() })?;
    tracing::debug!("Override {} from env: {}", name, value);
    Ok(Some(value))
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SleuthConfig::from_toml_str("").expect("valid");
        assert_eq!(config, SleuthConfig::default());
    }

    #[test]
    fn merged_update_keeps_untouched_fields() {
        let base = OrchestratorConfig::default();
        let update = ConfigUpdate {
            retry_attempts: Some(0),
            ..ConfigUpdate::default()
        };

        let merged = base.merged(&update);

        assert_eq!(merged.retry_attempts, 0);
        assert_eq!(merged.default_timeout, base.default_timeout);
        assert!(!update.touches_breakers());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = OrchestratorConfig {
            max_concurrent_requests: 0,
            ..OrchestratorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroValue {
                field: "max_concurrent_requests"
            })
        ));
    }

    #[test]
    fn durations_serialize_as_milliseconds() {
        let rendered = toml::to_string(&OrchestratorConfig::default()).expect("serializable");
        assert!(rendered.contains("default_timeout_ms = 30000"));
        assert!(rendered.contains("circuit_breaker_timeout_ms = 60000"));
    }
}
