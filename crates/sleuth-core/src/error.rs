use thiserror::Error;

use serde::Serialize;

use crate::provider::ErrorCode;

/// Request-shape errors raised before a query reaches the orchestrator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("search value cannot be empty")]
    EmptyValue,
    #[error("search value length {len} exceeds max {max}")]
    ValueTooLong { len: usize, max: usize },
    #[error("search value contains a control character at index {index}")]
    ControlCharacter { index: usize },
    #[error(
        "invalid search type '{value}', expected one of phone, email, tax_id, national_id, passport"
    )]
    InvalidSearchType { value: String },
    #[error("invalid provider error code '{value}'")]
    InvalidErrorCode { value: String },
}

/// Configuration load and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("field '{field}' must be greater than zero")]
    ZeroValue { field: &'static str },
    #[error("field '{field}' must be at most {max}")]
    TooLarge { field: &'static str, max: usize },
    #[error("provider id cannot be empty")]
    EmptyProviderId,
    #[error("duplicate provider id '{id}'")]
    DuplicateProvider { id: String },
    #[error("provider '{id}' is configured but no client was registered for it")]
    MissingClient { id: String },
    #[error("provider client '{id}' has no configuration entry")]
    UnconfiguredClient { id: String },
    #[error("provider '{id}' has no endpoint configured")]
    MissingEndpoint { id: String },
    #[error("environment override {name}='{value}' is not a valid number")]
    InvalidOverride { name: &'static str, value: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Structured failure classification used by recovery strategy selection
/// and user-facing suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    Network,
    CircuitOpen,
    Unavailable,
    RateLimited,
    Validation,
    Credential,
    Parsing,
    Internal,
}

impl ErrorClass {
    /// Failures that may clear up on their own after a short wait.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::Network)
    }
}

/// Errors surfaced by the orchestrator and the search coordinator.
///
/// Individual provider failures never appear here during a normal fan-out;
/// they are materialized as [`ProviderOutcome`](crate::ProviderOutcome)
/// values instead. The `Provider`, `Timeout` and `CircuitOpen` variants
/// summarize a fan-out in which every provider failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no active providers available")]
    NoActiveProviders,

    #[error("none of the requested providers are active: {}", requested.join(", "))]
    NoActiveProvidersInSubset { requested: Vec<String> },

    #[error("unknown provider '{id}'")]
    UnknownProvider { id: String },

    #[error("provider error ({code}): {message}")]
    Provider { code: ErrorCode, message: String },

    #[error("search timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("circuit breaker is open for every dispatched provider")]
    CircuitOpen,

    #[error("search cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("search failed after recovery was attempted")]
    RecoveryFailed { suggestions: Vec<String> },

    /// Unclassified failure carrying only free text.
    #[error("{0}")]
    Message(String),
}

impl SearchError {
    /// Structured classification, `None` only for free-text [`SearchError::Message`].
    pub fn classify(&self) -> Option<ErrorClass> {
        match self {
            Self::Validation(_) => Some(ErrorClass::Validation),
            Self::NoActiveProviders
            | Self::NoActiveProvidersInSubset { .. }
            | Self::RecoveryFailed { .. } => Some(ErrorClass::Unavailable),
            Self::UnknownProvider { .. } | Self::Cancelled | Self::Internal(_) => {
                Some(ErrorClass::Internal)
            }
            Self::Provider { code, .. } => Some(code.class()),
            Self::Timeout { .. } => Some(ErrorClass::Timeout),
            Self::CircuitOpen => Some(ErrorClass::CircuitOpen),
            Self::Message(_) => None,
        }
    }

    /// Structured classification with a keyword fallback over the message
    /// text for errors that carry no structure.
    pub fn effective_class(&self) -> Option<ErrorClass> {
        self.classify()
            .or_else(|| classify_message(&self.to_string()))
    }
}

/// Keyword inspection of free-text error messages.
pub fn classify_message(message: &str) -> Option<ErrorClass> {
    let message = message.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|needle| message.contains(needle));

    if contains_any(&["timeout", "timed out"]) {
        Some(ErrorClass::Timeout)
    } else if contains_any(&["network", "connection", "connect"]) {
        Some(ErrorClass::Network)
    } else if contains_any(&["circuit"]) {
        Some(ErrorClass::CircuitOpen)
    } else if contains_any(&["unavailable", "rate limit"]) {
        Some(ErrorClass::Unavailable)
    } else if contains_any(&["invalid", "validation", "format"]) {
        Some(ErrorClass::Validation)
    } else {
        None
    }
}
