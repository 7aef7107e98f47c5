//! Provider capability contract.
//!
//! Every third-party search client implements [`SearchProvider`] and
//! translates its native response into a [`ProviderResponse`] at the
//! boundary, so the orchestrator never branches on provider-specific shapes.
//!
//! # Error codes
//!
//! | Code | Class | Retried |
//! |------|-------|---------|
//! | `PROVIDER_UNAVAILABLE` | unavailable | yes |
//! | `INVALID_CREDENTIAL` | credential | no |
//! | `RATE_LIMIT` | rate limited | yes |
//! | `VALIDATION_ERROR` | validation | no |
//! | `NETWORK_ERROR` | network | yes |
//! | `TIMEOUT_ERROR` | timeout | yes |
//! | `PARSING_ERROR` | parsing | yes |
//! | `UNKNOWN_ERROR` | internal | yes |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Record, SearchType};
use crate::error::{ErrorClass, ValidationError};

/// Error taxonomy reported by provider clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ProviderUnavailable,
    InvalidCredential,
    RateLimit,
    ValidationError,
    NetworkError,
    TimeoutError,
    ParsingError,
    UnknownError,
}

impl ErrorCode {
    pub const ALL: [Self; 8] = [
        Self::ProviderUnavailable,
        Self::InvalidCredential,
        Self::RateLimit,
        Self::ValidationError,
        Self::NetworkError,
        Self::TimeoutError,
        Self::ParsingError,
        Self::UnknownError,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::RateLimit => "RATE_LIMIT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::ParsingError => "PARSING_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub const fn class(self) -> ErrorClass {
        match self {
            Self::ProviderUnavailable => ErrorClass::Unavailable,
            Self::InvalidCredential => ErrorClass::Credential,
            Self::RateLimit => ErrorClass::RateLimited,
            Self::ValidationError => ErrorClass::Validation,
            Self::NetworkError => ErrorClass::Network,
            Self::TimeoutError => ErrorClass::Timeout,
            Self::ParsingError => ErrorClass::Parsing,
            Self::UnknownError => ErrorClass::Internal,
        }
    }

    /// Whether repeating the same call can plausibly succeed.
    pub const fn retryable(self) -> bool {
        !matches!(self, Self::InvalidCredential | Self::ValidationError)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidErrorCode {
                value: value.to_owned(),
            })
    }
}

/// Normalized response of a single provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    pub provider_id: String,
}

impl ProviderResponse {
    pub fn found(provider_id: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            success: true,
            data: Some(records),
            error: None,
            error_code: None,
            provider_id: provider_id.into(),
        }
    }

    pub fn empty(provider_id: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            error_code: None,
            provider_id: provider_id.into(),
        }
    }

    pub fn failed(
        provider_id: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: Some(code),
            provider_id: provider_id.into(),
        }
    }
}

/// Boxed future returned by provider capability calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability contract implemented by every provider client.
///
/// Implementations must be `Send + Sync`; the orchestrator shares them
/// across concurrent fan-outs. A call that outlives the orchestrator's
/// timeout is simply dropped, so implementations should not rely on
/// running to completion.
pub trait SearchProvider: Send + Sync {
    /// Stable provider identifier, matching its configuration entry.
    fn id(&self) -> &str;

    /// Looks up `query` of the given type.
    ///
    /// Transport and upstream failures are reported through
    /// [`ProviderResponse::failed`], never by panicking.
    fn search<'a>(
        &'a self,
        query: &'a str,
        search_type: SearchType,
    ) -> ProviderFuture<'a, ProviderResponse>;

    /// Whether the client is currently able to serve requests.
    fn is_available(&self) -> ProviderFuture<'_, bool>;
}
