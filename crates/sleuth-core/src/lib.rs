//! # Sleuth Core
//!
//! Multi-provider search orchestration for personal-data lookups.
//!
//! ## Overview
//!
//! One logical query fans out concurrently to every configured provider.
//! Each provider sits behind its own circuit breaker, failed calls are
//! retried, outcomes are aggregated into a priority-ordered result set, and
//! provider identities are replaced by stable anonymized labels before
//! anything leaves the core. When a search fails, a recovery coordinator
//! picks a fallback: a partial search, a delayed retry, a degraded answer
//! or a hard failure with suggestions.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider clients (HTTP JSON, in-memory fixture) |
//! | [`circuit_breaker`] | Per-provider breaker with a single half-open probe |
//! | [`config`] | TOML configuration and environment overrides |
//! | [`coordinator`] | Search transaction facade with identity masking |
//! | [`domain`] | Requests, records, outcomes and result sets |
//! | [`error`] | Error types and classification |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`orchestrator`] | Concurrent fan-out, retries and provider admin |
//! | [`provider`] | Provider capability contract and error codes |
//! | [`recovery`] | Fallback strategies, health and suggestions |
//! | [`registry`] | Provider registry and anonymized labels |
//! | [`retry`] | Retry policy and backoff |
//! | [`validation`] | Query validation seam |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sleuth_core::{FixtureProvider, SearchCoordinator, SearchRequest, SearchType, SleuthConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SleuthConfig::load("sleuth.toml")?;
//!     let clients = config
//!         .providers
//!         .iter()
//!         .map(|provider| Arc::new(FixtureProvider::new(provider.id.clone())) as _)
//!         .collect();
//!     let coordinator = SearchCoordinator::from_config(&config, clients)?;
//!
//!     let request = SearchRequest::new(SearchType::Phone, "+15550100")?;
//!     let response = coordinator.search(&request).await?;
//!     for outcome in &response.result_set.outcomes {
//!         println!("{}: {}", outcome.provider_id, outcome.status.as_str());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  Search Coordinator  │── validate ── mask
//! └──────────┬───────────┘
//!            │ total failure
//!            ├──────────────────────────┐
//!            ▼                          ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │     Orchestrator     │◀──│ Recovery Coordinator │
//! └──────────┬───────────┘   └──────────────────────┘
//!            │ per provider
//!            ▼
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │   Circuit Breaker    │──▶│   SearchProvider     │
//! └──────────────────────┘   └──────────────────────┘
//! ```

pub mod adapters;
pub mod circuit_breaker;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod orchestrator;
pub mod provider;
pub mod recovery;
pub mod registry;
pub mod retry;
pub mod validation;

pub use adapters::{FixtureProvider, FixtureResponse, HttpJsonProvider};
pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState,
};
pub use config::{ConfigUpdate, OrchestratorConfig, ProviderConfig, RecoveryConfig, SleuthConfig};
pub use coordinator::{SearchCoordinator, SearchResponse};
pub use domain::{
    OutcomeStatus, ProviderOutcome, Record, SearchRequest, SearchResultSet, SearchType,
};
pub use error::{classify_message, ConfigError, ErrorClass, SearchError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpMethod, HttpRequest,
    HttpResponse, NoopHttpClient, ReqwestHttpClient,
};
pub use orchestrator::{BreakerStatus, ProviderStatus, SearchOrchestrator};
pub use provider::{ErrorCode, ProviderFuture, ProviderResponse, SearchProvider};
pub use recovery::{
    get_recovery_recommendations, HealthLevel, RecoveryCoordinator, RecoveryOutcome,
    RecoveryStrategy, SystemHealth,
};
pub use registry::{ProviderRegistry, RegisteredProvider};
pub use retry::{Backoff, RetryPolicy};
pub use validation::{BasicQueryValidator, QueryValidator};
