//! Fallback strategy selection after a failed search.
//!
//! | Order | Condition | Strategy |
//! |-------|-----------|----------|
//! | 1 | provider statuses cannot be enumerated | `recovery_failed` |
//! | 2 | usable providers remain after excluding the failed ones | `partial_search` |
//! | 3 | timeout or network failure below the retry ceiling | `retry_with_delay` |
//! | 4 | any usable provider | `degraded_service` |
//! | 5 | otherwise | `recovery_failed` |
//!
//! A usable provider is active, answers its availability probe and is not
//! behind an open breaker.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::RecoveryConfig;
use crate::domain::{SearchRequest, SearchResultSet, SearchType};
use crate::error::{ErrorClass, SearchError};
use crate::orchestrator::{ProviderStatus, SearchOrchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    PartialSearch,
    RetryWithDelay,
    DegradedService,
    RecoveryFailed,
}

impl RecoveryStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PartialSearch => "partial_search",
            Self::RetryWithDelay => "retry_with_delay",
            Self::DegradedService => "degraded_service",
            Self::RecoveryFailed => "recovery_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryOutcome {
    pub success: bool,
    pub strategy: RecoveryStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_set: Option<SearchResultSet>,
    pub suggestions: Vec<String>,
}

impl RecoveryOutcome {
    fn recovered(strategy: RecoveryStrategy, result_set: SearchResultSet, suggestions: Vec<String>) -> Self {
        Self {
            success: true,
            strategy,
            result_set: Some(result_set),
            suggestions,
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            strategy: RecoveryStrategy::RecoveryFailed,
            result_set: None,
            suggestions: generic_suggestions(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Critical,
}

impl HealthLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemHealth {
    pub status: HealthLevel,
    pub available_count: usize,
    pub total_count: usize,
    pub breakers_open: usize,
    pub can_recover: bool,
}

impl SystemHealth {
    fn from_statuses(statuses: &[ProviderStatus]) -> Self {
        let available_count = statuses.iter().filter(|status| status.is_usable()).count();
        let total_count = statuses.len();
        let breakers_open = statuses.iter().filter(|status| status.breaker_open).count();

        let status = if available_count == 0 {
            HealthLevel::Critical
        } else if available_count < total_count || breakers_open > 0 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };

        Self {
            status,
            available_count,
            total_count,
            breakers_open,
            can_recover: available_count > 0,
        }
    }

    fn critical(total_count: usize) -> Self {
        Self {
            status: HealthLevel::Critical,
            available_count: 0,
            total_count,
            breakers_open: 0,
            can_recover: false,
        }
    }
}

#[derive(Debug)]
pub struct RecoveryCoordinator {
    orchestrator: Arc<SearchOrchestrator>,
    config: RecoveryConfig,
}

impl RecoveryCoordinator {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, config: RecoveryConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    pub async fn attempt_recovery(
        &self,
        error: &SearchError,
        request: &SearchRequest,
        failed_provider_ids: &[String],
        attempt_number: u32,
    ) -> RecoveryOutcome {
        self.attempt_recovery_cancellable(
            error,
            request,
            failed_provider_ids,
            attempt_number,
            &CancellationToken::new(),
        )
        .await
    }

    /// Picks and runs the first applicable strategy. Never fails: every
    /// internal error ends in `recovery_failed`.
    pub async fn attempt_recovery_cancellable(
        &self,
        error: &SearchError,
        request: &SearchRequest,
        failed_provider_ids: &[String],
        attempt_number: u32,
        cancel: &CancellationToken,
    ) -> RecoveryOutcome {
        let mut error = error.clone();
        let mut failed = failed_provider_ids.to_vec();
        let mut attempt = attempt_number;

        loop {
            if cancel.is_cancelled() {
                return RecoveryOutcome::failed();
            }

            let statuses = match self.orchestrator.list_provider_statuses().await {
                Ok(statuses) => statuses,
                Err(status_error) => {
                    tracing::warn!(error = %status_error, "provider status enumeration failed");
                    return RecoveryOutcome::failed();
                }
            };

            let available = statuses
                .iter()
                .filter(|status| status.is_usable() && !failed.contains(&status.id))
                .map(|status| status.id.clone())
                .collect::<Vec<_>>();

            if !available.is_empty() && !failed.is_empty() {
                tracing::info!(
                    excluded = failed.len(),
                    remaining = available.len(),
                    "recovering with partial search"
                );
                match self
                    .orchestrator
                    .search_with_providers_cancellable(request, &available, cancel)
                    .await
                {
                    Ok(mut result_set) => {
                        result_set.is_degraded = true;
                        return RecoveryOutcome::recovered(
                            RecoveryStrategy::PartialSearch,
                            result_set,
                            Vec::new(),
                        );
                    }
                    Err(search_error) => error = search_error,
                }
            }

            let transient = error.effective_class().is_some_and(ErrorClass::is_transient);
            if transient && attempt < self.config.max_recovery_attempts {
                let implicated = if failed.is_empty() {
                    statuses
                        .iter()
                        .filter(|status| status.breaker_open)
                        .map(|status| status.id.clone())
                        .collect()
                } else {
                    failed.clone()
                };
                for id in &implicated {
                    if self.orchestrator.reset_breaker(id).is_err() {
                        tracing::debug!(provider = %id, "skipping reset of unknown provider");
                    }
                }

                let delay = self.config.backoff().delay(attempt);
                tracing::info!(
                    attempt = attempt + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying search after backoff"
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return RecoveryOutcome::failed(),
                    () = tokio::time::sleep(delay) => {}
                }

                match self.orchestrator.search_all_cancellable(request, cancel).await {
                    Ok(result_set) if !result_set.is_total_failure() => {
                        return RecoveryOutcome::recovered(
                            RecoveryStrategy::RetryWithDelay,
                            result_set,
                            Vec::new(),
                        );
                    }
                    Ok(result_set) => {
                        error = result_set.failure_error();
                        failed = result_set.failed_provider_ids();
                    }
                    Err(search_error) => error = search_error,
                }
                attempt += 1;
                continue;
            }

            if !available.is_empty() {
                match self
                    .orchestrator
                    .search_with_providers_cancellable(request, &available, cancel)
                    .await
                {
                    Ok(mut result_set) => {
                        result_set.is_degraded = true;
                        tracing::info!(
                            providers = available.len(),
                            "serving degraded results"
                        );
                        return RecoveryOutcome::recovered(
                            RecoveryStrategy::DegradedService,
                            result_set,
                            degraded_suggestions(),
                        );
                    }
                    Err(search_error) => {
                        tracing::warn!(error = %search_error, "degraded search failed");
                    }
                }
            }

            tracing::warn!(error = %error, attempts = attempt, "recovery failed");
            return RecoveryOutcome::failed();
        }
    }

    pub async fn get_system_health_status(&self) -> SystemHealth {
        match self.orchestrator.list_provider_statuses().await {
            Ok(statuses) => SystemHealth::from_statuses(&statuses),
            Err(error) => {
                tracing::warn!(error = %error, "health check could not enumerate providers");
                SystemHealth::critical(self.orchestrator.registry().len())
            }
        }
    }

    pub async fn can_provide_degraded_service(&self) -> bool {
        match self.orchestrator.list_provider_statuses().await {
            Ok(statuses) => statuses.iter().any(ProviderStatus::is_usable),
            Err(_) => false,
        }
    }
}

/// Canned user-facing suggestions for `error`, never empty.
///
/// Uses the structured classification when the error has one and falls
/// back to keyword inspection of its text otherwise.
pub fn get_recovery_recommendations(error: &SearchError, search_type: Option<SearchType>) -> Vec<String> {
    match error.effective_class() {
        Some(ErrorClass::Timeout | ErrorClass::Network) => strings(&[
            "The search took longer than expected. Try again in a few moments.",
            "Check your internet connection.",
            "Try again later when the sources are less busy.",
        ]),
        Some(ErrorClass::CircuitOpen | ErrorClass::Unavailable | ErrorClass::RateLimited) => {
            strings(&[
                "Some data sources are temporarily unavailable.",
                "Try again in a few minutes.",
                "Results may be incomplete until all sources recover.",
            ])
        }
        Some(ErrorClass::Validation) => validation_suggestions(search_type),
        Some(ErrorClass::Credential | ErrorClass::Parsing | ErrorClass::Internal) | None => {
            generic_suggestions()
        }
    }
}

fn validation_suggestions(search_type: Option<SearchType>) -> Vec<String> {
    let format_hint = match search_type {
        Some(SearchType::Phone) => "Enter the phone number in international format, e.g. +15550100.",
        Some(SearchType::Email) => "Enter a complete email address, e.g. name@example.com.",
        Some(SearchType::TaxId) => "Enter the tax id using digits only.",
        Some(SearchType::NationalId) => "Enter the national id exactly as printed on the document.",
        Some(SearchType::Passport) => "Enter the passport number without spaces.",
        None => "Check the format of the value you entered.",
    };
    strings(&[format_hint, "Make sure the search type matches the value."])
}

fn degraded_suggestions() -> Vec<String> {
    strings(&[
        "All other providers are temporarily unavailable.",
        "Results may be incomplete; repeat the search later for full coverage.",
    ])
}

fn generic_suggestions() -> Vec<String> {
    strings(&[
        "Try the search again later.",
        "Contact support if the problem persists.",
    ])
}

fn strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| (*line).to_owned()).collect()
}
