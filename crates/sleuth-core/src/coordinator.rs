//! Search transaction facade.
//!
//! `validate → fan-out → (recovery) → mask`. Everything returned from here
//! carries anonymized provider labels; raw ids stay inside the core.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::{RecoveryConfig, SleuthConfig};
use crate::domain::{SearchRequest, SearchResultSet, SearchType};
use crate::error::{ConfigError, SearchError};
use crate::orchestrator::{BreakerStatus, ProviderStatus, SearchOrchestrator};
use crate::provider::SearchProvider;
use crate::recovery::{get_recovery_recommendations, RecoveryCoordinator, RecoveryStrategy, SystemHealth};
use crate::registry::ProviderRegistry;
use crate::validation::{BasicQueryValidator, QueryValidator};

/// Masked answer to one search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub result_set: SearchResultSet,
    /// Strategy that produced the result when the first fan-out failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryStrategy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

pub struct SearchCoordinator {
    orchestrator: Arc<SearchOrchestrator>,
    recovery: RecoveryCoordinator,
    validator: Box<dyn QueryValidator>,
    shutdown: CancellationToken,
}

impl SearchCoordinator {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, recovery_config: RecoveryConfig) -> Self {
        Self {
            recovery: RecoveryCoordinator::new(Arc::clone(&orchestrator), recovery_config),
            orchestrator,
            validator: Box::new(BasicQueryValidator::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds the registry, orchestrator and recovery coordinator from one
    /// configuration, pairing each provider entry with its client by id.
    pub fn from_config(
        config: &SleuthConfig,
        clients: Vec<Arc<dyn SearchProvider>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = ProviderRegistry::new(
            &config.providers,
            clients,
            config.orchestrator.breaker_config(),
        )?;
        let orchestrator = SearchOrchestrator::new(Arc::new(registry), config.orchestrator.clone())?;
        Ok(Self::new(Arc::new(orchestrator), config.recovery.clone()))
    }

    pub fn with_validator(mut self, validator: impl QueryValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Unmasked administrative handle.
    pub fn orchestrator(&self) -> &Arc<SearchOrchestrator> {
        &self.orchestrator
    }

    pub fn recovery(&self) -> &RecoveryCoordinator {
        &self.recovery
    }

    /// Runs one search transaction.
    ///
    /// A fan-out in which every provider failed, or which could not start,
    /// is handed to the recovery coordinator.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Validation`] when the validator rejects the request.
    /// - [`SearchError::Cancelled`] after [`SearchCoordinator::shutdown`].
    /// - [`SearchError::RecoveryFailed`] when no strategy produced results.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        self.validator.validate(request)?;
        if self.shutdown.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let cancel = self.shutdown.child_token();
        let (error, failed_ids) = match self.orchestrator.search_all_cancellable(request, &cancel).await {
            Ok(result_set) if !result_set.is_total_failure() => {
                return Ok(SearchResponse {
                    result_set: self.mask(result_set)?,
                    recovery: None,
                    suggestions: Vec::new(),
                });
            }
            Ok(result_set) => (result_set.failure_error(), result_set.failed_provider_ids()),
            Err(error) => (error, Vec::new()),
        };

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        tracing::warn!(
            search_type = request.search_type.as_str(),
            error = %error,
            failed = failed_ids.len(),
            "search failed, attempting recovery"
        );

        let outcome = self
            .recovery
            .attempt_recovery_cancellable(&error, request, &failed_ids, 0, &cancel)
            .await;

        match outcome.result_set {
            Some(result_set) if outcome.success => Ok(SearchResponse {
                result_set: self.mask(result_set)?,
                recovery: Some(outcome.strategy),
                suggestions: outcome.suggestions,
            }),
            _ if cancel.is_cancelled() => Err(SearchError::Cancelled),
            _ => Err(SearchError::RecoveryFailed {
                suggestions: outcome.suggestions,
            }),
        }
    }

    /// Provider statuses with ids replaced by labels.
    pub async fn provider_statuses(&self) -> Result<Vec<ProviderStatus>, SearchError> {
        let statuses = self.orchestrator.list_provider_statuses().await?;
        Ok(statuses
            .into_iter()
            .map(|mut status| {
                status.id = status.label.clone();
                status
            })
            .collect())
    }

    /// Breaker snapshots keyed by label.
    pub fn breaker_states(&self) -> Result<Vec<BreakerStatus>, SearchError> {
        let registry = self.orchestrator.registry();
        self.orchestrator
            .breaker_states()
            .into_iter()
            .map(|mut status| {
                status.provider_id = registry.mask_label(&status.provider_id)?.to_owned();
                Ok(status)
            })
            .collect()
    }

    pub async fn system_health(&self) -> SystemHealth {
        self.recovery.get_system_health_status().await
    }

    pub async fn can_provide_degraded_service(&self) -> bool {
        self.recovery.can_provide_degraded_service().await
    }

    pub fn recovery_recommendations(&self, error: &SearchError, search_type: Option<SearchType>) -> Vec<String> {
        get_recovery_recommendations(error, search_type)
    }

    /// Cancels every in-flight search and recovery back-off.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("search coordinator shutting down");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn mask(&self, result_set: SearchResultSet) -> Result<SearchResultSet, SearchError> {
        self.orchestrator.registry().mask_result_set(result_set)
    }
}

impl Drop for SearchCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for SearchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCoordinator")
            .field("orchestrator", &self.orchestrator)
            .field("recovery", &self.recovery)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
