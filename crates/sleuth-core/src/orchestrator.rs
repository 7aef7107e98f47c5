//! Concurrent provider fan-out.
//!
//! One search dispatches every eligible provider under a shared
//! concurrency bound. Each provider call runs under the configured timeout
//! and is retried per the [`RetryPolicy`]; only the final outcome of a
//! provider is reported to its circuit breaker. Completions are written
//! into slots indexed by priority rank, so `outcomes` is always priority
//! ordered no matter which provider answers first.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::{CallPermit, CircuitSnapshot, CircuitState};
use crate::config::{ConfigUpdate, OrchestratorConfig};
use crate::domain::{ProviderOutcome, SearchRequest, SearchResultSet};
use crate::error::{ConfigError, SearchError};
use crate::provider::{ErrorCode, ProviderResponse};
use crate::registry::{ProviderRegistry, RegisteredProvider};
use crate::retry::RetryPolicy;

/// Administrative and health view of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub id: String,
    pub label: String,
    pub priority: i32,
    pub active: bool,
    pub available: bool,
    pub breaker_open: bool,
    pub breaker_state: CircuitState,
}

impl ProviderStatus {
    /// Active, reachable and not behind an open breaker.
    pub fn is_usable(&self) -> bool {
        self.active && self.available && !self.breaker_open
    }
}

/// Breaker snapshot tagged with its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub provider_id: String,
    #[serde(flatten)]
    pub snapshot: CircuitSnapshot,
}

pub struct SearchOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: RwLock<OrchestratorConfig>,
}

impl SearchOrchestrator {
    /// Validates `config` and aligns every provider breaker with it.
    pub fn new(registry: Arc<ProviderRegistry>, config: OrchestratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        registry.reconfigure_breakers(config.breaker_config());
        Ok(Self {
            registry,
            config: RwLock::new(config),
        })
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub async fn search_all(&self, request: &SearchRequest) -> Result<SearchResultSet, SearchError> {
        self.search_all_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Fans out to every active provider.
    ///
    /// # Errors
    ///
    /// [`SearchError::NoActiveProviders`] when no active provider's breaker
    /// would admit a call. Provider failures never surface here.
    pub async fn search_all_cancellable(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResultSet, SearchError> {
        let targets = self
            .registry
            .list_providers()
            .iter()
            .filter(|provider| provider.is_active())
            .cloned()
            .collect::<Vec<_>>();

        if !any_dispatchable(&targets) {
            tracing::warn!(
                search_type = request.search_type.as_str(),
                "no active providers available"
            );
            return Err(SearchError::NoActiveProviders);
        }

        Ok(self.fan_out(request, targets, cancel).await)
    }

    pub async fn search_with_providers(
        &self,
        request: &SearchRequest,
        ids: &[String],
    ) -> Result<SearchResultSet, SearchError> {
        self.search_with_providers_cancellable(request, ids, &CancellationToken::new())
            .await
    }

    /// Fans out to the active providers among `ids`. Unknown ids are
    /// ignored.
    ///
    /// # Errors
    ///
    /// [`SearchError::NoActiveProvidersInSubset`] when none of the
    /// requested providers is active with a breaker admitting calls.
    pub async fn search_with_providers_cancellable(
        &self,
        request: &SearchRequest,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<SearchResultSet, SearchError> {
        let wanted = ids.iter().map(String::as_str).collect::<HashSet<_>>();
        let targets = self
            .registry
            .list_providers()
            .iter()
            .filter(|provider| wanted.contains(provider.id()) && provider.is_active())
            .cloned()
            .collect::<Vec<_>>();

        if !any_dispatchable(&targets) {
            return Err(SearchError::NoActiveProvidersInSubset {
                requested: ids.to_vec(),
            });
        }

        Ok(self.fan_out(request, targets, cancel).await)
    }

    async fn fan_out(
        &self,
        request: &SearchRequest,
        targets: Vec<Arc<RegisteredProvider>>,
        cancel: &CancellationToken,
    ) -> SearchResultSet {
        let config = self.config();
        let policy = config.retry_policy();
        let semaphore = Semaphore::new(config.max_concurrent_requests);
        let started = Instant::now();

        let mut slots: Vec<Option<ProviderOutcome>> = vec![None; targets.len()];
        let mut pending = FuturesUnordered::new();

        let call = CallSettings {
            timeout: config.default_timeout,
            policy: &policy,
            semaphore: &semaphore,
            cancel,
        };

        for (slot, provider) in targets.into_iter().enumerate() {
            let Some(permit) = provider.breaker().try_acquire() else {
                tracing::debug!(provider = provider.id(), "circuit open, provider skipped");
                slots[slot] = Some(ProviderOutcome::circuit_open(provider.id()));
                continue;
            };

            pending.push(async move {
                let outcome = call_provider(&provider, request, permit, call).await;
                (slot, outcome)
            });
        }

        while let Some((slot, outcome)) = pending.next().await {
            slots[slot] = Some(outcome);
        }

        let outcomes = slots.into_iter().flatten().collect();
        let result_set = SearchResultSet::assemble(request, outcomes, elapsed_ms(started));

        tracing::info!(
            search_id = %result_set.search_id,
            search_type = request.search_type.as_str(),
            providers = result_set.total_providers_searched,
            with_data = result_set.total_providers_with_data,
            records = result_set.total_records,
            duration_ms = result_set.search_duration_ms,
            "search completed"
        );

        result_set
    }

    /// Priority-ordered status of every registered provider.
    ///
    /// Availability probes run concurrently, each under the configured
    /// timeout; a probe that times out counts as unavailable.
    ///
    /// # Errors
    ///
    /// [`SearchError::Internal`] when a probe task crashes.
    pub async fn list_provider_statuses(&self) -> Result<Vec<ProviderStatus>, SearchError> {
        let timeout = self.config().default_timeout;
        let providers = self.registry.list_providers();

        let probes = providers
            .iter()
            .map(|provider| {
                let client = Arc::clone(provider.client());
                tokio::spawn(async move {
                    tokio::time::timeout(timeout, client.is_available())
                        .await
                        .unwrap_or(false)
                })
            })
            .collect::<Vec<_>>();

        let results = futures::future::join_all(probes).await;

        providers
            .iter()
            .zip(results)
            .map(|(provider, probe)| {
                let available = probe.map_err(|error| {
                    SearchError::Internal(format!(
                        "availability check for '{}' failed: {error}",
                        provider.id()
                    ))
                })?;
                let breaker_state = provider.breaker().state();

                Ok(ProviderStatus {
                    id: provider.id().to_owned(),
                    label: provider.label().to_owned(),
                    priority: provider.priority(),
                    active: provider.is_active(),
                    available,
                    breaker_open: breaker_state == CircuitState::Open,
                    breaker_state,
                })
            })
            .collect()
    }

    /// Returns `false` when `id` is not registered.
    pub fn set_provider_active(&self, id: &str, active: bool) -> bool {
        self.registry.set_active(id, active)
    }

    pub fn breaker_states(&self) -> Vec<BreakerStatus> {
        self.registry
            .list_providers()
            .iter()
            .map(|provider| BreakerStatus {
                provider_id: provider.id().to_owned(),
                snapshot: provider.breaker().snapshot(),
            })
            .collect()
    }

    pub fn reset_breaker(&self, id: &str) -> Result<(), SearchError> {
        let provider = self
            .registry
            .get(id)
            .ok_or_else(|| SearchError::UnknownProvider { id: id.to_owned() })?;
        provider.breaker().reset();
        Ok(())
    }

    pub fn config(&self) -> OrchestratorConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `update` atomically; nothing changes when the merged
    /// configuration is invalid. Searches already running keep the
    /// settings they started with.
    pub fn update_config(&self, update: &ConfigUpdate) -> Result<OrchestratorConfig, ConfigError> {
        let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let merged = current.merged(update);
        merged.validate()?;

        if update.touches_breakers() {
            self.registry.reconfigure_breakers(merged.breaker_config());
        }
        *current = merged.clone();

        tracing::info!(
            max_concurrent_requests = merged.max_concurrent_requests,
            timeout_ms = millis(merged.default_timeout),
            retry_attempts = merged.retry_attempts,
            breaker_threshold = merged.circuit_breaker_threshold,
            "orchestrator configuration updated"
        );
        Ok(merged)
    }
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("providers", &self.registry.len())
            .field("config", &self.config())
            .finish()
    }
}

#[derive(Clone, Copy)]
struct CallSettings<'a> {
    timeout: Duration,
    policy: &'a RetryPolicy,
    semaphore: &'a Semaphore,
    cancel: &'a CancellationToken,
}

/// Runs one provider through its retry budget and settles its breaker
/// permit with the final outcome.
async fn call_provider(
    provider: &RegisteredProvider,
    request: &SearchRequest,
    permit: CallPermit,
    call: CallSettings<'_>,
) -> ProviderOutcome {
    let queued = Instant::now();
    let _slot = tokio::select! {
        biased;
        () = call.cancel.cancelled() => {
            return ProviderOutcome::cancelled(provider.id(), elapsed_ms(queued));
        }
        acquired = call.semaphore.acquire() => match acquired {
            Ok(slot) => slot,
            Err(_) => return ProviderOutcome::cancelled(provider.id(), elapsed_ms(queued)),
        },
    };

    let started = Instant::now();
    let mut attempt = 0;

    let outcome = loop {
        let outcome = tokio::select! {
            biased;
            () = call.cancel.cancelled() => None,
            outcome = attempt_once(provider, request, call.timeout, started) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            // Cancelled calls say nothing about provider health.
            return ProviderOutcome::cancelled(provider.id(), elapsed_ms(started));
        };

        if !call.policy.should_retry(&outcome, attempt) {
            break outcome;
        }

        let delay = call.policy.delay_for_attempt(attempt);
        tracing::debug!(
            provider = provider.id(),
            attempt = attempt + 1,
            status = outcome.status.as_str(),
            delay_ms = millis(delay),
            "retrying provider call"
        );

        tokio::select! {
            biased;
            () = call.cancel.cancelled() => {
                return ProviderOutcome::cancelled(provider.id(), elapsed_ms(started));
            }
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    };

    if outcome.is_failure() {
        tracing::warn!(
            provider = provider.id(),
            status = outcome.status.as_str(),
            error_code = outcome.error_code.map(ErrorCode::as_str),
            attempts = attempt + 1,
            "provider call failed"
        );
        permit.fail();
    } else {
        permit.succeed();
    }

    outcome
}

async fn attempt_once(
    provider: &RegisteredProvider,
    request: &SearchRequest,
    timeout: Duration,
    started: Instant,
) -> ProviderOutcome {
    let call = AssertUnwindSafe(provider.client().search(&request.value, request.search_type))
        .catch_unwind();

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(response)) => ProviderOutcome::from_response(provider.id(), response, elapsed_ms(started)),
        Ok(Err(_)) => ProviderOutcome::from_response(
            provider.id(),
            ProviderResponse::failed(provider.id(), ErrorCode::UnknownError, "provider client panicked"),
            elapsed_ms(started),
        ),
        Err(_) => ProviderOutcome::timeout(provider.id(), timeout, elapsed_ms(started)),
    }
}

fn any_dispatchable(providers: &[Arc<RegisteredProvider>]) -> bool {
    providers
        .iter()
        .any(|provider| provider.breaker().allows_dispatch())
}

fn elapsed_ms(started: Instant) -> u64 {
    millis(started.elapsed())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
