//! Provider registry and identity masking.
//!
//! The registry is built once at process start. Provider order (priority,
//! then id) and the id → label bijection are fixed at construction and
//! never recomputed; only the administrative `active` flag and breaker
//! state change afterwards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::ProviderConfig;
use crate::domain::SearchResultSet;
use crate::error::{ConfigError, SearchError};
use crate::provider::SearchProvider;

const LABEL_PREFIX: &str = "Source";

/// A configured provider with its client, breaker and anonymized label.
pub struct RegisteredProvider {
    id: String,
    priority: i32,
    label: String,
    active: AtomicBool,
    client: Arc<dyn SearchProvider>,
    breaker: Arc<CircuitBreaker>,
}

impl RegisteredProvider {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn client(&self) -> &Arc<dyn SearchProvider> {
        &self.client
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Source of truth for which providers exist and how they are masked.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: Vec<Arc<RegisteredProvider>>,
    index: HashMap<String, usize>,
}

impl ProviderRegistry {
    /// Pairs every configuration entry with its client.
    ///
    /// # Errors
    ///
    /// Fails on duplicate or empty ids, on configuration entries without a
    /// client, and on clients without a configuration entry.
    pub fn new(
        configs: &[ProviderConfig],
        clients: Vec<Arc<dyn SearchProvider>>,
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self, ConfigError> {
        let mut clients_by_id = HashMap::with_capacity(clients.len());
        for client in clients {
            let id = client.id().to_owned();
            if clients_by_id.insert(id.clone(), client).is_some() {
                return Err(ConfigError::DuplicateProvider { id });
            }
        }

        let mut ordered = configs.iter().collect::<Vec<_>>();
        ordered.sort_by(|left, right| {
            left.priority
                .cmp(&right.priority)
                .then_with(|| left.id.cmp(&right.id))
        });

        let mut providers = Vec::with_capacity(ordered.len());
        let mut index = HashMap::with_capacity(ordered.len());

        for (rank, config) in ordered.into_iter().enumerate() {
            if config.id.trim().is_empty() {
                return Err(ConfigError::EmptyProviderId);
            }
            if index.insert(config.id.clone(), rank).is_some() {
                return Err(ConfigError::DuplicateProvider {
                    id: config.id.clone(),
                });
            }
            let client = clients_by_id
                .remove(&config.id)
                .ok_or_else(|| ConfigError::MissingClient {
                    id: config.id.clone(),
                })?;

            providers.push(Arc::new(RegisteredProvider {
                id: config.id.clone(),
                priority: config.priority,
                label: anonymized_label(rank),
                active: AtomicBool::new(config.active),
                client,
                breaker: Arc::new(CircuitBreaker::new(config.id.clone(), breaker_config)),
            }));
        }

        if let Some(id) = clients_by_id.into_keys().min() {
            return Err(ConfigError::UnconfiguredClient { id });
        }

        tracing::debug!(providers = providers.len(), "provider registry built");
        Ok(Self { providers, index })
    }

    /// Providers in dispatch (priority) order.
    pub fn list_providers(&self) -> &[Arc<RegisteredProvider>] {
        &self.providers
    }

    pub fn get(&self, id: &str) -> Option<&Arc<RegisteredProvider>> {
        self.index.get(id).map(|&rank| &self.providers[rank])
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns `false` when `id` is not registered.
    pub fn set_active(&self, id: &str, active: bool) -> bool {
        let Some(provider) = self.get(id) else {
            return false;
        };
        provider.active.store(active, Ordering::Release);
        tracing::info!(provider = id, active, "provider activation changed");
        true
    }

    pub fn mask_label(&self, id: &str) -> Result<&str, SearchError> {
        self.get(id)
            .map(|provider| provider.label())
            .ok_or_else(|| SearchError::UnknownProvider { id: id.to_owned() })
    }

    /// Replaces every provider id in `result_set` with its label, including
    /// mentions inside error messages.
    pub fn mask_result_set(&self, mut result_set: SearchResultSet) -> Result<SearchResultSet, SearchError> {
        for outcome in &mut result_set.outcomes {
            let label = self.mask_label(&outcome.provider_id)?;
            if let Some(message) = outcome.error_message.as_mut() {
                if message.contains(outcome.provider_id.as_str()) {
                    *message = message.replace(outcome.provider_id.as_str(), label);
                }
            }
            outcome.provider_id = label.to_owned();
        }
        Ok(result_set)
    }

    pub fn reconfigure_breakers(&self, config: CircuitBreakerConfig) {
        for provider in &self.providers {
            provider.breaker.reconfigure(config);
        }
    }
}

/// `Source A` … `Source Z`, `Source AA`, `Source AB`, … (bijective base 26).
fn anonymized_label(rank: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = rank + 1;
    while remaining > 0 {
        remaining -= 1;
        letters.push(char::from(b'A' + (remaining % 26) as u8));
        remaining /= 26;
    }
    letters.reverse();
    format!("{LABEL_PREFIX} {}", letters.into_iter().collect::<String>())
}
