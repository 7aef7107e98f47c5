use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::{Record, SearchType};
use crate::provider::{ErrorCode, ProviderFuture, ProviderResponse, SearchProvider};

/// One scripted answer of a [`FixtureProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureResponse {
    /// A single record echoing the query and search type.
    Echo,
    Records(Vec<Record>),
    Empty,
    Failure { code: ErrorCode, message: String },
    /// Never resolves; the caller's timeout decides the outcome.
    Hang,
}

impl FixtureResponse {
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Failure {
            code,
            message: message.into(),
        }
    }
}

/// Deterministic in-memory provider for tests and the CLI demo mode.
///
/// Scripted responses are consumed first, in push order; once the script
/// runs dry every call gets the default response.
#[derive(Debug)]
pub struct FixtureProvider {
    id: String,
    default_response: Mutex<FixtureResponse>,
    script: Mutex<VecDeque<FixtureResponse>>,
    latency: Duration,
    available: AtomicBool,
    panic_on_availability_check: bool,
    calls: AtomicUsize,
}

impl FixtureProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_response: Mutex::new(FixtureResponse::Echo),
            script: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
            available: AtomicBool::new(true),
            panic_on_availability_check: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_response(self, response: FixtureResponse) -> Self {
        self.set_response(response);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn unavailable(self) -> Self {
        self.set_available(false);
        self
    }

    /// Makes `is_available` panic, simulating a broken status probe.
    pub fn panicking_availability_check(mut self) -> Self {
        self.panic_on_availability_check = true;
        self
    }

    pub fn set_response(&self, response: FixtureResponse) {
        *lock(&self.default_response) = response;
    }

    pub fn push_response(&self, response: FixtureResponse) {
        lock(&self.script).push_back(response);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Number of `search` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    fn next_response(&self) -> FixtureResponse {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.default_response).clone())
    }
}

fn echo(query: &str, search_type: SearchType) -> Record {
    Record::new()
        .with_field("query", query)
        .with_field("search_type", search_type.as_str())
        .with_field("fixture", true)
}

impl SearchProvider for FixtureProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        search_type: SearchType,
    ) -> ProviderFuture<'a, ProviderResponse> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::AcqRel);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            match self.next_response() {
                FixtureResponse::Echo => {
                    ProviderResponse::found(self.id.as_str(), vec![echo(query, search_type)])
                }
                FixtureResponse::Records(records) => {
                    ProviderResponse::found(self.id.as_str(), records)
                }
                FixtureResponse::Empty => ProviderResponse::empty(self.id.as_str()),
                FixtureResponse::Failure { code, message } => {
                    ProviderResponse::failed(self.id.as_str(), code, message)
                }
                FixtureResponse::Hang => std::future::pending().await,
            }
        })
    }

    fn is_available(&self) -> ProviderFuture<'_, bool> {
        Box::pin(async move {
            if self.panic_on_availability_check {
                panic!("availability probe for '{}' crashed", self.id);
            }
            self.available.load(Ordering::Acquire)
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_query_by_default() {
        let provider = FixtureProvider::new("p1");

        let response = provider.search("+15550100", SearchType::Phone).await;

        assert!(response.success);
        let records = response.data.expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("query"), Some(&serde_json::json!("+15550100")));
        assert_eq!(records[0].get("search_type"), Some(&serde_json::json!("phone")));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn scripted_responses_run_before_default() {
        let provider = FixtureProvider::new("p1").with_response(FixtureResponse::Empty);
        provider.push_response(FixtureResponse::failure(ErrorCode::RateLimit, "slow down"));

        let first = provider.search("a@b.test", SearchType::Email).await;
        let second = provider.search("a@b.test", SearchType::Email).await;

        assert_eq!(first.error_code, Some(ErrorCode::RateLimit));
        assert!(second.success);
        assert!(second.data.is_none());
    }

    #[tokio::test]
    async fn availability_flag_can_be_flipped() {
        let provider = FixtureProvider::new("p1").unavailable();
        assert!(!provider.is_available().await);

        provider.set_available(true);
        assert!(provider.is_available().await);
    }
}
