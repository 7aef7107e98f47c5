use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Record, SearchRequest, SearchType};
use crate::provider::{ErrorCode, ProviderResponse};
use crate::SearchError;

pub(crate) const CIRCUIT_OPEN_MESSAGE: &str = "Circuit breaker is open";
pub(crate) const CANCELLED_MESSAGE: &str = "search cancelled";

/// Terminal status of one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    NoData,
    Error,
    Timeout,
    CircuitOpen,
}

impl OutcomeStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoData => "no_data",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::CircuitOpen => "circuit_open",
        }
    }

    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Timeout | Self::CircuitOpen)
    }
}

/// What a single provider produced for a single query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderOutcome {
    pub provider_id: String,
    pub status: OutcomeStatus,
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    pub response_time_ms: u64,
}

impl ProviderOutcome {
    /// Translates a normalized provider response.
    pub fn from_response(
        provider_id: impl Into<String>,
        response: ProviderResponse,
        response_time_ms: u64,
    ) -> Self {
        let provider_id = provider_id.into();
        if !response.success {
            return Self {
                provider_id,
                status: OutcomeStatus::Error,
                records: Vec::new(),
                error_message: Some(
                    response
                        .error
                        .unwrap_or_else(|| String::from("provider reported a failure")),
                ),
                error_code: Some(response.error_code.unwrap_or(ErrorCode::UnknownError)),
                response_time_ms,
            };
        }

        let records = response.data.unwrap_or_default();
        let status = if records.is_empty() {
            OutcomeStatus::NoData
        } else {
            OutcomeStatus::Success
        };

        Self {
            provider_id,
            status,
            records,
            error_message: None,
            error_code: None,
            response_time_ms,
        }
    }

    pub fn timeout(provider_id: impl Into<String>, limit: Duration, response_time_ms: u64) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: OutcomeStatus::Timeout,
            records: Vec::new(),
            error_message: Some(format!(
                "provider did not respond within {}ms",
                limit.as_millis()
            )),
            error_code: Some(ErrorCode::TimeoutError),
            response_time_ms,
        }
    }

    pub fn circuit_open(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: OutcomeStatus::CircuitOpen,
            records: Vec::new(),
            error_message: Some(String::from(CIRCUIT_OPEN_MESSAGE)),
            error_code: Some(ErrorCode::ProviderUnavailable),
            response_time_ms: 0,
        }
    }

    pub fn cancelled(provider_id: impl Into<String>, response_time_ms: u64) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: OutcomeStatus::Error,
            records: Vec::new(),
            error_message: Some(String::from(CANCELLED_MESSAGE)),
            error_code: None,
            response_time_ms,
        }
    }

    pub const fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    pub fn has_data(&self) -> bool {
        !self.records.is_empty()
    }
}

/// Aggregate of one fan-out, outcomes in provider priority order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultSet {
    pub search_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub query: String,
    pub search_type: SearchType,
    pub outcomes: Vec<ProviderOutcome>,
    pub total_providers_searched: usize,
    pub total_providers_with_data: usize,
    pub total_records: usize,
    pub search_duration_ms: u64,
    pub is_degraded: bool,
}

impl SearchResultSet {
    /// Builds the aggregate and its totals from priority-ordered outcomes.
    pub fn assemble(
        request: &SearchRequest,
        outcomes: Vec<ProviderOutcome>,
        search_duration_ms: u64,
    ) -> Self {
        let total_records = outcomes
            .iter()
            .filter(|outcome| outcome.status == OutcomeStatus::Success)
            .map(|outcome| outcome.records.len())
            .sum();
        let total_providers_with_data = outcomes.iter().filter(|outcome| outcome.has_data()).count();

        Self {
            search_id: Uuid::new_v4(),
            timestamp: OffsetDateTime::now_utc(),
            query: request.value.clone(),
            search_type: request.search_type,
            total_providers_searched: outcomes.len(),
            total_providers_with_data,
            total_records,
            outcomes,
            search_duration_ms,
            is_degraded: false,
        }
    }

    /// True when no provider produced a usable answer (data or a clean miss).
    pub fn is_total_failure(&self) -> bool {
        self.outcomes.iter().all(ProviderOutcome::is_failure)
    }

    pub fn failed_provider_ids(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_failure())
            .map(|outcome| outcome.provider_id.clone())
            .collect()
    }

    pub fn outcome(&self, provider_id: &str) -> Option<&ProviderOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.provider_id == provider_id)
    }

    /// Summarizes a totally failed fan-out as a single classified error.
    pub fn failure_error(&self) -> SearchError {
        let all = |status: OutcomeStatus| self.outcomes.iter().all(|o| o.status == status);

        if all(OutcomeStatus::CircuitOpen) {
            return SearchError::CircuitOpen;
        }

        let provider_error = self
            .outcomes
            .iter()
            .find(|outcome| outcome.status == OutcomeStatus::Error);

        match provider_error {
            Some(outcome) => SearchError::Provider {
                code: outcome.error_code.unwrap_or(ErrorCode::UnknownError),
                message: outcome
                    .error_message
                    .clone()
                    .unwrap_or_else(|| String::from("provider reported a failure")),
            },
            None => SearchError::Timeout {
                elapsed_ms: self.search_duration_ms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SearchRequest {
        SearchRequest::new(SearchType::Phone, "+15550100").expect("valid")
    }

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|index| Record::new().with_field("index", index))
            .collect()
    }

    #[test]
    fn totals_count_only_successful_records() {
        let outcomes = vec![
            ProviderOutcome::from_response("p1", ProviderResponse::found("p1", records(2)), 10),
            ProviderOutcome::from_response("p2", ProviderResponse::empty("p2"), 12),
            ProviderOutcome::from_response(
                "p3",
                ProviderResponse::failed("p3", ErrorCode::NetworkError, "reset"),
                7,
            ),
            ProviderOutcome::from_response("p4", ProviderResponse::found("p4", records(3)), 9),
        ];

        let set = SearchResultSet::assemble(&request(), outcomes, 15);

        assert_eq!(set.total_providers_searched, 4);
        assert_eq!(set.total_providers_with_data, 2);
        assert_eq!(set.total_records, 5);
        assert!(!set.is_total_failure());
        assert_eq!(set.failed_provider_ids(), vec![String::from("p3")]);
    }

    #[test]
    fn successful_response_without_records_is_no_data() {
        let outcome =
            ProviderOutcome::from_response("p1", ProviderResponse::found("p1", Vec::new()), 3);
        assert_eq!(outcome.status, OutcomeStatus::NoData);
        assert!(!outcome.is_failure());
    }

    #[test]
    fn failure_error_prefers_provider_code_over_timeouts() {
        let outcomes = vec![
            ProviderOutcome::timeout("p1", Duration::from_millis(50), 50),
            ProviderOutcome::from_response(
                "p2",
                ProviderResponse::failed("p2", ErrorCode::RateLimit, "slow down"),
                4,
            ),
        ];
        let set = SearchResultSet::assemble(&request(), outcomes, 50);

        assert!(set.is_total_failure());
        assert_eq!(
            set.failure_error(),
            SearchError::Provider {
                code: ErrorCode::RateLimit,
                message: String::from("slow down"),
            }
        );
    }

    #[test]
    fn failure_error_reports_timeout_and_open_circuits() {
        let timeouts = SearchResultSet::assemble(
            &request(),
            vec![ProviderOutcome::timeout("p1", Duration::from_millis(5), 5)],
            5,
        );
        assert_eq!(timeouts.failure_error(), SearchError::Timeout { elapsed_ms: 5 });

        let open = SearchResultSet::assemble(
            &request(),
            vec![ProviderOutcome::circuit_open("p1")],
            0,
        );
        assert_eq!(open.failure_error(), SearchError::CircuitOpen);
    }

    #[test]
    fn result_set_serializes_rfc3339_timestamp_and_snake_case_status() {
        let set = SearchResultSet::assemble(
            &request(),
            vec![ProviderOutcome::circuit_open("p1")],
            0,
        );
        let json = serde_json::to_value(&set).expect("serializable");

        assert!(json["timestamp"].as_str().is_some());
        assert_eq!(json["outcomes"][0]["status"], "circuit_open");
        assert_eq!(json["search_type"], "phone");
    }
}
