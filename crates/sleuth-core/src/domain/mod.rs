//! # Domain Models
//!
//! Typed request and result shapes shared by the orchestrator, the
//! recovery coordinator and the search facade.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SearchType`] | Kind of identifier being looked up |
//! | [`SearchRequest`] | One logical query |
//! | [`Record`] | A single provider record, provider-neutral |
//! | [`ProviderOutcome`] | What one provider produced for one query |
//! | [`SearchResultSet`] | Priority-ordered aggregate of all outcomes |
//!
//! Requests and result sets are created fresh per call and owned by the
//! caller afterwards; nothing here is retained by the core.

mod outcome;
mod record;
mod request;

pub use outcome::{OutcomeStatus, ProviderOutcome, SearchResultSet};
pub use record::Record;
pub use request::{SearchRequest, SearchType};
