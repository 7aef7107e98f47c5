use serde_json::{json, Value};
use sleuth_core::SearchCoordinator;

use crate::error::CliError;

pub fn run(coordinator: &SearchCoordinator) -> Result<Value, CliError> {
    let breakers = coordinator.breaker_states()?;
    let open = breakers.iter().filter(|status| status.snapshot.open).count();
    for status in breakers.iter().filter(|status| status.snapshot.open) {
        tracing::warn!(
            provider = %status.provider_id,
            state = status.snapshot.state.as_str(),
            failures = status.snapshot.failure_count,
            "circuit breaker open"
        );
    }

    Ok(json!({
        "open": open,
        "breakers": breakers,
    }))
}
