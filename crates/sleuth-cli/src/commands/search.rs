use serde_json::Value;
use sleuth_core::{SearchCoordinator, SearchRequest};

use crate::cli::SearchArgs;
use crate::error::CliError;

pub async fn run(args: &SearchArgs, coordinator: &SearchCoordinator) -> Result<Value, CliError> {
    let request = SearchRequest::new(args.search_type, args.value.as_str())?;
    let response = coordinator.search(&request).await?;

    if let Some(strategy) = response.recovery {
        tracing::info!(strategy = strategy.as_str(), "search answered by recovery");
    }

    Ok(serde_json::to_value(response)?)
}
