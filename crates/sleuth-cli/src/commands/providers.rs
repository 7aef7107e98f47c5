use serde::Serialize;
use serde_json::Value;
use sleuth_core::{ProviderStatus, SearchCoordinator};

use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ProvidersData {
    total: usize,
    usable: usize,
    providers: Vec<ProviderStatus>,
}

pub async fn run(coordinator: &SearchCoordinator) -> Result<Value, CliError> {
    let providers = coordinator.provider_statuses().await?;
    let usable = providers.iter().filter(|status| status.is_usable()).count();

    Ok(serde_json::to_value(ProvidersData {
        total: providers.len(),
        usable,
        providers,
    })?)
}
