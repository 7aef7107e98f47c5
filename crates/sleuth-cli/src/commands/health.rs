use serde::Serialize;
use serde_json::Value;
use sleuth_core::{SearchCoordinator, SystemHealth};

use crate::error::CliError;

#[derive(Debug, Serialize)]
struct HealthData {
    #[serde(flatten)]
    health: SystemHealth,
    degraded_service_possible: bool,
}

pub async fn run(coordinator: &SearchCoordinator) -> Result<Value, CliError> {
    let health = coordinator.system_health().await;
    let degraded_service_possible = coordinator.can_provide_degraded_service().await;
    tracing::info!(
        status = health.status.as_str(),
        available = health.available_count,
        total = health.total_count,
        "system health checked"
    );

    Ok(serde_json::to_value(HealthData {
        health,
        degraded_service_possible,
    })?)
}
