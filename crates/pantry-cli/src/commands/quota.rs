use pantry_core::{FallbackOrchestrator, QuotaUsage};
use serde::Serialize;

use crate::error::CliError;

use super::breaker::{statuses, BreakerStatus};
use super::CommandResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotaReport {
    primary: QuotaUsage,
    breakers: Vec<BreakerStatus>,
}

/// The daily counter lives in process memory, so a fresh CLI process always
/// starts from zero; breaker flags come from the shared cache.
pub async fn run(orchestrator: &FallbackOrchestrator) -> Result<CommandResult, CliError> {
    let report = QuotaReport {
        primary: orchestrator.governor().usage(),
        breakers: statuses(orchestrator).await,
    };
    Ok(CommandResult::ok(serde_json::to_value(report)?))
}
