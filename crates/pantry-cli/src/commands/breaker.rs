use std::time::Duration;

use pantry_core::{CacheWrite, CircuitState, FallbackOrchestrator, ProviderId, SynthesisConfig};
use serde::Serialize;

use crate::cli::{BreakerArgs, BreakerCommand};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BreakerStatus {
    pub provider: ProviderId,
    pub state: CircuitState,
    pub configured: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BreakerChange {
    provider: ProviderId,
    state: CircuitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_secs: Option<u64>,
    persisted: bool,
}

pub async fn run(
    args: &BreakerArgs,
    orchestrator: &FallbackOrchestrator,
    config: &SynthesisConfig,
) -> Result<CommandResult, CliError> {
    match &args.command {
        BreakerCommand::Status => {
            let statuses = statuses(orchestrator).await;
            Ok(CommandResult::ok(serde_json::to_value(statuses)?))
        }
        BreakerCommand::Trip(trip) => {
            let provider = ProviderId::from(trip.provider);
            let ttl = trip
                .ttl_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.policy_for(provider).breaker_ttl);
            if ttl.is_zero() {
                return Err(CliError::Command(String::from("--ttl-secs must be positive")));
            }

            let write = orchestrator.governor().trip_breaker(provider, ttl).await;
            change(provider, CircuitState::Open, Some(ttl.as_secs()), write)
        }
        BreakerCommand::Reset(reset) => {
            let provider = ProviderId::from(reset.provider);
            let write = orchestrator.governor().reset_breaker(provider).await;
            change(provider, CircuitState::Closed, None, write)
        }
    }
}

pub(super) async fn statuses(orchestrator: &FallbackOrchestrator) -> Vec<BreakerStatus> {
    let configured = orchestrator.configured_providers();
    let mut statuses = Vec::with_capacity(ProviderId::ALL.len());
    for provider in ProviderId::ALL {
        statuses.push(BreakerStatus {
            provider,
            state: orchestrator.governor().breaker_state(provider).await,
            configured: configured.contains(&provider),
        });
    }
    statuses
}

fn change(
    provider: ProviderId,
    state: CircuitState,
    ttl_secs: Option<u64>,
    write: CacheWrite,
) -> Result<CommandResult, CliError> {
    let persisted = write == CacheWrite::Ack;
    let data = serde_json::to_value(BreakerChange {
        provider,
        state,
        ttl_secs,
        persisted,
    })?;

    let result = CommandResult::ok(data);
    if persisted {
        Ok(result)
    } else {
        Ok(result.with_warning(format!(
            "breaker change for '{provider}' was not persisted: cache degraded"
        )))
    }
}
