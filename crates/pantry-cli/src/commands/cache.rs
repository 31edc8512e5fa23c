use pantry_core::{CacheWrite, FallbackOrchestrator};
use serde_json::json;

use crate::cli::{CacheArgs, CacheCommand};
use crate::error::CliError;

use super::{parse_request, CommandResult};

pub async fn run(args: &CacheArgs, orchestrator: &FallbackOrchestrator) -> Result<CommandResult, CliError> {
    let cache = orchestrator.cache();

    match &args.command {
        CacheCommand::Ping => {
            let alive = cache.ping().await;
            let result = CommandResult::ok(json!({
                "backend": cache.backend_name(),
                "alive": alive,
            }));
            if alive {
                Ok(result)
            } else {
                Ok(result.with_warning("cache did not answer within the liveness timeout"))
            }
        }
        CacheCommand::Evict(request_args) => {
            let request = parse_request(request_args)?;
            let key = request.cache_key();
            let evicted = orchestrator.evict(&request).await == CacheWrite::Ack;
            let result = CommandResult::ok(json!({
                "key": key.as_str(),
                "evicted": evicted,
            }));
            if evicted {
                Ok(result)
            } else {
                Ok(result.with_warning("eviction not confirmed: cache degraded"))
            }
        }
    }
}
