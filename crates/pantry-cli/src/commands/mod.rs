mod breaker;
mod cache;
mod quota;
mod synthesize;

use std::sync::Arc;

use pantry_core::{
    FallbackOrchestrator, OrchestratorBuilder, ProviderKeys, RedisBackend, SynthesisConfig,
    SynthesisRequest, TimedCache,
};
use serde_json::Value;
use tracing::warn;

use crate::cli::{Cli, Command, RequestArgs};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let config = load_config(cli)?;
    let orchestrator = open_orchestrator(&config).await?;

    match &cli.command {
        Command::Synthesize(args) => synthesize::run(args, &orchestrator).await,
        Command::Breaker(args) => breaker::run(args, &orchestrator, &config).await,
        Command::Quota => quota::run(&orchestrator).await,
        Command::Cache(args) => cache::run(args, &orchestrator).await,
    }
}

/// Document, then environment, then flags.
fn load_config(cli: &Cli) -> Result<SynthesisConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => {
            let document =
                std::fs::read_to_string(path).map_err(|source| CliError::ConfigFile {
                    path: path.display().to_string(),
                    source,
                })?;
            SynthesisConfig::from_json(&document)?
        }
        None => SynthesisConfig::default(),
    };

    config.apply_env_with(|name: &str| std::env::var(name).ok())?;

    if let Some(url) = &cli.redis_url {
        config.redis_url = Some(url.clone());
    }
    if let Some(limit) = cli.daily_quota {
        config.daily_primary_quota = limit;
    }

    Ok(config)
}

/// A one-shot process cannot wait for the background reconnect loop, so the
/// Redis connection is attempted once up front, bounded by the liveness
/// timeout. On failure the cache simply stays degraded.
async fn open_orchestrator(config: &SynthesisConfig) -> Result<FallbackOrchestrator, CliError> {
    let mut builder = OrchestratorBuilder::new()
        .with_config(config.clone())
        .with_keys(ProviderKeys::from_env());

    if let Some(url) = config.redis_url.as_deref() {
        let backend = Arc::new(RedisBackend::open(url)?);
        match tokio::time::timeout(config.cache_liveness_timeout(), backend.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%error, "redis unavailable; continuing with a degraded cache"),
            Err(_) => warn!("redis connect timed out; continuing with a degraded cache"),
        }
        builder = builder.with_cache(
            TimedCache::new(backend)
                .with_timeouts(config.cache_operation_timeout(), config.cache_liveness_timeout()),
        );
    }

    Ok(builder.build()?)
}

fn parse_request(args: &RequestArgs) -> Result<SynthesisRequest, CliError> {
    Ok(SynthesisRequest::new(&args.ingredients, args.dish.as_deref())?)
}
