use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::adapters::{
    FailureKind, GeminiAdapter, ImageSource, ProviderFailure, RecipeSource, SpoonacularAdapter,
    UnsplashAdapter,
};
use crate::cache::{CacheWrite, TimedCache};
use crate::config::{ProviderKeys, SynthesisConfig};
use crate::emergency::synthesize_emergency;
use crate::error::{ConfigError, SynthesisError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider_policy::ProviderPolicy;
use crate::quota::QuotaGovernor;
use crate::redis_backend::RedisBackend;
use crate::retry::Backoff;
use crate::throttling::Pacer;
use crate::{Provenance, ProviderId, SynthesisRequest, SynthesisResult};

/// How a single provider attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { code: &'static str, message: String },
    TimedOut { timeout_ms: u64 },
}

impl AttemptOutcome {
    fn failed(failure: &ProviderFailure) -> Self {
        Self::Failed {
            code: failure.code(),
            message: failure.message().to_owned(),
        }
    }
}

/// One entry of the ordered attempt trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub provider: ProviderId,
    pub attempt: u32,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
}

/// Full account of one synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisReport {
    pub request_id: Uuid,
    pub cache_key: String,
    pub result: SynthesisResult,
    pub attempts: Vec<AttemptRecord>,
    pub warnings: Vec<String>,
    pub latency_ms: u64,
}

impl SynthesisReport {
    /// Attempts made against a specific provider.
    pub fn attempts_for(&self, provider: ProviderId) -> usize {
        self.attempts
            .iter()
            .filter(|record| record.provider == provider)
            .count()
    }
}

#[derive(Default)]
struct Trail {
    attempts: Vec<AttemptRecord>,
    warnings: Vec<String>,
}

impl Trail {
    fn record(&mut self, provider: ProviderId, attempt: u32, outcome: AttemptOutcome, latency_ms: u64) {
        self.attempts.push(AttemptRecord {
            provider,
            attempt,
            outcome,
            latency_ms,
        });
    }

    fn failed_attempts(&self) -> usize {
        self.attempts
            .iter()
            .filter(|record| record.outcome != AttemptOutcome::Succeeded)
            .count()
    }
}

struct RecipeStage {
    source: Arc<dyn RecipeSource>,
    policy: ProviderPolicy,
}

struct MediaStage {
    source: Arc<dyn ImageSource>,
    policy: ProviderPolicy,
}

/// Cache, then primary, then secondary, then emergency.
///
/// Every request completes with a [`SynthesisResult`]; the only error a
/// caller can see is [`SynthesisError::InvalidRequest`].
pub struct FallbackOrchestrator {
    cache: TimedCache,
    governor: Arc<QuotaGovernor>,
    primary: Option<RecipeStage>,
    secondary: Option<RecipeStage>,
    media: Option<MediaStage>,
    recipe_ttl: Duration,
}

impl FallbackOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn cache(&self) -> &TimedCache {
        &self.cache
    }

    pub fn governor(&self) -> &Arc<QuotaGovernor> {
        &self.governor
    }

    /// Providers wired into the chain, in call order.
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        let recipe = [&self.primary, &self.secondary]
            .into_iter()
            .flatten()
            .map(|stage| stage.source.id());
        recipe
            .chain(self.media.iter().map(|stage| stage.source.id()))
            .collect()
    }

    pub fn recipe_ttl(&self) -> Duration {
        self.recipe_ttl
    }

    /// Validates the inputs and runs the pipeline.
    ///
    /// # Errors
    ///
    /// [`SynthesisError::InvalidRequest`] when the ingredients and dish name
    /// are both empty or exceed the size limits.
    pub async fn synthesize<I, S>(
        &self,
        ingredients: I,
        dish_name: Option<&str>,
    ) -> Result<SynthesisResult, SynthesisError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let request = SynthesisRequest::new(ingredients, dish_name)?;
        Ok(self.synthesize_request(&request).await.result)
    }

    pub async fn synthesize_request(&self, request: &SynthesisRequest) -> SynthesisReport {
        let request_id = Uuid::new_v4();
        let cache_key = request.cache_key();
        let span = info_span!("synthesize", %request_id, cache_key = %cache_key);

        async move {
            let started = Instant::now();
            let mut trail = Trail::default();
            let result = self.run(request, cache_key.as_str(), &mut trail).await;

            info!(
                provenance = result.provenance.as_str(),
                source = %result.source,
                attempts = trail.attempts.len(),
                latency_ms = elapsed_ms(started),
                "synthesis complete"
            );

            SynthesisReport {
                request_id,
                cache_key: cache_key.into(),
                result,
                attempts: trail.attempts,
                warnings: trail.warnings,
                latency_ms: elapsed_ms(started),
            }
        }
        .instrument(span)
        .await
    }

    /// Drops the cached result for `request`.
    pub async fn evict(&self, request: &SynthesisRequest) -> CacheWrite {
        self.cache.delete(request.cache_key().as_str()).await
    }

    async fn run(&self, request: &SynthesisRequest, cache_key: &str, trail: &mut Trail) -> SynthesisResult {
        if let Some(cached) = self.cache.get_as::<SynthesisResult>(cache_key).await {
            debug!("served from cache");
            return cached.with_provenance(Provenance::Cache);
        }

        let stages = [
            (self.primary.as_ref(), Provenance::PrimaryProvider, "primary"),
            (self.secondary.as_ref(), Provenance::SecondaryProvider, "secondary"),
        ];

        for (stage, role, label) in stages {
            let Some(stage) = stage else {
                debug!(stage = label, "no provider configured");
                continue;
            };
            let provider = stage.source.id();

            if self.governor.is_breaker_open(provider).await {
                info!(provider = provider.as_str(), stage = label, "quota breaker open; skipping provider");
                trail
                    .warnings
                    .push(format!("{label} provider '{provider}' skipped: quota breaker open"));
                continue;
            }

            let metered = role == Provenance::PrimaryProvider;
            if let Some(result) = self.run_stage(stage, role, metered, request, trail).await {
                let failed = trail.failed_attempts();
                if failed > 0 {
                    trail.warnings.push(format!(
                        "provider fallback succeeded with '{provider}' after {failed} failed attempt(s)"
                    ));
                }
                let result = self.enrich_media(result, trail).await;
                self.write_through(cache_key, &result, trail).await;
                return result;
            }
        }

        warn!("all providers failed; using emergency synthesis");
        trail
            .warnings
            .push(String::from("all providers failed; returned emergency recipe (not cached)"));
        synthesize_emergency(request)
    }

    async fn run_stage(
        &self,
        stage: &RecipeStage,
        role: Provenance,
        metered: bool,
        request: &SynthesisRequest,
        trail: &mut Trail,
    ) -> Option<SynthesisResult> {
        let provider = stage.source.id();
        let retry = stage.policy.retry;

        for attempt in retry.attempts() {
            if metered && !self.governor.try_consume_primary_quota() {
                info!(provider = provider.as_str(), attempt, "daily primary quota exhausted; moving on");
                trail
                    .warnings
                    .push(format!("'{provider}' not attempted: daily primary quota exhausted"));
                return None;
            }

            let delay = retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let started = Instant::now();
            let outcome =
                tokio::time::timeout(stage.policy.attempt_timeout, stage.source.attempt(request, attempt))
                    .await;
            let latency_ms = elapsed_ms(started);

            match outcome {
                Ok(Ok(result)) => {
                    info!(provider = provider.as_str(), attempt, latency_ms, "provider attempt succeeded");
                    trail.record(provider, attempt, AttemptOutcome::Succeeded, latency_ms);
                    return Some(result.with_provenance(role));
                }
                Ok(Err(failure)) => {
                    warn!(
                        provider = provider.as_str(),
                        attempt,
                        code = failure.code(),
                        message = failure.message(),
                        "provider attempt failed"
                    );
                    trail.record(provider, attempt, AttemptOutcome::failed(&failure), latency_ms);

                    if failure.kind() == FailureKind::QuotaExceeded {
                        let ttl = stage.policy.breaker_ttl;
                        self.governor.trip_breaker(provider, ttl).await;
                        trail.warnings.push(format!(
                            "'{provider}' reported quota exhaustion; disabled for {}s",
                            ttl.as_secs()
                        ));
                        return None;
                    }
                }
                Err(_) => {
                    let timeout_ms = duration_ms(stage.policy.attempt_timeout);
                    warn!(provider = provider.as_str(), attempt, timeout_ms, "provider attempt timed out");
                    trail.record(provider, attempt, AttemptOutcome::TimedOut { timeout_ms }, latency_ms);
                }
            }
        }

        None
    }

    async fn enrich_media(&self, mut result: SynthesisResult, trail: &mut Trail) -> SynthesisResult {
        let Some(media) = &self.media else {
            return result;
        };
        if !result.has_placeholder_image() {
            return result;
        }

        let provider = media.source.id();
        if self.governor.is_breaker_open(provider).await {
            debug!(provider = provider.as_str(), "media breaker open; keeping placeholder image");
            return result;
        }

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(media.policy.attempt_timeout, media.source.lookup(&result.title)).await;
        let latency_ms = elapsed_ms(started);

        match outcome {
            Ok(Ok(Some(url))) => {
                trail.record(provider, 1, AttemptOutcome::Succeeded, latency_ms);
                result.image_url = url;
            }
            Ok(Ok(None)) => {
                debug!(provider = provider.as_str(), "no image found");
                trail.record(provider, 1, AttemptOutcome::Succeeded, latency_ms);
            }
            Ok(Err(failure)) => {
                warn!(provider = provider.as_str(), code = failure.code(), "image lookup failed");
                trail.record(provider, 1, AttemptOutcome::failed(&failure), latency_ms);
                if failure.kind() == FailureKind::QuotaExceeded {
                    self.governor
                        .trip_breaker(provider, media.policy.breaker_ttl)
                        .await;
                }
            }
            Err(_) => {
                let timeout_ms = duration_ms(media.policy.attempt_timeout);
                warn!(provider = provider.as_str(), timeout_ms, "image lookup timed out");
                trail.record(provider, 1, AttemptOutcome::TimedOut { timeout_ms }, latency_ms);
            }
        }

        result
    }

    async fn write_through(&self, cache_key: &str, result: &SynthesisResult, trail: &mut Trail) {
        if self.cache.set_json(cache_key, result, self.recipe_ttl).await == CacheWrite::Degraded {
            trail
                .warnings
                .push(String::from("result was not cached: cache degraded"));
        }
    }
}

/// Assembles a [`FallbackOrchestrator`] from configuration, credentials and
/// optional injected parts.
///
/// Providers are wired in when a key is present or an implementation is
/// injected; everything else is left out of the chain.
///
/// ```rust,ignore
/// use pantry_core::OrchestratorBuilder;
///
/// // Keys, quota and REDIS_URL from the environment:
/// let orchestrator = OrchestratorBuilder::from_env()?.build()?;
///
/// // Fully injected, e.g. for tests:
/// let orchestrator = OrchestratorBuilder::new()
///     .with_primary(primary)
///     .with_secondary(secondary)
///     .build()?;
/// ```
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: SynthesisConfig,
    keys: ProviderKeys,
    http_client: Option<Arc<dyn HttpClient>>,
    cache: Option<TimedCache>,
    governor: Option<Arc<QuotaGovernor>>,
    primary: Option<Arc<dyn RecipeSource>>,
    secondary: Option<Arc<dyn RecipeSource>>,
    media: Option<Arc<dyn ImageSource>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration and provider keys from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            config: SynthesisConfig::from_env()?,
            keys: ProviderKeys::from_env(),
            ..Self::default()
        })
    }

    pub fn with_config(mut self, config: SynthesisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config_mut(&mut self) -> &mut SynthesisConfig {
        &mut self.config
    }

    pub fn with_keys(mut self, keys: ProviderKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_cache(mut self, cache: TimedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_governor(mut self, governor: Arc<QuotaGovernor>) -> Self {
        self.governor = Some(governor);
        self
    }

    pub fn with_primary(mut self, source: Arc<dyn RecipeSource>) -> Self {
        self.primary = Some(source);
        self
    }

    pub fn with_secondary(mut self, source: Arc<dyn RecipeSource>) -> Self {
        self.secondary = Some(source);
        self
    }

    pub fn with_media(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.media = Some(source);
        self
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidRedisUrl`] when a Redis URL is configured but
    /// cannot be parsed.
    pub fn build(self) -> Result<FallbackOrchestrator, ConfigError> {
        let config = self.config;

        let cache = match self.cache {
            Some(cache) => cache,
            None => open_cache(&config)?,
        };

        let governor = match self.governor {
            Some(governor) => governor,
            None => {
                let mut governor = QuotaGovernor::new(config.daily_primary_quota, cache.clone());
                if let Some(limit) = config.pacing_per_minute {
                    governor = governor.with_pacer(Pacer::per_minute(limit));
                }
                Arc::new(governor)
            }
        };

        let http_client: Arc<dyn HttpClient> = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));

        let gemini_policy = config.policy_for(ProviderId::Gemini);
        let primary = self
            .primary
            .or_else(|| {
                self.keys.gemini.as_ref().map(|key| {
                    Arc::new(
                        GeminiAdapter::new(Arc::clone(&http_client), key.as_str())
                            .with_timeout_ms(duration_ms(gemini_policy.attempt_timeout)),
                    ) as Arc<dyn RecipeSource>
                })
            })
            .map(|source| RecipeStage {
                policy: config.policy_for(source.id()),
                source,
            });

        let spoonacular_policy = config.policy_for(ProviderId::Spoonacular);
        let secondary = self
            .secondary
            .or_else(|| {
                self.keys.spoonacular.as_ref().map(|key| {
                    Arc::new(
                        SpoonacularAdapter::new(Arc::clone(&http_client), key.as_str())
                            .with_timeout_ms(duration_ms(spoonacular_policy.attempt_timeout)),
                    ) as Arc<dyn RecipeSource>
                })
            })
            .map(|source| RecipeStage {
                policy: config.policy_for(source.id()),
                source,
            });

        let unsplash_policy = config.policy_for(ProviderId::Unsplash);
        let media = self
            .media
            .or_else(|| {
                self.keys.unsplash.as_ref().map(|key| {
                    Arc::new(
                        UnsplashAdapter::new(Arc::clone(&http_client), key.as_str())
                            .with_timeout_ms(duration_ms(unsplash_policy.attempt_timeout)),
                    ) as Arc<dyn ImageSource>
                })
            })
            .map(|source| MediaStage {
                policy: config.policy_for(source.id()),
                source,
            });

        let orchestrator = FallbackOrchestrator {
            cache,
            governor,
            primary,
            secondary,
            media,
            recipe_ttl: config.recipe_ttl(),
        };
        info!(
            providers = ?orchestrator.configured_providers(),
            cache = orchestrator.cache.backend_name(),
            "fallback orchestrator ready"
        );
        Ok(orchestrator)
    }
}

fn open_cache(config: &SynthesisConfig) -> Result<TimedCache, ConfigError> {
    let cache = match config.redis_url.as_deref() {
        Some(url) => {
            let backend = Arc::new(RedisBackend::open(url)?);
            if tokio::runtime::Handle::try_current().is_ok() {
                Arc::clone(&backend).spawn_connect(Backoff::default());
            } else {
                warn!("no async runtime while building; redis cache stays not-ready");
            }
            TimedCache::new(backend)
        }
        None => TimedCache::in_memory(),
    };
    Ok(cache.with_timeouts(config.cache_operation_timeout(), config.cache_liveness_timeout()))
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}
