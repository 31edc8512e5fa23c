//! Runtime configuration for the synthesis pipeline.
//!
//! Every field has a default, so an empty JSON object is a valid document.
//! Environment variables are read with a `PANTRY_` prefixed name first and
//! the bare vendor name second, e.g. `PANTRY_GEMINI_API_KEY` then
//! `GEMINI_API_KEY`.

use std::env;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::MAX_ENTRY_TTL;
use crate::error::ConfigError;
use crate::provider_policy::ProviderPolicy;
use crate::retry::{Backoff, RetryPolicy};
use crate::ProviderId;

pub const DEFAULT_DAILY_PRIMARY_QUOTA: u32 = 50;
pub const DEFAULT_PACING_PER_MINUTE: u32 = 15;
pub const DEFAULT_RECIPE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Per-provider overrides; unset fields fall back to [`ProviderPolicy::default_for`].
///
/// `max_attempts` can lower a provider's attempt budget but never raise it
/// above the default, and breaker TTLs are capped at [`MAX_ENTRY_TTL`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderOverrides {
    pub max_attempts: Option<u32>,
    pub attempt_timeout_ms: Option<u64>,
    pub breaker_ttl_secs: Option<u64>,
    pub backoff: Option<Backoff>,
}

impl ProviderOverrides {
    pub fn resolve(&self, provider_id: ProviderId) -> ProviderPolicy {
        let base = ProviderPolicy::default_for(provider_id);
        let max_attempts = self
            .max_attempts
            .unwrap_or(base.retry.max_attempts)
            .clamp(1, base.retry.max_attempts);
        let backoff = self.backoff.unwrap_or(base.retry.backoff);

        ProviderPolicy {
            provider_id,
            retry: RetryPolicy::new(max_attempts, backoff),
            attempt_timeout: self
                .attempt_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.attempt_timeout),
            breaker_ttl: self
                .breaker_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(base.breaker_ttl)
                .min(MAX_ENTRY_TTL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisConfig {
    pub daily_primary_quota: u32,
    /// Short-window pacing in front of the daily counter. `None` disables it.
    pub pacing_per_minute: Option<u32>,
    pub cache_operation_timeout_ms: u64,
    pub cache_liveness_timeout_ms: u64,
    pub recipe_ttl_secs: u64,
    pub redis_url: Option<String>,
    pub gemini: ProviderOverrides,
    pub spoonacular: ProviderOverrides,
    pub unsplash: ProviderOverrides,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            daily_primary_quota: DEFAULT_DAILY_PRIMARY_QUOTA,
            pacing_per_minute: Some(DEFAULT_PACING_PER_MINUTE),
            cache_operation_timeout_ms: 3_000,
            cache_liveness_timeout_ms: 2_000,
            recipe_ttl_secs: DEFAULT_RECIPE_TTL.as_secs(),
            redis_url: None,
            gemini: ProviderOverrides::default(),
            spoonacular: ProviderOverrides::default(),
            unsplash: ProviderOverrides::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(document).map_err(|e| ConfigError::InvalidDocument(e.to_string()))
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_with(process_env)?;
        Ok(config)
    }

    /// Applies `PANTRY_DAILY_PRIMARY_QUOTA`, `PANTRY_PACING_PER_MINUTE`
    /// (`0` disables pacing) and `PANTRY_REDIS_URL`/`REDIS_URL`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PANTRY_DAILY_PRIMARY_QUOTA") {
            self.daily_primary_quota = parse_u32("PANTRY_DAILY_PRIMARY_QUOTA", &raw)?;
        }
        if let Some(raw) = lookup("PANTRY_PACING_PER_MINUTE") {
            let limit = parse_u32("PANTRY_PACING_PER_MINUTE", &raw)?;
            self.pacing_per_minute = (limit > 0).then_some(limit);
        }
        if let Some(url) = first_of(&lookup, "PANTRY_REDIS_URL", "REDIS_URL") {
            self.redis_url = Some(url);
        }
        Ok(())
    }

    pub fn cache_operation_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_operation_timeout_ms)
    }

    pub fn cache_liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_liveness_timeout_ms)
    }

    pub fn recipe_ttl(&self) -> Duration {
        Duration::from_secs(self.recipe_ttl_secs.max(1)).min(MAX_ENTRY_TTL)
    }

    pub fn policy_for(&self, provider_id: ProviderId) -> ProviderPolicy {
        match provider_id {
            ProviderId::Gemini => self.gemini.resolve(provider_id),
            ProviderId::Spoonacular => self.spoonacular.resolve(provider_id),
            ProviderId::Unsplash => self.unsplash.resolve(provider_id),
        }
    }
}

/// Provider credentials. A provider without a key is left out of the chain.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderKeys {
    pub gemini: Option<String>,
    pub spoonacular: Option<String>,
    pub unsplash: Option<String>,
}

impl ProviderKeys {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            gemini: first_of(&lookup, "PANTRY_GEMINI_API_KEY", "GEMINI_API_KEY"),
            spoonacular: first_of(&lookup, "PANTRY_SPOONACULAR_API_KEY", "SPOONACULAR_API_KEY"),
            unsplash: first_of(&lookup, "PANTRY_UNSPLASH_ACCESS_KEY", "UNSPLASH_ACCESS_KEY"),
        }
    }

    pub fn get(&self, provider_id: ProviderId) -> Option<&str> {
        match provider_id {
            ProviderId::Gemini => self.gemini.as_deref(),
            ProviderId::Spoonacular => self.spoonacular.as_deref(),
            ProviderId::Unsplash => self.unsplash.as_deref(),
        }
    }
}

impl Debug for ProviderKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mask = |key: &Option<String>| if key.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("ProviderKeys")
            .field("gemini", &mask(&self.gemini))
            .field("spoonacular", &mask(&self.spoonacular))
            .field("unsplash", &mask(&self.unsplash))
            .finish()
    }
}

fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn first_of<F>(lookup: &F, preferred: &str, fallback: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(preferred)
        .or_else(|| lookup(fallback))
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_u32(name: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidEnv {
        name,
        value: raw.to_owned(),
        reason: e.to_string(),
    })
}
