use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheLookup, CacheWrite, TimedCache, MAX_ENTRY_TTL};
use crate::ProviderId;

/// Observable breaker state for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls are allowed.
    Closed,
    /// A quota failure was seen; calls are skipped until the flag expires.
    Open,
}

/// Per-provider quota breakers stored as TTL flags in the shared cache.
///
/// The flag lives under `<provider>_quota_exceeded`. Expiry is left to the
/// cache TTL; [`CircuitBreaker::reset`] removes it early. A degraded cache
/// reads as closed, so a cache outage never blocks a provider.
#[derive(Clone)]
pub struct CircuitBreaker {
    cache: TimedCache,
}

impl CircuitBreaker {
    pub fn new(cache: TimedCache) -> Self {
        Self { cache }
    }

    pub async fn state(&self, provider: ProviderId) -> CircuitState {
        match self.cache.get(&provider.breaker_key()).await {
            CacheLookup::Hit(value) if value.is_truthy() => CircuitState::Open,
            CacheLookup::Hit(_) | CacheLookup::Miss => CircuitState::Closed,
        }
    }

    pub async fn is_open(&self, provider: ProviderId) -> bool {
        self.state(provider).await == CircuitState::Open
    }

    pub async fn trip(&self, provider: ProviderId, ttl: Duration) -> CacheWrite {
        let ttl = ttl.min(MAX_ENTRY_TTL);
        let outcome = self.cache.set(&provider.breaker_key(), "true", ttl).await;
        match outcome {
            CacheWrite::Ack => warn!(
                provider = provider.as_str(),
                ttl_secs = ttl.as_secs(),
                "provider quota breaker tripped"
            ),
            CacheWrite::Degraded => warn!(
                provider = provider.as_str(),
                "provider quota breaker could not be persisted"
            ),
        }
        outcome
    }

    pub async fn reset(&self, provider: ProviderId) -> CacheWrite {
        let outcome = self.cache.delete(&provider.breaker_key()).await;
        if outcome == CacheWrite::Ack {
            info!(provider = provider.as_str(), "provider quota breaker reset");
        }
        outcome
    }
}
