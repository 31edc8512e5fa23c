use std::time::Duration;

use crate::retry::{Backoff, RetryPolicy};
use crate::ProviderId;

/// Per-provider call budget used by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub retry: RetryPolicy,
    /// Upper bound on a single attempt, network included.
    pub attempt_timeout: Duration,
    /// How long the provider stays disabled after a quota failure.
    pub breaker_ttl: Duration,
}

const SIX_HOURS: Duration = Duration::from_secs(6 * 60 * 60);

impl ProviderPolicy {
    pub fn gemini_default() -> Self {
        Self {
            provider_id: ProviderId::Gemini,
            retry: RetryPolicy::new(3, Backoff::default()),
            attempt_timeout: Duration::from_secs(25),
            breaker_ttl: SIX_HOURS,
        }
    }

    pub fn spoonacular_default() -> Self {
        Self {
            provider_id: ProviderId::Spoonacular,
            retry: RetryPolicy::new(2, Backoff::default()),
            attempt_timeout: Duration::from_secs(10),
            breaker_ttl: SIX_HOURS,
        }
    }

    /// Unsplash limits are hourly, so its breaker cools down sooner.
    pub fn unsplash_default() -> Self {
        Self {
            provider_id: ProviderId::Unsplash,
            retry: RetryPolicy::single(),
            attempt_timeout: Duration::from_secs(5),
            breaker_ttl: Duration::from_secs(60 * 60),
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Gemini => Self::gemini_default(),
            ProviderId::Spoonacular => Self::spoonacular_default(),
            ProviderId::Unsplash => Self::unsplash_default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn with_breaker_ttl(mut self, breaker_ttl: Duration) -> Self {
        self.breaker_ttl = breaker_ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_policy_allows_three_attempts_and_six_hour_breaker() {
        let policy = ProviderPolicy::gemini_default();

        assert_eq!(policy.provider_id, ProviderId::Gemini);
        assert_eq!(policy.retry.max_attempts, 3);
        assert_eq!(policy.breaker_ttl, Duration::from_secs(21_600));
    }

    #[test]
    fn secondary_policy_allows_two_attempts() {
        let policy = ProviderPolicy::spoonacular_default();

        assert_eq!(policy.provider_id, ProviderId::Spoonacular);
        assert_eq!(policy.retry.max_attempts, 2);
    }

    #[test]
    fn default_for_matches_named_constructors() {
        for provider in ProviderId::ALL {
            assert_eq!(ProviderPolicy::default_for(provider).provider_id, provider);
        }
    }
}
