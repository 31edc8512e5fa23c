//! Backoff between provider attempts and the Redis reconnect loop.

use std::time::Duration;

use serde::Deserialize;

/// Wait inserted between two attempts against the same provider.
///
/// Configured in milliseconds, e.g. `{"kind": "fixed", "delay": 250}`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    None,
    Fixed {
        #[serde(with = "millis")]
        delay: Duration,
    },
    /// `base * factor^retry`, capped at `max`, optionally scaled by a
    /// random factor in `[0.5, 1.5)`.
    Exponential {
        #[serde(with = "millis")]
        base: Duration,
        factor: f64,
        #[serde(with = "millis")]
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay for a given retry (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let nominal = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
                let nominal = Duration::from_secs_f64(nominal.max(0.0));
                if jitter {
                    nominal.mul_f64(0.5 + fastrand::f64())
                } else {
                    nominal
                }
            }
        }
    }
}

/// Attempt budget for one provider within one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn single() -> Self {
        Self::new(1, Backoff::None)
    }

    /// Delay to wait before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff.delay(attempt - 2)
        }
    }

    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
