//! Daily primary-provider quota and per-provider breaker hooks.
//!
//! The counter is advisory cost control: it lives in process memory, resets
//! on restart, and tolerates lost updates under concurrency. It never blocks
//! a request outright; it only decides whether the primary provider is
//! tried.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use time::{Date, OffsetDateTime};
use tracing::{debug, info};

use crate::cache::{CacheWrite, TimedCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::throttling::Pacer;
use crate::ProviderId;

/// Source of the current calendar day.
pub trait Clock: Send + Sync {
    fn today(&self) -> Date;
}

/// UTC wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        OffsetDateTime::now_utc().date()
    }
}

/// Manually advanced clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    today: Mutex<Date>,
}

impl ManualClock {
    pub fn new(today: Date) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: Date) {
        *self.today.lock().unwrap_or_else(PoisonError::into_inner) = today;
    }

    pub fn advance_days(&self, days: i64) {
        let mut today = self.today.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = today.checked_add(time::Duration::days(days)) {
            *today = next;
        }
    }
}

impl Clock for ManualClock {
    fn today(&self) -> Date {
        *self.today.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn today(&self) -> Date {
        (**self).today()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QuotaState {
    count: u32,
    window_start: Date,
}

/// Snapshot of the primary quota for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    #[serde(serialize_with = "serialize_date")]
    pub window_start: Date,
}

fn serialize_date<S: serde::Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(date)
}

/// Owns the daily counter and the provider breakers.
pub struct QuotaGovernor {
    daily_limit: u32,
    state: Mutex<QuotaState>,
    clock: Box<dyn Clock>,
    pacer: Option<Pacer>,
    breaker: CircuitBreaker,
}

impl QuotaGovernor {
    pub fn new(daily_limit: u32, cache: TimedCache) -> Self {
        Self::with_clock(daily_limit, cache, Box::new(SystemClock))
    }

    pub fn with_clock(daily_limit: u32, cache: TimedCache, clock: Box<dyn Clock>) -> Self {
        let today = clock.today();
        Self {
            daily_limit,
            state: Mutex::new(QuotaState {
                count: 0,
                window_start: today,
            }),
            clock,
            pacer: None,
            breaker: CircuitBreaker::new(cache),
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = Some(pacer);
        self
    }

    /// Returns `false` without side effects once today's ceiling is reached
    /// (or the pacer has no budget); otherwise counts the call.
    pub fn try_consume_primary_quota(&self) -> bool {
        let today = self.clock.today();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.window_start != today {
            info!(
                previous_window = %state.window_start,
                previous_count = state.count,
                "primary quota window rolled over"
            );
            *state = QuotaState {
                count: 0,
                window_start: today,
            };
        }

        if state.count >= self.daily_limit {
            debug!(count = state.count, limit = self.daily_limit, "daily primary quota exhausted");
            return false;
        }

        if let Some(pacer) = &self.pacer {
            if !pacer.try_acquire() {
                debug!(limit = pacer.limit(), "primary provider pacing budget exhausted");
                return false;
            }
        }

        state.count = state.count.saturating_add(1);
        true
    }

    pub fn usage(&self) -> QuotaUsage {
        let today = self.clock.today();
        let state = *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let count = if state.window_start == today { state.count } else { 0 };

        QuotaUsage {
            count,
            limit: self.daily_limit,
            remaining: self.daily_limit.saturating_sub(count),
            window_start: today,
        }
    }

    pub async fn is_breaker_open(&self, provider: ProviderId) -> bool {
        self.breaker.is_open(provider).await
    }

    pub async fn breaker_state(&self, provider: ProviderId) -> CircuitState {
        self.breaker.state(provider).await
    }

    pub async fn trip_breaker(&self, provider: ProviderId, ttl: Duration) -> CacheWrite {
        self.breaker.trip(provider, ttl).await
    }

    /// Operator hook: re-enable a provider before its breaker expires.
    pub async fn reset_breaker(&self, provider: ProviderId) -> CacheWrite {
        self.breaker.reset(provider).await
    }
}
