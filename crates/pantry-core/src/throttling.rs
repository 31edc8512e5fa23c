use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Short-window pacing for the primary provider.
///
/// Sits in front of the daily counter so a burst of requests does not hit
/// the provider's per-minute limit and earn a quota response.
#[derive(Clone)]
pub struct Pacer {
    limiter: Arc<DirectRateLimiter>,
    limit: u32,
    window: Duration,
}

impl Pacer {
    pub fn new(window: Duration, limit: u32) -> Self {
        let limit = limit.max(1);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(window, limit))),
            limit,
            window,
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(Duration::from_secs(60), limit)
    }

    /// Consumes one cell when budget is available.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (window.as_secs_f64() / f64::from(limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
