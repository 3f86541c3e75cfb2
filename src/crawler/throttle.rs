//! Latency-adaptive delay between requests.

use crate::config::ThrottleConfig;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Adapts the delay between request starts to the observed server latency,
/// bounded by a minimum and maximum, plus a random jitter.
///
/// The start schedule is shared, so concurrent callers are spaced apart
/// rather than sleeping side by side.
#[derive(Debug)]
pub struct AutoThrottle {
    enabled: bool,
    min_ms: u64,
    max_ms: u64,
    jitter_ms: u64,
    current_ms: AtomicU64,
    next_start: Mutex<Option<Instant>>,
}

impl AutoThrottle {
    pub fn new(config: &ThrottleConfig) -> Self {
        let min_ms = config.min_delay_ms.min(config.max_delay_ms);
        let max_ms = config.max_delay_ms.max(min_ms);
        Self {
            enabled: config.enabled,
            min_ms,
            max_ms,
            jitter_ms: config.jitter_ms,
            current_ms: AtomicU64::new(min_ms),
            next_start: Mutex::new(None),
        }
    }

    /// A throttle that never sleeps.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            min_ms: 0,
            max_ms: 0,
            jitter_ms: 0,
            current_ms: AtomicU64::new(0),
            next_start: Mutex::new(None),
        }
    }

    /// Adaptive delay without jitter.
    pub fn base_delay(&self) -> Duration {
        if !self.enabled {
            return Duration::ZERO;
        }
        Duration::from_millis(self.current_ms.load(Ordering::Relaxed))
    }

    /// Delay for the next request: the adaptive delay plus a fresh jitter draw.
    pub fn delay(&self) -> Duration {
        let base = self.base_delay();
        if !self.enabled || self.jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=self.jitter_ms))
    }

    /// Reserves the next start slot and sleeps until it.
    ///
    /// The first request starts immediately; every later one starts at least
    /// one delay after the previous reservation.
    pub async fn wait(&self) {
        if !self.enabled {
            return;
        }

        let start = {
            let mut next_start = self.next_start.lock().await;
            let now = Instant::now();
            let start = (*next_start).map_or(now, |next| next.max(now));
            *next_start = Some(start + self.delay());
            start
        };

        let now = Instant::now();
        if start > now {
            trace!("Delaying {}ms", (start - now).as_millis());
            tokio::time::sleep_until(start).await;
        }
    }

    /// Moves the delay halfway towards `latency`.
    ///
    /// Error responses may raise the delay but never lower it.
    pub fn observe(&self, latency: Duration, success: bool) {
        if !self.enabled {
            return;
        }

        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let _ = self.current_ms.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |old| {
            let mut next = old.saturating_add(latency_ms) / 2;
            if !success && next < old {
                next = old;
            }
            Some(next.clamp(self.min_ms, self.max_ms))
        });
    }
}
