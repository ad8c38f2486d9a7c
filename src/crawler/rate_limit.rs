//! Inter-page pacing
//!
//! Every page fetch is followed by a randomized pause so the harvester never
//! hits the provider in a tight loop. The pause is jittered around the
//! configured interval, never drops below the floor, and wakes early when a
//! shutdown is requested.

use crate::config::CrawlerConfig;
use crate::HarvestError;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cancellable, jittered delay between consecutive page requests
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Nominal delay between pages
    base: Duration,

    /// Minimum delay after jitter is applied
    floor: Duration,

    /// Relative jitter in `[0, 1]`; 0.3 means +/-30%
    jitter: f64,

    cancel: CancellationToken,
}

impl RateLimiter {
    pub fn new(base: Duration, floor: Duration, jitter: f64, cancel: CancellationToken) -> Self {
        Self {
            base,
            floor,
            jitter: jitter.clamp(0.0, 1.0),
            cancel,
        }
    }

    pub fn from_config(config: &CrawlerConfig, cancel: CancellationToken) -> Self {
        Self::new(
            Duration::from_millis(config.crawl_interval),
            Duration::from_millis(config.min_interval),
            config.interval_jitter,
            cancel,
        )
    }

    /// Computes the next pause
    pub fn next_delay(&self) -> Duration {
        if self.base.is_zero() || self.jitter == 0.0 {
            return self.base.max(self.floor);
        }

        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        self.base.mul_f64(factor).max(self.floor)
    }

    /// Sleeps for the next pause
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The full pause elapsed
    /// * `Err(HarvestError::Cancelled)` - Shutdown was requested first
    pub async fn pause(&self) -> Result<(), HarvestError> {
        if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled);
        }

        let delay = self.next_delay();
        if delay.is_zero() {
            return Ok(());
        }

        tracing::debug!("Pausing {:?} before next page", delay);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(HarvestError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
