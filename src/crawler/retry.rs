//! Retry/backoff controller
//!
//! Every outbound request runs through a `Retrier`:
//!
//! | Attempt outcome | Action |
//! |-----------------|--------|
//! | Success | Done |
//! | Transient network error | Backoff, retry |
//! | Malformed body | Refresh session, backoff, retry |
//! | Hard provider status | Backoff, retry |
//! | Attempts exhausted | Escalate once, return `RetryExhausted` |
//!
//! The escalation wait is capped at `ESCALATION_TIMEOUT`; a notifier that
//! never answers delays the terminal error by at most that long.
//!
//! Soft provider statuses never reach this module; they decode to an empty
//! result at the transport boundary.

use crate::config::RetryConfig;
use crate::notify::{Notifier, ESCALATION_MESSAGE};
use crate::HarvestError;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest wait for the notifier before the terminal error is surfaced
pub const ESCALATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Connection failure or timeout
    Transient(String),
    /// Body could not be decoded; the session is refreshed before the next attempt
    Malformed(String),
    /// Provider answered with an unrecognized status
    HardProvider(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient error: {}", msg),
            Self::Malformed(msg) => write!(f, "malformed response: {}", msg),
            Self::HardProvider(msg) => write!(f, "provider error: {}", msg),
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

/// Progress of one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based number of the attempt that just failed
    pub attempt: u32,
    /// Wait before the next attempt; `None` once terminal
    pub next_delay: Option<Duration>,
    pub terminal: bool,
}

/// Attempt limit and exponential backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }

    /// Un-jittered delay after the `failed`-th failure: `base * 2^(failed-1)`, capped
    pub fn backoff(&self, failed: u32) -> Duration {
        let factor = 1u32
            .checked_shl(failed.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay actually slept, with up to +50% random jitter when enabled
    pub fn delay_after(&self, failed: u32) -> Duration {
        let delay = self.backoff(failed);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let spread = (delay.as_millis() / 2) as u64;
        let extra = rand::thread_rng().gen_range(0..=spread);
        (delay + Duration::from_millis(extra)).min(self.max_delay)
    }

    /// Classifies the `failed`-th failure
    pub fn assess(&self, failed: u32) -> RetryAttempt {
        let terminal = failed >= self.max_attempts;
        RetryAttempt {
            attempt: failed,
            next_delay: (!terminal).then(|| self.delay_after(failed)),
            terminal,
        }
    }
}

/// Applies a `RetryPolicy` to request closures and escalates on exhaustion
pub struct Retrier {
    policy: RetryPolicy,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, notifier: Arc<dyn Notifier>, cancel: CancellationToken) -> Self {
        Self {
            policy,
            notifier,
            cancel,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op` until it succeeds or the policy gives up
    ///
    /// `recover` runs after every malformed response, before the backoff wait.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - An attempt succeeded
    /// * `Err(HarvestError::RetryExhausted)` - All attempts failed; the notifier was called once
    /// * `Err(HarvestError::Cancelled)` - Shutdown was requested during a backoff wait
    pub async fn run<T, Op, Fut, Rec, RecFut>(
        &self,
        label: &str,
        mut op: Op,
        mut recover: Rec,
    ) -> Result<T, HarvestError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
        Rec: FnMut() -> RecFut,
        RecFut: Future<Output = ()>,
    {
        let mut failed = 0;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            failed += 1;

            if matches!(err, AttemptError::Malformed(_)) {
                recover().await;
            }

            let attempt = self.policy.assess(failed);
            let Some(delay) = attempt.next_delay else {
                return Err(self.escalate(label, attempt.attempt, &err).await);
            };

            tracing::warn!(
                "{} failed (attempt {}/{}): {}, retrying in {:?}",
                label,
                attempt.attempt,
                self.policy.max_attempts,
                err,
                delay
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(HarvestError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn escalate(&self, label: &str, attempts: u32, err: &AttemptError) -> HarvestError {
        tracing::error!("{} gave up after {} attempts: {}", label, attempts, err);

        let message = format!("{}\n> {}: {}", ESCALATION_MESSAGE, label, err);
        match tokio::time::timeout(ESCALATION_TIMEOUT, self.notifier.escalate(&message)).await {
            Ok(Ok(())) => {}
            Ok(Err(notify_err)) => tracing::warn!("Escalation notification failed: {}", notify_err),
            Err(_) => tracing::warn!(
                "Escalation notification gave no answer within {:?}, dropped",
                ESCALATION_TIMEOUT
            ),
        }

        HarvestError::RetryExhausted {
            label: label.to_string(),
            attempts,
            last_error: err.to_string(),
        }
    }
}
