use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::classify::{classify, ErrorCategory, ErrorClassification, RecoveryStrategy};

/// Server-side schedule: exponential backoff from 1s, capped at 30s, plus jitter.
const RETRY_BASE_DELAY_MS: u64 = 1_000;
const RETRY_MAX_DELAY_MS: u64 = 30_000;
const RETRY_JITTER_DIVISOR: u128 = 4; // + up to 25% jitter

/// Backoff and attempt ceilings used by [`RecoveryExecutor`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Caps every category ceiling when set.
    pub attempt_limit: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS),
            jitter: true,
            attempt_limit: None,
        }
    }
}

impl RetryPolicy {
    /// One attempt per operation, no backoff.
    pub fn single_attempt() -> Self {
        Self {
            attempt_limit: Some(1),
            ..Self::default()
        }
    }

    /// Total attempts (initial call included) allowed for a category.
    pub fn max_attempts(&self, category: ErrorCategory) -> u32 {
        let ceiling = match category {
            ErrorCategory::Database => 6,
            ErrorCategory::Network => 4,
            ErrorCategory::ExternalService => 4,
            ErrorCategory::Unknown => 3,
            ErrorCategory::Configuration => 1,
        };
        match self.attempt_limit {
            Some(limit) => ceiling.min(limit.max(1)),
            None => ceiling,
        }
    }

    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let multiplier = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    fn delay_for(&self, retry: u32) -> Duration {
        let delay = self.base_delay_for(retry);
        if self.jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }
}

fn add_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = delay.as_millis() / RETRY_JITTER_DIVISOR;
    if max_jitter_ms == 0 {
        return delay;
    }

    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}

/// Terminal failure of a recovered operation.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error(
        "{label} failed with a non-retryable {} error: {last_error:#}",
        .classification.category
    )]
    FailFast {
        label: String,
        classification: ErrorClassification,
        last_error: anyhow::Error,
    },
    #[error("{label} failed after {attempts} attempts: {last_error:#}")]
    Exhausted {
        label: String,
        attempts: u32,
        classification: ErrorClassification,
        last_error: anyhow::Error,
    },
}

impl RecoveryError {
    pub fn classification(&self) -> &ErrorClassification {
        match self {
            RecoveryError::FailFast { classification, .. }
            | RecoveryError::Exhausted { classification, .. } => classification,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RecoveryError::FailFast { .. } => 1,
            RecoveryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// The error returned by the last attempt.
    pub fn last_error(&self) -> &anyhow::Error {
        match self {
            RecoveryError::FailFast { last_error, .. }
            | RecoveryError::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Runs operations with classification-driven retries.
///
/// Attempts are strictly sequential: the next attempt starts only after the
/// previous one resolved and the backoff delay elapsed.
#[derive(Debug, Clone, Default)]
pub struct RecoveryExecutor {
    policy: RetryPolicy,
}

impl RecoveryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, retrying according to the classification of each error.
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> Result<T, RecoveryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!("Executing {} (attempt {})", label, attempt);

            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} recovered on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let classification = classify(&err);

            if classification.recovery_strategy == RecoveryStrategy::FailFast {
                error!("{} failed after {} attempts: {:#}", label, attempt, err);
                return Err(RecoveryError::FailFast {
                    label: label.to_string(),
                    classification,
                    last_error: err,
                });
            }

            let max_attempts = self.policy.max_attempts(classification.category);
            if attempt >= max_attempts {
                error!("{} failed after {} attempts: {:#}", label, attempt, err);
                return Err(RecoveryError::Exhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    classification,
                    last_error: err,
                });
            }

            let delay = self.policy.delay_for(attempt - 1);
            warn!(
                "{} failed with {} error ({:#}); retrying in {:?} (attempt {}/{})",
                label, classification.category, err, delay, attempt, max_attempts
            );
            sleep(delay).await;
        }
    }

    /// Like [`execute`](Self::execute), but a terminal failure yields `fallback`.
    pub async fn execute_or<T, F, Fut>(&self, label: &str, operation: F, fallback: T) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.execute(label, operation).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Using fallback for {}: {}", label, e);
                fallback
            }
        }
    }
}
