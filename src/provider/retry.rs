//! # Throttling Retry
//!
//! Exponential backoff for writes that Parameter Store rejects with a
//! throttling error.
//!
//! Only throttling-class errors are retried. Anything else (permission,
//! validation, not found) propagates on the first attempt. With the default
//! policy a write is attempted at most 10 times, waiting
//! 1.5s, 3s, 6s, 12s, 24s, 48s, 60s (max), 60s, 60s between attempts, plus
//! 0-200ms of random jitter on every wait.
//!
//! ## Usage
//!
//! ```rust
//! use param_sync::provider::retry::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_millis(1500), Duration::from_secs(60));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(1500));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(3000));
//! assert_eq!(backoff.next_backoff(), Duration::from_millis(6000));
//! ```

use crate::constants::{
    DEFAULT_BACKOFF_JITTER_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_BACKOFF_START_MS,
    DEFAULT_RETRY_MAX_ATTEMPTS,
};
use crate::error::StoreError;
use crate::parameter::{Parameter, RemoteParameter, Tag};
use crate::provider::ParameterStore;
use async_trait::async_trait;
use futures::stream::BoxStream;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff calculator
///
/// Each wait is double the previous one, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    start: Duration,
    current: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(start: Duration, max: Duration) -> Self {
        Self {
            start,
            current: start.min(max),
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current = self.start.min(self.max);
    }
}

/// Retry policy for throttled writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each wait
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BACKOFF_START_MS),
            max_delay: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            max_jitter: Duration::from_millis(DEFAULT_BACKOFF_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    fn jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

/// Suspension used between retry attempts
///
/// Injected so tests can observe waits without actually sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `call` until it succeeds, fails with a non-throttling error, or the
/// policy's attempts are used up
///
/// # Errors
///
/// Returns the first non-throttling error unchanged, or
/// `StoreError::RetriesExhausted` wrapping the last throttling error.
pub async fn retry_on_throttle<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation: &str,
    name: &str,
    mut call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = ExponentialBackoff::new(policy.base_delay, policy.max_delay);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_throttling() => {
                if attempt >= max_attempts {
                    warn!(
                        operation = operation,
                        parameter = name,
                        attempts = attempt,
                        "Giving up on throttled {} of {} after {} attempts",
                        operation,
                        name,
                        attempt
                    );
                    return Err(StoreError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }

                let wait = backoff.next_backoff() + policy.jitter();
                warn!(
                    operation = operation,
                    parameter = name,
                    attempt = attempt,
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "Throttled during {} of {}, retrying in {:?}",
                    operation,
                    name,
                    wait
                );
                sleeper.sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Store decorator applying the throttling retry policy to every write
///
/// Reads pass straight through: a throttled read fails the single lookup it
/// belongs to.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<S> std::fmt::Debug for RetryingStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingStore")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S: ParameterStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self::with_sleeper(inner, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(inner: S, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            inner,
            policy,
            sleeper,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ParameterStore> ParameterStore for RetryingStore<S> {
    async fn get(&self, name: &str) -> Result<RemoteParameter, StoreError> {
        self.inner.get(name).await
    }

    async fn put(&self, parameter: &Parameter, overwrite: bool) -> Result<(), StoreError> {
        retry_on_throttle(
            &self.policy,
            self.sleeper.as_ref(),
            "put",
            &parameter.name,
            || self.inner.put(parameter, overwrite),
        )
        .await
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        retry_on_throttle(&self.policy, self.sleeper.as_ref(), "delete", name, || {
            self.inner.delete(name)
        })
        .await
    }

    fn list_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
        recursive: bool,
    ) -> BoxStream<'a, Result<RemoteParameter, StoreError>> {
        self.inner.list_by_prefix(prefix, recursive)
    }

    async fn get_tags(&self, name: &str) -> Vec<Tag> {
        self.inner.get_tags(name).await
    }

    async fn set_tags(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError> {
        retry_on_throttle(&self.policy, self.sleeper.as_ref(), "tag", name, || {
            self.inner.set_tags(name, tags)
        })
        .await
    }
}
