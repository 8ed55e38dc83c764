//! Bounded retry with backoff for flaky I/O.
//!
//! A [`RetryPolicy`] is plain data (it lives in config files); a [`Retry`]
//! pairs a policy with the caller's `retry_if` predicate and `on_retry`
//! observer. Operations return `Result`, so only errors are ever retried;
//! a panic inside the operation unwinds straight through and is never
//! attempted again.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff growth: `true` doubles, `false` keeps the delay flat, a number
/// is used as the multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exponential {
    Enabled(bool),
    Multiplier(f64),
}

impl Exponential {
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Enabled(true) => 2.0,
            Self::Enabled(false) => 1.0,
            Self::Multiplier(m) => *m,
        }
    }
}

impl Default for Exponential {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts after the first one
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay before the first retry
    #[serde(default)]
    pub delay_ms: u64,

    /// Upper bound on any single delay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,

    #[serde(default)]
    pub exponential: Exponential,

    /// Re-raise the last error on exhaustion instead of yielding no result
    #[serde(default = "default_true")]
    pub throw_on_exhaustion: bool,
}

fn default_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay_ms: 0,
            max_delay_ms: None,
            exponential: Exponential::default(),
            throw_on_exhaustion: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay_ms = Some(max.as_millis() as u64);
        self
    }

    pub fn with_exponential(mut self, exponential: Exponential) -> Self {
        self.exponential = exponential;
        self
    }

    pub fn with_throw_on_exhaustion(mut self, throw: bool) -> Self {
        self.throw_on_exhaustion = throw;
        self
    }

    /// Delay before retry `k` (0-indexed): `min(delay * multiplier^k, max_delay)`.
    pub fn delay_for(&self, k: u32) -> Duration {
        let raw = self.delay_ms as f64 * self.exponential.multiplier().powi(k as i32);
        let capped = match self.max_delay_ms {
            Some(max) => raw.min(max as f64),
            None => raw,
        };
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

type RetryIf<'a, E> = Box<dyn Fn(&E) -> bool + Send + Sync + 'a>;
type OnRetry<'a, E> = Box<dyn Fn(&E, u32) + Send + Sync + 'a>;

/// A retry policy bound to an error type's predicates.
pub struct Retry<'a, E> {
    policy: RetryPolicy,
    retry_if: Option<RetryIf<'a, E>>,
    on_retry: Option<OnRetry<'a, E>>,
}

impl<'a, E> Retry<'a, E> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retry_if: None,
            on_retry: None,
        }
    }

    /// Stop retrying as soon as this returns false.
    pub fn retry_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'a) -> Self {
        self.retry_if = Some(Box::new(predicate));
        self
    }

    /// Observe each retry (error, 1-based retry number). Never affects control flow.
    pub fn on_retry(mut self, observer: impl Fn(&E, u32) + Send + Sync + 'a) -> Self {
        self.on_retry = Some(Box::new(observer));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` up to `retries + 1` times.
    ///
    /// Yields `Ok(None)` on exhaustion only when the policy disables
    /// `throw_on_exhaustion`; otherwise the last error is returned.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.call(op).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.policy.throw_on_exhaustion => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Like [`run`](Self::run) but always re-raises on exhaustion.
    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let eligible = self.retry_if.as_ref().is_none_or(|p| p(&error));
            if attempt >= self.policy.retries || !eligible {
                return Err(error);
            }

            if let Some(observer) = &self.on_retry {
                observer(&error, attempt + 1);
            }

            let wait = self.policy.delay_for(attempt);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            attempt += 1;
        }
    }
}

/// Retry `op` under `policy` with no predicate or observer.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, op: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    Retry::new(policy.clone()).run(op).await
}
