//! Retry with randomized exponential backoff.

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Errors that can tell whether a retry might succeed.
pub trait TransientError: std::fmt::Display {
    fn is_transient(&self) -> bool;
}

/// Backoff settings for hosted model calls.
///
/// Defaults: 1s minimum delay, 60s maximum delay, 5 attempts in total,
/// jitter on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(with = "humantime_duration")]
    pub min_delay: Duration,

    #[serde(with = "humantime_duration")]
    pub max_delay: Duration,

    /// Total attempts, including the first.
    pub max_attempts: usize,

    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt with no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff schedule for backon.
    ///
    /// At least one attempt is always made, and every delay lies within
    /// `[min_delay, max(min_delay, max_delay)]`, jitter included.
    pub fn backoff(&self) -> CappedBackoffBuilder {
        let max_delay = self.max_delay.max(self.min_delay);
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts.max(1) - 1);

        let inner = if self.jitter {
            builder.with_jitter()
        } else {
            builder
        };
        CappedBackoffBuilder { inner, max_delay }
    }
}

/// Exponential backoff whose jittered delays are clamped to the cap.
///
/// backon adds jitter on top of an already capped delay, so a bare
/// `ExponentialBuilder` can wait up to twice `max_delay`.
#[derive(Debug, Clone)]
pub struct CappedBackoffBuilder {
    inner: ExponentialBuilder,
    max_delay: Duration,
}

impl BackoffBuilder for CappedBackoffBuilder {
    type Backoff = CappedBackoff;

    fn build(self) -> Self::Backoff {
        CappedBackoff {
            inner: self.inner.build(),
            max_delay: self.max_delay,
        }
    }
}

#[derive(Debug)]
pub struct CappedBackoff {
    inner: ExponentialBackoff,
    max_delay: Duration,
}

impl Iterator for CappedBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.inner.next().map(|delay| delay.min(self.max_delay))
    }
}

/// Run `operation`, retrying transient failures under `policy`.
///
/// Permanent failures return at once. After the last attempt the final
/// error is returned unchanged.
pub async fn retry_transient<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    f: F,
) -> Result<T, E>
where
    E: TransientError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    f.retry(policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|e: &E| e.is_transient())
        .notify(|e: &E, delay: Duration| {
            tracing::warn!(
                operation,
                error = %e,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying"
            );
        })
        .await
}

/// Serde helpers for durations written as `"500ms"`, `"1m 30s"` and so on.
pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
