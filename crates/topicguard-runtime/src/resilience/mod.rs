//! Resilience patterns for topicguard-runtime.
//!
//! Calls to hosted models are retried with randomized exponential backoff
//! when the failure is transient.

mod retry;

pub use retry::{retry_transient, CappedBackoff, CappedBackoffBuilder, RetryPolicy, TransientError};

pub(crate) use retry::humantime_duration;
