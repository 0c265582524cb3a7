use async_trait::async_trait;
use std::sync::Arc;

use super::{ResolverError, TopicResolver};
use crate::providers::ClientArgs;
use crate::resilience::{retry_transient, RetryPolicy};

/// A caller-supplied resolution function: `(text, candidates) -> topic`.
pub type TopicFn = Arc<dyn Fn(&str, &[String]) -> Result<String, ResolverError> + Send + Sync>;

/// Resolves topics with a caller-supplied function.
///
/// The function's answer is taken as the topic name as-is. Client
/// arguments are ignored. Failures marked [`ResolverError::Transient`] are
/// retried under the same policy as hosted calls.
pub struct CallableTopicResolver {
    func: TopicFn,
    retry: RetryPolicy,
}

impl std::fmt::Debug for CallableTopicResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableTopicResolver")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl CallableTopicResolver {
    pub fn new(func: TopicFn) -> Self {
        Self {
            func,
            retry: RetryPolicy::default(),
        }
    }

    /// Wrap a plain function or closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<String, ResolverError> + Send + Sync + 'static,
    {
        Self::new(Arc::new(f))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl TopicResolver for CallableTopicResolver {
    async fn resolve(
        &self,
        text: &str,
        candidates: &[String],
        _client_args: &ClientArgs,
    ) -> Result<String, ResolverError> {
        let func = &self.func;
        retry_transient(&self.retry, "custom_resolver", move || async move {
            func(text, candidates)
        })
        .await
    }

    fn name(&self) -> &str {
        "custom"
    }
}
