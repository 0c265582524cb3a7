//! LLM topic resolution.
//!
//! A [`TopicResolver`] picks the single most relevant topic for a text
//! from a candidate list. Two backends exist: a hosted chat model
//! ([`HostedTopicResolver`]) and a caller-supplied function
//! ([`CallableTopicResolver`]). Both retry transient failures.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use topicguard_core::ConfigurationError;

use crate::providers::{ClientArgs, ProviderError};
use crate::resilience::TransientError;

mod callable;
mod hosted;

pub use callable::{CallableTopicResolver, TopicFn};
pub use hosted::HostedTopicResolver;

/// Errors from topic resolution.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The model answered, but not with `{"topic": "<name>"}`.
    #[error("malformed topic response ({reason}): {content}")]
    MalformedResponse { content: String, reason: String },

    /// A custom resolver failure worth retrying.
    #[error("transient resolver failure: {0}")]
    Transient(String),

    #[error("resolver failed: {0}")]
    Failed(String),
}

impl TransientError for ResolverError {
    fn is_transient(&self) -> bool {
        match self {
            ResolverError::Provider(e) => e.is_transient(),
            ResolverError::Transient(_) => true,
            ResolverError::MalformedResponse { .. } | ResolverError::Failed(_) => false,
        }
    }
}

/// Picks the most relevant topic for a text.
#[async_trait]
pub trait TopicResolver: Send + Sync {
    /// Return the single most relevant topic.
    ///
    /// The answer is not checked against `candidates`; that is the policy
    /// layer's job.
    async fn resolve(
        &self,
        text: &str,
        candidates: &[String],
        client_args: &ClientArgs,
    ) -> Result<String, ResolverError>;

    /// Resolver name for logs.
    fn name(&self) -> &str;
}

/// Hosted models the hosted resolver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostedModel {
    #[default]
    Gpt35Turbo,
    Gpt4,
}

impl HostedModel {
    pub const ALL: [HostedModel; 2] = [HostedModel::Gpt35Turbo, HostedModel::Gpt4];

    pub fn as_str(self) -> &'static str {
        match self {
            HostedModel::Gpt35Turbo => "gpt-3.5-turbo",
            HostedModel::Gpt4 => "gpt-4",
        }
    }
}

impl fmt::Display for HostedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostedModel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnsupportedModel(s.to_string()))
    }
}

/// How the guard should resolve topics with an LLM.
#[derive(Clone)]
pub enum LlmCallable {
    /// A hosted model identifier, checked against [`HostedModel`].
    Model(String),
    /// A caller-supplied resolution function.
    Custom(TopicFn),
}

impl LlmCallable {
    /// Wrap a function `(text, candidates) -> topic`.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<String, ResolverError> + Send + Sync + 'static,
    {
        LlmCallable::Custom(Arc::new(f))
    }
}

impl Default for LlmCallable {
    fn default() -> Self {
        LlmCallable::Model(HostedModel::default().as_str().to_string())
    }
}

impl fmt::Debug for LlmCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmCallable::Model(name) => f.debug_tuple("Model").field(name).finish(),
            LlmCallable::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl From<&str> for LlmCallable {
    fn from(model: &str) -> Self {
        LlmCallable::Model(model.to_string())
    }
}

impl From<String> for LlmCallable {
    fn from(model: String) -> Self {
        LlmCallable::Model(model)
    }
}

impl From<HostedModel> for LlmCallable {
    fn from(model: HostedModel) -> Self {
        LlmCallable::Model(model.as_str().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TopicResponse {
    topic: String,
}

/// Read `{"topic": "<name>"}` from a model answer.
///
/// Surrounding whitespace is ignored. Extra keys are allowed. Anything
/// else is a [`ResolverError::MalformedResponse`].
pub fn parse_topic_response(content: &str) -> Result<String, ResolverError> {
    serde_json::from_str::<TopicResponse>(content.trim())
        .map(|response| response.topic)
        .map_err(|e| ResolverError::MalformedResponse {
            content: content.to_string(),
            reason: e.to_string(),
        })
}
