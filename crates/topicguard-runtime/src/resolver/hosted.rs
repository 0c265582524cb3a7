use async_trait::async_trait;
use std::sync::Arc;

use super::{parse_topic_response, HostedModel, ResolverError, TopicResolver};
use crate::prompts::build_topic_prompt;
use crate::providers::{ChatMessage, ClientArgs, CompletionConfig, LlmProvider};
use crate::resilience::{retry_transient, RetryPolicy};

/// Resolves topics by asking a hosted chat model.
///
/// Only the completion call is retried. A response that arrives but does
/// not parse fails at once.
pub struct HostedTopicResolver {
    provider: Arc<dyn LlmProvider>,
    model: HostedModel,
    completion: CompletionConfig,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HostedTopicResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedTopicResolver")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("retry", &self.retry)
            .finish()
    }
}

impl HostedTopicResolver {
    pub fn new(provider: Arc<dyn LlmProvider>, model: HostedModel) -> Self {
        Self {
            provider,
            model,
            completion: CompletionConfig {
                model: model.as_str().to_string(),
                ..CompletionConfig::default()
            },
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override request settings. The model always stays the resolver's.
    pub fn with_completion_config(mut self, completion: CompletionConfig) -> Self {
        self.completion = CompletionConfig {
            model: self.model.as_str().to_string(),
            ..completion
        };
        self
    }

    pub fn model(&self) -> HostedModel {
        self.model
    }
}

#[async_trait]
impl TopicResolver for HostedTopicResolver {
    async fn resolve(
        &self,
        text: &str,
        candidates: &[String],
        client_args: &ClientArgs,
    ) -> Result<String, ResolverError> {
        let prompt = build_topic_prompt(text, candidates);
        let prompt = prompt.as_str();
        let provider = &self.provider;
        let completion = &self.completion;

        let response = retry_transient(&self.retry, "llm_completion", move || async move {
            provider
                .complete(vec![ChatMessage::user(prompt)], completion, client_args)
                .await
                .map_err(ResolverError::from)
        })
        .await?;

        tracing::debug!(
            provider = provider.name(),
            model = %self.model,
            total_tokens = response.usage.total(),
            "LLM topic resolution complete"
        );

        parse_topic_response(&response.content)
    }

    fn name(&self) -> &str {
        self.model.as_str()
    }
}
