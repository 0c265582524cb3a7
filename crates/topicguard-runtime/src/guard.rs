//! The topic guard.
//!
//! [`TopicGuard`] runs the classifier and the LLM resolver in the order the
//! configured [`Mode`] requires and hands their outputs to the policy in
//! `topicguard_core::policy`. Calls are awaited one after the other; in
//! ensemble mode the LLM is only reached when the classifier screen is
//! clean.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use topicguard_core::{
    policy, ConfigurationError, Mode, ScoredTopic, Threshold, TopicConfiguration, Verdict,
};

use crate::classifier::{ClassifierError, ZeroShotClassifier, ZeroShotScorer};
use crate::providers::{ClientArgs, LlmProvider};
use crate::resilience::RetryPolicy;
use crate::resolver::{
    CallableTopicResolver, HostedModel, HostedTopicResolver, LlmCallable, ResolverError,
    TopicResolver,
};

/// Errors from a validation call.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("zero-shot classification failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("topic resolution failed: {0}")]
    Resolver(#[from] ResolverError),
}

impl GuardError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, GuardError::Configuration(_))
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Overrides the guard's default client arguments for this call.
    pub client_args: ClientArgs,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_args(mut self, client_args: ClientArgs) -> Self {
        self.client_args = client_args;
        self
    }
}

/// What a validation decided and what it was based on.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub verdict: Verdict,
    pub mode: Mode,
    pub threshold: Threshold,

    /// Classifier output, when the classifier was consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<ScoredTopic>>,

    /// The LLM's answer, when the LLM was consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_topic: Option<String>,

    pub evaluated_at: DateTime<Utc>,
}

impl Assessment {
    fn new(mode: Mode, threshold: Threshold) -> Self {
        Self {
            verdict: Verdict::Pass,
            mode,
            threshold,
            scores: None,
            resolved_topic: None,
            evaluated_at: Utc::now(),
        }
    }

    fn decided(mut self, verdict: Verdict) -> Self {
        self.verdict = verdict;
        self
    }

    pub fn classifier_consulted(&self) -> bool {
        self.scores.is_some()
    }

    pub fn llm_consulted(&self) -> bool {
        self.resolved_topic.is_some()
    }
}

/// Validates that a text is about an allowed topic.
///
/// Holds immutable configuration and shared handles to its models, so one
/// guard can serve concurrent tasks.
#[derive(Clone)]
pub struct TopicGuard {
    config: TopicConfiguration,
    scorer: Option<ZeroShotScorer>,
    resolver: Option<Arc<dyn TopicResolver>>,
    client_args: ClientArgs,
}

impl std::fmt::Debug for TopicGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicGuard")
            .field("config", &self.config)
            .field("scorer", &self.scorer)
            .field("resolver", &self.resolver.as_ref().map(|r| r.name()))
            .field("client_args", &self.client_args)
            .finish()
    }
}

impl TopicGuard {
    pub fn builder(config: TopicConfiguration) -> TopicGuardBuilder {
        TopicGuardBuilder::new(config)
    }

    pub fn config(&self) -> &TopicConfiguration {
        &self.config
    }

    /// Validate `text` with the guard's default client arguments.
    pub async fn validate(&self, text: &str) -> Result<Verdict, GuardError> {
        self.validate_with(text, &ValidateOptions::default()).await
    }

    pub async fn validate_with(
        &self,
        text: &str,
        options: &ValidateOptions,
    ) -> Result<Verdict, GuardError> {
        Ok(self.assess_with(text, options).await?.verdict)
    }

    /// Like [`TopicGuard::validate`], but keeps the evidence.
    pub async fn assess(&self, text: &str) -> Result<Assessment, GuardError> {
        self.assess_with(text, &ValidateOptions::default()).await
    }

    pub async fn assess_with(
        &self,
        text: &str,
        options: &ValidateOptions,
    ) -> Result<Assessment, GuardError> {
        let mode = self.config.validate()?;
        let client_args = options.client_args.or(&self.client_args);
        let assessment = Assessment::new(mode, self.config.threshold());

        tracing::debug!(%mode, threshold = %self.config.threshold(), "Validating text");

        let assessment = match mode {
            Mode::Ensemble => self.run_ensemble(text, &client_args, assessment).await?,
            Mode::ClassifierOnly => self.run_classifier_only(text, assessment).await?,
            Mode::LlmOnly => self.run_llm_only(text, &client_args, assessment).await?,
        };

        tracing::info!(
            %mode,
            passed = assessment.verdict.is_pass(),
            "Topic validation complete"
        );
        Ok(assessment)
    }

    async fn run_ensemble(
        &self,
        text: &str,
        client_args: &ClientArgs,
        mut assessment: Assessment,
    ) -> Result<Assessment, GuardError> {
        let scores = self
            .scorer()?
            .score(text, &self.config.invalid_candidates())
            .await?;
        let screened = policy::screen_invalid_topics(&self.config, &scores);
        assessment.scores = Some(scores);

        if let Some(verdict) = screened {
            return Ok(assessment.decided(verdict));
        }

        let topic = self.resolve(text, client_args).await?;
        let verdict = policy::verify_topic(&self.config, &topic);
        assessment.resolved_topic = Some(topic);
        Ok(assessment.decided(verdict))
    }

    async fn run_classifier_only(
        &self,
        text: &str,
        mut assessment: Assessment,
    ) -> Result<Assessment, GuardError> {
        let scores = self
            .scorer()?
            .score(text, &self.config.all_candidates())
            .await?;
        let verdict = policy::scan_all_topics(&self.config, &scores);
        assessment.scores = Some(scores);
        Ok(assessment.decided(verdict))
    }

    async fn run_llm_only(
        &self,
        text: &str,
        client_args: &ClientArgs,
        mut assessment: Assessment,
    ) -> Result<Assessment, GuardError> {
        let topic = self.resolve(text, client_args).await?;
        let verdict = policy::verify_topic(&self.config, &topic);
        assessment.resolved_topic = Some(topic);
        Ok(assessment.decided(verdict))
    }

    async fn resolve(&self, text: &str, client_args: &ClientArgs) -> Result<String, GuardError> {
        let resolver = self
            .resolver
            .as_ref()
            .ok_or(ConfigurationError::MissingResolver)?;
        let topic = resolver
            .resolve(text, &self.config.invalid_candidates(), client_args)
            .await?;
        tracing::debug!(resolver = resolver.name(), %topic, "LLM resolved topic");
        Ok(topic)
    }

    fn scorer(&self) -> Result<&ZeroShotScorer, ConfigurationError> {
        self.scorer
            .as_ref()
            .ok_or(ConfigurationError::MissingClassifier)
    }
}

/// Builder for [`TopicGuard`].
///
/// Without explicit clients the builder falls back to the Hugging Face
/// classifier and the OpenAI provider when those features are enabled.
pub struct TopicGuardBuilder {
    config: TopicConfiguration,
    classifier: Option<Arc<dyn ZeroShotClassifier>>,
    llm: Option<LlmCallable>,
    resolver: Option<Arc<dyn TopicResolver>>,
    provider: Option<Arc<dyn LlmProvider>>,
    client_args: ClientArgs,
    retry: RetryPolicy,
}

impl TopicGuardBuilder {
    pub fn new(config: TopicConfiguration) -> Self {
        Self {
            config,
            classifier: None,
            llm: None,
            resolver: None,
            provider: None,
            client_args: ClientArgs::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Use this zero-shot classifier.
    pub fn classifier(mut self, classifier: Arc<dyn ZeroShotClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Resolve with a hosted model name or a custom function.
    pub fn llm_callable(mut self, llm: impl Into<LlmCallable>) -> Self {
        self.llm = Some(llm.into());
        self
    }

    /// Use a ready-made resolver, bypassing [`LlmCallable`].
    pub fn resolver(mut self, resolver: Arc<dyn TopicResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Chat provider for hosted model names.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Default client arguments for every call.
    pub fn client_args(mut self, client_args: ClientArgs) -> Self {
        self.client_args = client_args;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the guard.
    ///
    /// A named model outside the allow-list fails here with
    /// [`ConfigurationError::UnsupportedModel`], whether or not the LLM is
    /// enabled. Topic-set invariants are checked on every validation, not
    /// here.
    pub fn build(self) -> Result<TopicGuard, ConfigurationError> {
        let scorer = match self.classifier {
            Some(classifier) => Some(ZeroShotScorer::new(classifier)),
            None if self.config.classifier_enabled() => {
                Some(ZeroShotScorer::new(default_classifier()?))
            }
            None => None,
        };

        let resolver = match (self.resolver, self.llm) {
            (Some(resolver), _) => Some(resolver),
            (None, Some(llm)) => Some(make_resolver(llm, self.provider, &self.retry)?),
            (None, None) if self.config.llm_enabled() => Some(make_resolver(
                LlmCallable::default(),
                self.provider,
                &self.retry,
            )?),
            (None, None) => None,
        };

        Ok(TopicGuard {
            config: self.config,
            scorer,
            resolver,
            client_args: self.client_args,
        })
    }
}

fn make_resolver(
    llm: LlmCallable,
    provider: Option<Arc<dyn LlmProvider>>,
    retry: &RetryPolicy,
) -> Result<Arc<dyn TopicResolver>, ConfigurationError> {
    match llm {
        LlmCallable::Model(name) => {
            let model: HostedModel = name.parse()?;
            let provider = match provider {
                Some(provider) => provider,
                None => default_provider()?,
            };
            Ok(Arc::new(
                HostedTopicResolver::new(provider, model).with_retry_policy(retry.clone()),
            ))
        }
        LlmCallable::Custom(func) => Ok(Arc::new(
            CallableTopicResolver::new(func).with_retry_policy(retry.clone()),
        )),
    }
}

#[cfg(feature = "huggingface")]
fn default_classifier() -> Result<Arc<dyn ZeroShotClassifier>, ConfigurationError> {
    Ok(Arc::new(crate::classifier::HuggingFaceClassifier::new()))
}

#[cfg(not(feature = "huggingface"))]
fn default_classifier() -> Result<Arc<dyn ZeroShotClassifier>, ConfigurationError> {
    Err(ConfigurationError::MissingClassifier)
}

#[cfg(feature = "openai")]
fn default_provider() -> Result<Arc<dyn LlmProvider>, ConfigurationError> {
    Ok(Arc::new(crate::providers::OpenAiProvider::new()))
}

#[cfg(not(feature = "openai"))]
fn default_provider() -> Result<Arc<dyn LlmProvider>, ConfigurationError> {
    Err(ConfigurationError::MissingResolver)
}
