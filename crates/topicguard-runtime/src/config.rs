//! Guard configuration files.
//!
//! One YAML or JSON document carries the topic policy (see
//! [`topicguard_core::PolicyDocument`]) plus optional `classifier`, `llm`
//! and `retry` sections for the runtime clients.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use topicguard_core::{ConfigurationError, Mode, PolicyDocument, PolicyFileError};

use crate::classifier::{ZeroShotClassifier, DEFAULT_CLASSIFIER_MODEL};
use crate::guard::{TopicGuard, TopicGuardBuilder};
use crate::providers::{check_base_url, CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::{humantime_duration, RetryPolicy};
use crate::resolver::{HostedModel, HostedTopicResolver};

/// Errors from loading a guard configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Policy(#[from] PolicyFileError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Provider configuration error: {0}")]
    Provider(#[from] ProviderError),
}

/// Zero-shot classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub model: String,

    /// Inference endpoint; the public Hugging Face API when unset.
    pub base_url: Option<String>,

    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            base_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClassifierSettings {
    #[cfg(feature = "huggingface")]
    fn build(&self) -> Result<Arc<dyn ZeroShotClassifier>, ConfigError> {
        let mut classifier = crate::classifier::HuggingFaceClassifier::new()
            .with_model(&self.model)
            .with_timeout(self.timeout);
        if let Some(base_url) = &self.base_url {
            classifier = classifier.with_base_url(base_url);
        }
        Ok(Arc::new(classifier))
    }

    #[cfg(not(feature = "huggingface"))]
    fn build(&self) -> Result<Arc<dyn ZeroShotClassifier>, ConfigError> {
        Err(ConfigurationError::MissingClassifier.into())
    }

    fn check_base_url(&self) -> Result<(), ProviderError> {
        match &self.base_url {
            Some(url) => check_base_url(url),
            None => Ok(()),
        }
    }
}

/// Hosted LLM settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSettings {
    pub model: String,

    /// API base; the provider default when unset.
    pub api_base: Option<String>,

    #[serde(with = "humantime_duration")]
    pub timeout: Duration,

    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: HostedModel::default().as_str().to_string(),
            api_base: None,
            timeout: Duration::from_secs(15),
            max_tokens: 100,
        }
    }
}

impl LlmSettings {
    pub fn hosted_model(&self) -> Result<HostedModel, ConfigurationError> {
        self.model.parse()
    }

    #[cfg(feature = "openai")]
    fn build_provider(&self) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        let config = serde_json::json!({ "base_url": self.api_base });
        Ok(Arc::new(crate::providers::OpenAiProvider::from_config(&config)?))
    }

    #[cfg(not(feature = "openai"))]
    fn build_provider(&self) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        Err(ConfigurationError::MissingResolver.into())
    }

    fn check_api_base(&self) -> Result<(), ProviderError> {
        match &self.api_base {
            Some(url) => check_base_url(url),
            None => Ok(()),
        }
    }

    fn completion_config(&self, model: HostedModel) -> CompletionConfig {
        CompletionConfig {
            model: model.as_str().to_string(),
            max_tokens: self.max_tokens,
            timeout: self.timeout,
            ..CompletionConfig::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClientSections {
    #[serde(default)]
    classifier: ClassifierSettings,
    #[serde(default)]
    llm: LlmSettings,
    #[serde(default)]
    retry: RetryPolicy,
}

/// A complete guard configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardConfig {
    pub policy: PolicyDocument,
    pub classifier: ClassifierSettings,
    pub llm: LlmSettings,
    pub retry: RetryPolicy,
}

impl GuardConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Load a config file; `.json` is read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loading guard config");
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// The topic section is schema-checked first; client sections are
    /// deserialized after.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let policy = PolicyDocument::from_value(value.clone())?;
        let sections: ClientSections = serde_json::from_value(value)?;

        Ok(Self {
            policy,
            classifier: sections.classifier,
            llm: sections.llm,
            retry: sections.retry,
        })
    }

    /// Check everything a guard build would check, without building clients.
    ///
    /// Returns the mode validations would run in.
    pub fn check(&self) -> Result<Mode, ConfigError> {
        let topics = self.policy.to_configuration()?;
        let mode = topics.validate()?;

        self.llm.hosted_model()?;
        if mode.uses_classifier() {
            self.classifier.check_base_url()?;
        }
        if mode.uses_llm() {
            self.llm.check_api_base()?;
        }
        Ok(mode)
    }

    /// A guard builder wired with the configured clients.
    ///
    /// Callers can still add default client arguments before building.
    pub fn guard_builder(&self) -> Result<TopicGuardBuilder, ConfigError> {
        let topics = self.policy.to_configuration()?;
        let model = self.llm.hosted_model()?;
        let classifier_enabled = topics.classifier_enabled();
        let llm_enabled = topics.llm_enabled();

        let mut builder = TopicGuard::builder(topics).retry_policy(self.retry.clone());

        if classifier_enabled {
            builder = builder.classifier(self.classifier.build()?);
        }

        if llm_enabled {
            let provider = self.llm.build_provider()?;
            let resolver = HostedTopicResolver::new(provider, model)
                .with_completion_config(self.llm.completion_config(model))
                .with_retry_policy(self.retry.clone());
            builder = builder.resolver(Arc::new(resolver));
        }

        Ok(builder)
    }

    pub fn build_guard(&self) -> Result<TopicGuard, ConfigError> {
        Ok(self.guard_builder()?.build()?)
    }
}
