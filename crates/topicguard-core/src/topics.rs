//! Topic sets, threshold and model selection.
//!
//! A [`TopicConfiguration`] is built once and never mutated. It is checked
//! again at the start of every validation through
//! [`TopicConfiguration::validate`], which also derives the [`Mode`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Setup problems. Always fatal, never a verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("`valid_topics` must be set and contain at least one topic")]
    NoValidTopics,

    #[error("`invalid_topics` must be set and contain at least one topic")]
    NoInvalidTopics,

    #[error("a topic cannot be valid and invalid at the same time: {topics:?}")]
    OverlappingTopics { topics: Vec<String> },

    #[error("either the classifier or the LLM must be enabled")]
    NoModelEnabled,

    #[error("threshold must be within (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("topic labels must not be blank")]
    BlankTopic,

    #[error(
        "unsupported LLM model '{0}': expected 'gpt-3.5-turbo' or 'gpt-4'; \
         supply a custom resolver to use any other model"
    )]
    UnsupportedModel(String),

    #[error("the classifier is enabled but no zero-shot classifier is configured")]
    MissingClassifier,

    #[error("the LLM is enabled but no topic resolver is configured")]
    MissingResolver,
}

/// Minimum score a label must strictly exceed to be actionable.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    pub const DEFAULT: Threshold = Threshold(0.5);

    /// Build a threshold. Zero falls back to [`Threshold::DEFAULT`]; anything
    /// else outside (0, 1] is rejected.
    pub fn new(value: f64) -> Result<Self, ConfigurationError> {
        if value == 0.0 {
            return Ok(Self::DEFAULT);
        }
        if value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(ConfigurationError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Strict comparison: a score equal to the threshold does not count.
    pub fn is_exceeded_by(self, score: f64) -> bool {
        score > self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which signals a validation consults.
///
/// Derived from the two enable flags; both disabled is a
/// [`ConfigurationError::NoModelEnabled`], not a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Classifier screens invalid topics first, LLM decides the rest.
    Ensemble,
    /// Classifier scores every topic, no LLM call.
    ClassifierOnly,
    /// LLM picks the topic, no classifier call.
    LlmOnly,
}

impl Mode {
    pub fn from_flags(
        classifier_enabled: bool,
        llm_enabled: bool,
    ) -> Result<Self, ConfigurationError> {
        match (classifier_enabled, llm_enabled) {
            (true, true) => Ok(Mode::Ensemble),
            (true, false) => Ok(Mode::ClassifierOnly),
            (false, true) => Ok(Mode::LlmOnly),
            (false, false) => Err(ConfigurationError::NoModelEnabled),
        }
    }

    pub fn uses_classifier(self) -> bool {
        matches!(self, Mode::Ensemble | Mode::ClassifierOnly)
    }

    pub fn uses_llm(self) -> bool {
        matches!(self, Mode::Ensemble | Mode::LlmOnly)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Ensemble => write!(f, "ensemble"),
            Mode::ClassifierOnly => write!(f, "classifier_only"),
            Mode::LlmOnly => write!(f, "llm_only"),
        }
    }
}

/// Valid and invalid topics plus the knobs that decide how they are checked.
///
/// Topics are kept in ordered sets so the candidate lists handed to the
/// models are stable from call to call.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicConfiguration {
    valid_topics: BTreeSet<String>,
    invalid_topics: BTreeSet<String>,
    threshold: Threshold,
    classifier_enabled: bool,
    llm_enabled: bool,
}

impl TopicConfiguration {
    /// Start from the valid topics. Invalid topics default to empty, the
    /// threshold to 0.5 and both models are enabled.
    pub fn new<I, S>(valid_topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            valid_topics: valid_topics.into_iter().map(Into::into).collect(),
            invalid_topics: BTreeSet::new(),
            threshold: Threshold::DEFAULT,
            classifier_enabled: true,
            llm_enabled: true,
        }
    }

    pub fn with_invalid_topics<I, S>(mut self, invalid_topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalid_topics = invalid_topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_classifier(mut self, enabled: bool) -> Self {
        self.classifier_enabled = enabled;
        self
    }

    pub fn with_llm(mut self, enabled: bool) -> Self {
        self.llm_enabled = enabled;
        self
    }

    pub fn valid_topics(&self) -> &BTreeSet<String> {
        &self.valid_topics
    }

    pub fn invalid_topics(&self) -> &BTreeSet<String> {
        &self.invalid_topics
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn classifier_enabled(&self) -> bool {
        self.classifier_enabled
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm_enabled
    }

    pub fn is_valid_topic(&self, topic: &str) -> bool {
        self.valid_topics.contains(topic)
    }

    pub fn is_invalid_topic(&self, topic: &str) -> bool {
        self.invalid_topics.contains(topic)
    }

    /// Candidates for the ensemble screen and for the LLM: invalid topics only.
    pub fn invalid_candidates(&self) -> Vec<String> {
        self.invalid_topics.iter().cloned().collect()
    }

    /// Candidates for a classifier-only scan: invalid topics, then valid ones.
    pub fn all_candidates(&self) -> Vec<String> {
        self.invalid_topics
            .iter()
            .chain(self.valid_topics.iter())
            .cloned()
            .collect()
    }

    /// Check the invariants and derive the mode.
    ///
    /// Checks run in a fixed order: empty valid set, empty invalid set,
    /// overlap, blank labels, then the model flags.
    pub fn validate(&self) -> Result<Mode, ConfigurationError> {
        if self.valid_topics.is_empty() {
            return Err(ConfigurationError::NoValidTopics);
        }
        if self.invalid_topics.is_empty() {
            return Err(ConfigurationError::NoInvalidTopics);
        }

        let overlap: Vec<String> = self
            .valid_topics
            .intersection(&self.invalid_topics)
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigurationError::OverlappingTopics { topics: overlap });
        }

        if self
            .valid_topics
            .iter()
            .chain(self.invalid_topics.iter())
            .any(|t| t.trim().is_empty())
        {
            return Err(ConfigurationError::BlankTopic);
        }

        Mode::from_flags(self.classifier_enabled, self.llm_enabled)
    }
}
