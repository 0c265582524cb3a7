//! Zero-shot topic classification.
//!
//! A [`ZeroShotClassifier`] scores one text against a list of candidate
//! labels. [`ZeroShotScorer`] wraps any classifier and checks its output
//! before the policy layer sees it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use topicguard_core::ScoredTopic;

#[cfg(feature = "huggingface")]
mod huggingface;

#[cfg(feature = "huggingface")]
pub use huggingface::{HuggingFaceClassifier, HF_API_TOKEN_ENV, HF_INFERENCE_URL};

/// Default NLI model for zero-shot classification.
pub const DEFAULT_CLASSIFIER_MODEL: &str = "facebook/bart-large-mnli";

/// Hypothesis each candidate label is substituted into.
pub const HYPOTHESIS_TEMPLATE: &str = "This example has to do with topic {}.";

/// Errors from a zero-shot classifier.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Http(String),

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("classifier API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("could not parse classifier output: {0}")]
    Parse(String),

    #[error("classifier returned {labels} labels but {scores} scores")]
    MismatchedOutput { labels: usize, scores: usize },

    #[error("classifier returned score {score} for '{label}', expected a value in [0, 1]")]
    ScoreOutOfRange { label: String, score: f64 },

    #[error("classifier returned unknown label '{0}'")]
    UnknownLabel(String),
}

/// Raw classifier output: parallel label and score lists, usually sorted by
/// descending score.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZeroShotOutput {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl ZeroShotOutput {
    pub fn new(labels: Vec<String>, scores: Vec<f64>) -> Self {
        Self { labels, scores }
    }
}

/// Scores a text against candidate labels, independently per label.
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
    ) -> Result<ZeroShotOutput, ClassifierError>;

    /// Model identifier for logs.
    fn name(&self) -> &str;
}

/// Runs a classifier and checks its output.
///
/// Labels keep the order the classifier returned them in.
#[derive(Clone)]
pub struct ZeroShotScorer {
    classifier: Arc<dyn ZeroShotClassifier>,
}

impl std::fmt::Debug for ZeroShotScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZeroShotScorer")
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

impl ZeroShotScorer {
    pub fn new(classifier: Arc<dyn ZeroShotClassifier>) -> Self {
        Self { classifier }
    }

    /// Score `text` against `candidates`.
    ///
    /// Fails when the output is not one score in `[0, 1]` per returned
    /// label, or when a returned label was never a candidate.
    pub async fn score(
        &self,
        text: &str,
        candidates: &[String],
    ) -> Result<Vec<ScoredTopic>, ClassifierError> {
        let output = self.classifier.classify(text, candidates).await?;

        if output.labels.len() != output.scores.len() {
            return Err(ClassifierError::MismatchedOutput {
                labels: output.labels.len(),
                scores: output.scores.len(),
            });
        }

        let scored = output
            .labels
            .into_iter()
            .zip(output.scores)
            .map(|(label, score)| {
                if !(0.0..=1.0).contains(&score) {
                    return Err(ClassifierError::ScoreOutOfRange { label, score });
                }
                if !candidates.contains(&label) {
                    return Err(ClassifierError::UnknownLabel(label));
                }
                Ok(ScoredTopic::new(label, score))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            classifier = self.classifier.name(),
            candidates = candidates.len(),
            scored = scored.len(),
            "Zero-shot classification complete"
        );

        Ok(scored)
    }
}
