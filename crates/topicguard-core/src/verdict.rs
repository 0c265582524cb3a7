//! Scores in, verdicts out.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One label with the relevance score a zero-shot model gave it.
///
/// Scores come from a multi-label model, so they are independent of each
/// other and need not sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTopic {
    pub label: String,
    pub score: f64,
}

impl ScoredTopic {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Why a text was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// The classifier screen flagged one or more invalid topics.
    InvalidTopicsFound { topics: Vec<String> },

    /// A classifier-only scan hit an invalid topic.
    InvalidTopicFound { topic: String },

    /// A classifier-only scan confirmed none of the valid topics.
    NoValidTopic,

    /// The LLM's pick is not one of the valid topics.
    MostRelevantTopic { topic: String },
}

impl Rejection {
    /// Topics named by this rejection, in the order they were reported.
    pub fn topics(&self) -> Vec<&str> {
        match self {
            Rejection::InvalidTopicsFound { topics } => topics.iter().map(String::as_str).collect(),
            Rejection::InvalidTopicFound { topic } | Rejection::MostRelevantTopic { topic } => {
                vec![topic.as_str()]
            }
            Rejection::NoValidTopic => Vec::new(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InvalidTopicsFound { topics } => write!(
                f,
                "The following invalid topics were found to be relevant: {}",
                topics.join(", ")
            ),
            Rejection::InvalidTopicFound { topic } => {
                write!(f, "Invalid topic '{}' was found to be relevant.", topic)
            }
            Rejection::NoValidTopic => write!(f, "No valid topic was found."),
            Rejection::MostRelevantTopic { topic } => {
                write!(f, "Most relevant topic is {}.", topic)
            }
        }
    }
}

/// Outcome of one validation.
///
/// `Fail` is a normal, well-formed answer; errors are reported separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "rejection", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail(Rejection),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_fail(&self) -> bool {
        !self.is_pass()
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(rejection) => Some(rejection),
        }
    }

    /// Human-readable explanation, present only for `Fail`.
    pub fn message(&self) -> Option<String> {
        self.rejection().map(ToString::to_string)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail(rejection) => write!(f, "FAIL: {}", rejection),
        }
    }
}
