//! Rendering of check and lint results.

use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write;

use topicguard_core::Mode;
use topicguard_runtime::Assessment;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for scripting
    Json,
}

/// Outcome of `topicguard lint`.
#[derive(Debug, Clone, Serialize)]
pub struct LintReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    pub valid_topics: Vec<String>,
    pub invalid_topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub errors: Vec<String>,
}

impl LintReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            mode: None,
            valid_topics: Vec::new(),
            invalid_topics: Vec::new(),
            threshold: None,
            errors: vec![error.into()],
        }
    }
}

pub fn render_assessment(
    assessment: &Assessment,
    format: OutputFormat,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(assessment),
        OutputFormat::Text => {
            let mut out = assessment.verdict.to_string();
            let _ = write!(
                out,
                "\n  mode: {}\n  threshold: {}",
                assessment.mode, assessment.threshold
            );
            if let Some(scores) = &assessment.scores {
                out.push_str("\n  scores:");
                for scored in scores {
                    let _ = write!(out, "\n    {:<24} {:.3}", scored.label, scored.score);
                }
            }
            if let Some(topic) = &assessment.resolved_topic {
                let _ = write!(out, "\n  llm topic: {}", topic);
            }
            Ok(out)
        }
    }
}

pub fn render_lint(report: &LintReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report),
        OutputFormat::Text => {
            if !report.valid {
                let mut out = String::from("INVALID");
                for error in &report.errors {
                    let _ = write!(out, "\n  - {}", error);
                }
                return Ok(out);
            }

            let mut out = String::from("OK");
            if let Some(mode) = report.mode {
                let _ = write!(out, "\n  mode: {}", mode);
            }
            let _ = write!(out, "\n  valid topics: {}", report.valid_topics.join(", "));
            let _ = write!(out, "\n  invalid topics: {}", report.invalid_topics.join(", "));
            if let Some(threshold) = report.threshold {
                let _ = write!(out, "\n  threshold: {}", threshold);
            }
            Ok(out)
        }
    }
}
