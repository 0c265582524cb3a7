//! The decision policy.
//!
//! Pure functions over a [`TopicConfiguration`] and model outputs. The
//! runtime decides *which* of these to call and in what order; this module
//! decides what the outputs mean.
//!
//! Every scan walks the scores in the order the model returned them.

use crate::topics::TopicConfiguration;
use crate::verdict::{Rejection, ScoredTopic, Verdict};

/// Invalid topics whose score strictly exceeds the threshold.
///
/// Labels the model returned that are not invalid topics are ignored.
pub fn flag_invalid_topics(
    config: &TopicConfiguration,
    scores: &[ScoredTopic],
) -> Vec<String> {
    let threshold = config.threshold();
    scores
        .iter()
        .filter(|s| threshold.is_exceeded_by(s.score) && config.is_invalid_topic(&s.label))
        .map(|s| s.label.clone())
        .collect()
}

/// First pass of the ensemble.
///
/// Returns a `Fail` listing every flagged invalid topic, or `None` when the
/// screen is clean and the LLM should decide.
pub fn screen_invalid_topics(
    config: &TopicConfiguration,
    scores: &[ScoredTopic],
) -> Option<Verdict> {
    let flagged = flag_invalid_topics(config, scores);
    if flagged.is_empty() {
        tracing::debug!("No invalid topic exceeded the threshold");
        return None;
    }

    tracing::debug!(topics = ?flagged, "Invalid topics flagged by classifier");
    Some(Verdict::Fail(Rejection::InvalidTopicsFound { topics: flagged }))
}

/// Classifier-only decision over invalid and valid topics together.
///
/// The first invalid topic over the threshold fails the text immediately.
/// Otherwise at least one valid topic must be over the threshold.
pub fn scan_all_topics(config: &TopicConfiguration, scores: &[ScoredTopic]) -> Verdict {
    let threshold = config.threshold();
    let mut confirmed = Vec::new();

    for scored in scores {
        if !threshold.is_exceeded_by(scored.score) {
            continue;
        }
        if config.is_valid_topic(&scored.label) {
            confirmed.push(scored.label.as_str());
        }
        if config.is_invalid_topic(&scored.label) {
            tracing::debug!(
                topic = %scored.label,
                score = scored.score,
                "Invalid topic over threshold"
            );
            return Verdict::Fail(Rejection::InvalidTopicFound {
                topic: scored.label.clone(),
            });
        }
    }

    if confirmed.is_empty() {
        return Verdict::Fail(Rejection::NoValidTopic);
    }

    tracing::debug!(topics = ?confirmed, "Valid topics confirmed");
    Verdict::Pass
}

/// Check the topic an LLM picked against the **valid** topics.
///
/// The LLM is asked to choose among the invalid topics, yet its answer is
/// checked for membership in the valid set. Existing deployments rely on
/// this exact behavior, so it is kept as is.
pub fn verify_topic(config: &TopicConfiguration, topic: &str) -> Verdict {
    if config.is_valid_topic(topic) {
        Verdict::Pass
    } else {
        Verdict::Fail(Rejection::MostRelevantTopic {
            topic: topic.to_string(),
        })
    }
}
