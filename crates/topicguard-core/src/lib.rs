//! # topicguard-core
//!
//! Deterministic topic restriction policy.
//!
//! This crate answers one question: given the scores a zero-shot classifier
//! produced, or the single topic a language model picked, is the text
//! allowed through?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same configuration and model outputs always yield
//!    the same verdict
//! 2. **No model calls**: scoring and resolution happen in
//!    `topicguard-runtime`; this crate only applies the policy
//! 3. **Explainable**: every `Fail` carries a [`Rejection`] naming the
//!    offending or missing topic(s)
//! 4. **Strict thresholds**: a score must be strictly greater than the
//!    threshold to count
//!
//! ## Example
//!
//! ```rust
//! use topicguard_core::{policy, ScoredTopic, TopicConfiguration, Verdict};
//!
//! let config = TopicConfiguration::new(["sports"])
//!     .with_invalid_topics(["politics"])
//!     .with_llm(false);
//! config.validate().unwrap();
//!
//! let scores = vec![
//!     ScoredTopic::new("sports", 0.9),
//!     ScoredTopic::new("politics", 0.3),
//! ];
//! assert_eq!(policy::scan_all_topics(&config, &scores), Verdict::Pass);
//! ```

pub mod document;
pub mod policy;
pub mod topics;
pub mod verdict;

pub use document::{validate_policy_schema, PolicyDocument, PolicyFileError, TopicList};
pub use topics::{ConfigurationError, Mode, Threshold, TopicConfiguration};
pub use verdict::{Rejection, ScoredTopic, Verdict};
