//! # topicguard-runtime
//!
//! Model clients and orchestration for topicguard.
//!
//! `topicguard-core` decides what classifier scores and LLM answers mean.
//! This crate talks to the models: a zero-shot classifier scores the text
//! against candidate topics, an LLM picks the single most relevant topic,
//! and [`TopicGuard`] calls them in the order the configured mode needs.
//!
//! ## Example
//!
//! ```rust,ignore
//! use topicguard_core::TopicConfiguration;
//! use topicguard_runtime::{ClientArgs, TopicGuard};
//!
//! let config = TopicConfiguration::new(["sports"]).with_invalid_topics(["politics"]);
//! let guard = TopicGuard::builder(config)
//!     .llm_callable("gpt-4")
//!     .client_args(ClientArgs::new().with_api_key(api_key))
//!     .build()?;
//!
//! let verdict = guard.validate("What a match last night!").await?;
//! ```
//!
//! ## Features
//!
//! - `openai` (default): hosted chat models through the OpenAI API
//! - `huggingface` (default): zero-shot classification through the
//!   Hugging Face inference API
//!
//! Without them, clients must be supplied to the builder.

pub mod classifier;
pub mod config;
pub mod guard;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod resolver;

pub use classifier::{ClassifierError, ZeroShotClassifier, ZeroShotOutput, ZeroShotScorer};
pub use config::{ConfigError, GuardConfig};
pub use guard::{Assessment, GuardError, TopicGuard, TopicGuardBuilder, ValidateOptions};
pub use providers::{ClientArgs, LlmProvider, ProviderError};
pub use resilience::RetryPolicy;
pub use resolver::{HostedModel, LlmCallable, ResolverError, TopicResolver};
