//! Policy documents.
//!
//! A policy document is the topic portion of a guard configuration file,
//! written in YAML or JSON and validated against an embedded JSON Schema
//! before it is turned into a [`TopicConfiguration`](crate::TopicConfiguration).

mod parser;
mod schema;

pub use parser::{PolicyDocument, PolicyFileError, TopicList};
pub use schema::validate_policy_schema;
