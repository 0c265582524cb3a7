//! Policy document parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_policy_schema;
use crate::topics::{ConfigurationError, Threshold, TopicConfiguration};

/// Errors that can occur when loading a policy document.
#[derive(Error, Debug)]
pub enum PolicyFileError {
    #[error("Failed to read policy file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Policy does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// A topic list written either as a single string or as a sequence.
///
/// `valid_topics: sports` and `valid_topics: [sports]` mean the same thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicList {
    One(String),
    Many(Vec<String>),
}

impl TopicList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TopicList::One(topic) => vec![topic],
            TopicList::Many(topics) => topics,
        }
    }
}

impl Default for TopicList {
    fn default() -> Self {
        TopicList::Many(Vec::new())
    }
}

/// The topic section of a guard configuration.
///
/// Unknown keys are ignored so the same file can also carry client
/// settings for the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Topics the text should be about
    pub valid_topics: TopicList,

    /// Topics the text must not be about
    #[serde(default, deserialize_with = "nullable_topics")]
    pub invalid_topics: TopicList,

    /// Score a label must strictly exceed; `null` or `0` means 0.5
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Skip the zero-shot classifier
    #[serde(default)]
    pub disable_classifier: bool,

    /// Skip the LLM
    #[serde(default)]
    pub disable_llm: bool,
}

fn nullable_topics<'de, D>(deserializer: D) -> Result<TopicList, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<TopicList>::deserialize(deserializer)?.unwrap_or_default())
}

impl PolicyDocument {
    /// Parse a policy from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, PolicyFileError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a policy from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PolicyFileError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a policy file, picking the format from the extension.
    ///
    /// `.json` is read as JSON; everything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyFileError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Validate an already-parsed document against the schema and
    /// deserialize it.
    pub fn from_value(value: serde_json::Value) -> Result<Self, PolicyFileError> {
        validate_policy_schema(&value).map_err(PolicyFileError::SchemaError)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Build the immutable configuration.
    ///
    /// Only the threshold range is checked here. Topic-set invariants are
    /// checked by [`TopicConfiguration::validate`] on every validation.
    pub fn to_configuration(&self) -> Result<TopicConfiguration, ConfigurationError> {
        let threshold = match self.threshold {
            Some(value) => Threshold::new(value)?,
            None => Threshold::DEFAULT,
        };

        Ok(TopicConfiguration::new(self.valid_topics.clone().into_vec())
            .with_invalid_topics(self.invalid_topics.clone().into_vec())
            .with_threshold(threshold)
            .with_classifier(!self.disable_classifier)
            .with_llm(!self.disable_llm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::Mode;

    const VALID_POLICY: &str = r#"
valid_topics:
  - sports
  - fitness
invalid_topics:
  - politics
threshold: 0.7
disable_llm: true
"#;

    #[test]
    fn test_parse_valid_policy() {
        let doc = PolicyDocument::from_yaml(VALID_POLICY).unwrap();
        assert_eq!(
            doc.valid_topics,
            TopicList::Many(vec!["sports".into(), "fitness".into()])
        );
        assert_eq!(doc.threshold, Some(0.7));
        assert!(doc.disable_llm);
        assert!(!doc.disable_classifier);

        let config = doc.to_configuration().unwrap();
        assert_eq!(config.threshold().value(), 0.7);
        assert_eq!(config.validate(), Ok(Mode::ClassifierOnly));
    }

    #[test]
    fn test_single_string_topic() {
        let doc =
            PolicyDocument::from_yaml("valid_topics: sports\ninvalid_topics: politics\n").unwrap();
        let config = doc.to_configuration().unwrap();
        assert!(config.is_valid_topic("sports"));
        assert!(config.is_invalid_topic("politics"));
    }

    #[test]
    fn test_single_string_is_one_label() {
        let doc = PolicyDocument::from_yaml("valid_topics: \"sports, music\"\n").unwrap();
        let config = doc.to_configuration().unwrap();
        assert_eq!(config.valid_topics().len(), 1);
        assert!(config.is_valid_topic("sports, music"));
        assert!(!config.is_valid_topic("sports"));
    }

    #[test]
    fn test_null_invalid_topics_become_empty() {
        let doc =
            PolicyDocument::from_yaml("valid_topics: [sports]\ninvalid_topics: null\n").unwrap();
        let config = doc.to_configuration().unwrap();
        assert_eq!(config.validate(), Err(ConfigurationError::NoInvalidTopics));
    }

    #[test]
    fn test_zero_threshold_uses_default() {
        let doc = PolicyDocument::from_json(
            r#"{"valid_topics": ["sports"], "invalid_topics": ["politics"], "threshold": 0}"#,
        )
        .unwrap();
        assert_eq!(doc.to_configuration().unwrap().threshold(), Threshold::DEFAULT);
    }

    #[test]
    fn test_schema_error_surfaces() {
        let result = PolicyDocument::from_yaml("invalid_topics: [politics]\n");
        assert!(matches!(result, Err(PolicyFileError::SchemaError(_))));
    }

    #[test]
    fn test_unknown_sections_ignored() {
        let yaml = r#"
valid_topics: [sports]
invalid_topics: [politics]
llm:
  model: gpt-4
"#;
        assert!(PolicyDocument::from_yaml(yaml).is_ok());
    }

    #[test]
    fn test_malformed_yaml() {
        let result = PolicyDocument::from_yaml("valid_topics: [sports");
        assert!(matches!(result, Err(PolicyFileError::YamlError(_))));
    }
}
