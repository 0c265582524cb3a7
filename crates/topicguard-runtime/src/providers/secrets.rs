//! Secure credential handling for model providers.
//!
//! Credentials are wrapped in [`ApiCredential`] as soon as they are read so
//! they cannot show up in `Debug`/`Display` output or log lines.
//!
//! ## Usage
//!
//! ```ignore
//! use topicguard_runtime::providers::{ApiCredential, ClientArgs};
//!
//! // Load from config with env fallback
//! let cred =
//!     ApiCredential::from_config_or_env(&config, "api_key", "OPENAI_API_KEY", "OpenAI key")?;
//!
//! // Per-call overrides
//! let args = ClientArgs::new().with_api_key("sk-...").with_api_base("https://proxy.internal/v1");
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from configuration file/JSON
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// - `Debug` and `Display` show `[REDACTED]`
/// - the value is zeroed on drop via `secrecy`
/// - reading it requires an explicit [`ApiCredential::expose`]
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Create a new credential from a string value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load credential from an environment variable.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Load credential from JSON config, falling back to environment variable.
    ///
    /// 1. `config_key` in the JSON config
    /// 2. `env_var` in the environment
    /// 3. error if neither is set
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config[config_key].as_str() {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        if let Ok(value) = std::env::var(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(ProviderError::NotConfigured(format!(
            "{} required: set '{}' in config or {} environment variable",
            name, config_key, env_var
        )))
    }

    /// Like [`ApiCredential::from_config_or_env`], but absence is not an error.
    pub fn optional_from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Option<Self> {
        Self::from_config_or_env(config, config_key, env_var, name).ok()
    }

    /// Expose the credential value for use in API calls.
    ///
    /// Call this only where the value is needed (e.g. setting an HTTP
    /// header) and never store the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Check if the credential is empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    /// Get the source of this credential.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Get the human-readable name of this credential.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Clone for ApiCredential {
    fn clone(&self) -> Self {
        Self::new(self.expose(), self.source, self.name)
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

/// Explicit client arguments for a hosted model call.
///
/// Set once on the guard as defaults, or per call; per-call values win.
#[derive(Debug, Clone, Default)]
pub struct ClientArgs {
    pub api_key: Option<ApiCredential>,
    pub api_base: Option<String>,
}

impl ClientArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "API key",
        ));
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Fill anything unset here from `defaults`. An empty key counts as unset.
    pub fn or(&self, defaults: &ClientArgs) -> ClientArgs {
        ClientArgs {
            api_key: self
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .or_else(|| defaults.api_key.clone()),
            api_base: self.api_base.clone().or_else(|| defaults.api_base.clone()),
        }
    }
}
