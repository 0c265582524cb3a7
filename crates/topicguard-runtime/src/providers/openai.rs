//! OpenAI chat-completions provider.
//!
//! Credentials and the endpoint base can be fixed at construction or
//! supplied per call through [`ClientArgs`]. Per-call values win.

use super::{
    check_base_url,
    secrets::{ApiCredential, ClientArgs, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default API base.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions provider.
pub struct OpenAiProvider {
    credential: Option<ApiCredential>,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiProvider {
    /// Create a provider with no default credential.
    ///
    /// Every call must then carry an API key in its [`ClientArgs`].
    pub fn new() -> Self {
        Self {
            credential: None,
            base_url: OPENAI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider with a default API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            credential: Some(ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "OpenAI API key",
            )),
            ..Self::new()
        }
    }

    /// Create from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(OPENAI_API_KEY_ENV, "OpenAI API key")?;
        Ok(Self {
            credential: Some(credential),
            ..Self::new()
        })
    }

    /// Create from JSON configuration.
    ///
    /// `api_key` falls back to `OPENAI_API_KEY`; when neither is set the
    /// provider is built without a default key. `base_url` defaults to
    /// [`OPENAI_BASE_URL`] and must be an http(s) URL when set.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let base_url = match &config["base_url"] {
            JsonValue::Null => OPENAI_BASE_URL,
            JsonValue::String(url) => {
                check_base_url(url)?;
                url.as_str()
            }
            other => {
                return Err(ProviderError::NotConfigured(format!(
                    "base_url must be a string, got {}",
                    other
                )))
            }
        };

        let credential = ApiCredential::optional_from_config_or_env(
            config,
            "api_key",
            OPENAI_API_KEY_ENV,
            "OpenAI API key",
        );

        Ok(Self {
            credential,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn credential_for<'a>(
        &'a self,
        client_args: &'a ClientArgs,
    ) -> Result<&'a ApiCredential, ProviderError> {
        let usable = |c: &&ApiCredential| !c.is_empty();
        client_args
            .api_key
            .as_ref()
            .filter(usable)
            .or_else(|| self.credential.as_ref().filter(usable))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "OpenAI API key required: pass one per call or set {}",
                    OPENAI_API_KEY_ENV
                ))
            })
    }

    fn endpoint_for(&self, client_args: &ClientArgs) -> String {
        let base = client_args
            .api_base
            .as_deref()
            .map(|b| b.trim_end_matches('/'))
            .unwrap_or(&self.base_url);
        format!("{}/chat/completions", base)
    }
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
        client_args: &ClientArgs,
    ) -> Result<CompletionResponse, ProviderError> {
        let credential = self.credential_for(client_args)?;
        let endpoint = self.endpoint_for(client_args);

        let request = OpenAiRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            response_format: config.json_response.then_some(ResponseFormat {
                type_: "json_object",
            }),
        };

        tracing::debug!(model = %config.model, endpoint = %endpoint, "Sending chat completion");

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(credential.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAiError>(&raw)
                .map(|body| body.error.message)
                .unwrap_or(raw);

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: body.model,
            finish_reason: choice.finish_reason,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
