//! Zero-shot classification through the Hugging Face inference API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    ClassifierError, ZeroShotClassifier, ZeroShotOutput, DEFAULT_CLASSIFIER_MODEL,
    HYPOTHESIS_TEMPLATE,
};
use crate::providers::{ApiCredential, CredentialSource};

/// Environment variable for an optional inference API token.
pub const HF_API_TOKEN_ENV: &str = "HF_API_TOKEN";

/// Default inference endpoint.
pub const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

/// Multi-label zero-shot classifier backed by a hosted NLI model.
pub struct HuggingFaceClassifier {
    model: String,
    base_url: String,
    credential: Option<ApiCredential>,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for HuggingFaceClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceClassifier")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for HuggingFaceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HuggingFaceClassifier {
    /// Default model and endpoint; picks up `HF_API_TOKEN` when set.
    pub fn new() -> Self {
        Self {
            model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            base_url: HF_INFERENCE_URL.to_string(),
            credential: ApiCredential::from_env(HF_API_TOKEN_ENV, "Hugging Face API token").ok(),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(ApiCredential::new(
            token,
            CredentialSource::Programmatic,
            "Hugging Face API token",
        ));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
}

#[derive(Debug, Serialize)]
struct InferenceParameters<'a> {
    candidate_labels: &'a [String],
    multi_label: bool,
    hypothesis_template: &'a str,
}

/// The API answers either with the pipeline shape or a list of pairs,
/// depending on the serving backend.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Pipeline { labels: Vec<String>, scores: Vec<f64> },
    Pairs(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct InferenceError {
    error: String,
}

impl From<InferenceResponse> for ZeroShotOutput {
    fn from(response: InferenceResponse) -> Self {
        match response {
            InferenceResponse::Pipeline { labels, scores } => ZeroShotOutput::new(labels, scores),
            InferenceResponse::Pairs(pairs) => {
                let (labels, scores) = pairs.into_iter().map(|p| (p.label, p.score)).unzip();
                ZeroShotOutput::new(labels, scores)
            }
        }
    }
}

#[async_trait]
impl ZeroShotClassifier for HuggingFaceClassifier {
    async fn classify(
        &self,
        text: &str,
        candidate_labels: &[String],
    ) -> Result<ZeroShotOutput, ClassifierError> {
        let request = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters {
                candidate_labels,
                multi_label: true,
                hypothesis_template: HYPOTHESIS_TEMPLATE,
            },
        };

        let mut builder = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&request);
        if let Some(credential) = &self.credential {
            builder = builder.bearer_auth(credential.expose());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ClassifierError::Timeout(self.timeout)
            } else {
                ClassifierError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<InferenceError>(&raw)
                .map(|body| body.error)
                .unwrap_or(raw);
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;

        Ok(body.into())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let classifier = HuggingFaceClassifier::new();
        assert_eq!(classifier.model(), DEFAULT_CLASSIFIER_MODEL);
        assert_eq!(
            classifier.endpoint(),
            "https://api-inference.huggingface.co/models/facebook/bart-large-mnli"
        );
    }

    #[test]
    fn test_request_is_multi_label_with_template() {
        let labels = vec!["politics".to_string()];
        let request = InferenceRequest {
            inputs: "text",
            parameters: InferenceParameters {
                candidate_labels: &labels,
                multi_label: true,
                hypothesis_template: HYPOTHESIS_TEMPLATE,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["parameters"]["multi_label"], true);
        assert_eq!(
            value["parameters"]["hypothesis_template"],
            "This example has to do with topic {}."
        );
        assert_eq!(value["parameters"]["candidate_labels"][0], "politics");
    }

    #[test]
    fn test_parse_pipeline_shape() {
        let body =
            r#"{"sequence": "text", "labels": ["politics", "sports"], "scores": [0.8, 0.1]}"#;
        let output: ZeroShotOutput =
            serde_json::from_str::<InferenceResponse>(body).unwrap().into();
        assert_eq!(output.labels, vec!["politics", "sports"]);
        assert_eq!(output.scores, vec![0.8, 0.1]);
    }

    #[test]
    fn test_parse_pairs_shape() {
        let body = r#"[{"label": "sports", "score": 0.6}, {"label": "politics", "score": 0.3}]"#;
        let output: ZeroShotOutput =
            serde_json::from_str::<InferenceResponse>(body).unwrap().into();
        assert_eq!(output.labels, vec!["sports", "politics"]);
        assert_eq!(output.scores, vec![0.6, 0.3]);
    }

    #[test]
    fn test_debug_redacts_token() {
        let classifier = HuggingFaceClassifier::new().with_api_token("hf_secret");
        assert!(!format!("{:?}", classifier).contains("hf_secret"));
    }

    mod http {
        use super::*;
        use wiremock::matchers::{body_partial_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const MODEL_PATH: &str = "/models/facebook/bart-large-mnli";

        fn candidates() -> Vec<String> {
            vec!["politics".to_string(), "finance".to_string()]
        }

        async fn classify(server: &MockServer) -> Result<ZeroShotOutput, ClassifierError> {
            HuggingFaceClassifier::new()
                .with_api_token("hf_test")
                .with_base_url(server.uri())
                .classify("The senate passed the budget", &candidates())
                .await
        }

        async fn respond_with(template: ResponseTemplate) -> MockServer {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(MODEL_PATH))
                .respond_with(template)
                .mount(&server)
                .await;
            server
        }

        #[tokio::test]
        async fn test_classify_sends_candidates_and_token() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(MODEL_PATH))
                .and(header("authorization", "Bearer hf_test"))
                .and(body_partial_json(serde_json::json!({
                    "inputs": "The senate passed the budget",
                    "parameters": {
                        "candidate_labels": ["politics", "finance"],
                        "multi_label": true
                    }
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "sequence": "The senate passed the budget",
                    "labels": ["finance", "politics"],
                    "scores": [0.91, 0.88]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let output = classify(&server).await.unwrap();
            assert_eq!(output.labels, vec!["finance", "politics"]);
            assert_eq!(output.scores, vec![0.91, 0.88]);
        }

        #[tokio::test]
        async fn test_error_message_from_body() {
            let server = respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": "Model facebook/bart-large-mnli is currently loading",
                "estimated_time": 20.0
            })))
            .await;

            match classify(&server).await.unwrap_err() {
                ClassifierError::Api { status, message } => {
                    assert_eq!(status, 503);
                    assert!(message.contains("currently loading"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_error_keeps_raw_body() {
            let server =
                respond_with(ResponseTemplate::new(400).set_body_string("bad inputs")).await;

            let err = classify(&server).await.unwrap_err();
            assert!(matches!(
                &err,
                ClassifierError::Api { status: 400, message } if message == "bad inputs"
            ));
        }

        #[tokio::test]
        async fn test_unexpected_body_is_parse_error() {
            let server =
                respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "answer": "politics"
                })))
                .await;

            let err = classify(&server).await.unwrap_err();
            assert!(matches!(err, ClassifierError::Parse(_)));
        }
    }
}
