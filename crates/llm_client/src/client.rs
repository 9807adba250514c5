use crate::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationRequest, Part,
    TransportError,
};
use async_trait::async_trait;
use common::Error;
use reqwest::Client;
use std::time::Duration;
use tracing::instrument;

/// Sends one prompt to one model and returns its raw text.
#[async_trait]
pub trait GenerativeTransport: Send + Sync {
    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, TransportError>;
}

/// Google Generative Language API (`models/{id}:generateContent`).
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, timeout_secs: u64) -> Result<Self, Error> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("Missing GEMINI_API_KEY".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("failed to build generative client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model_id)
    }
}

#[async_trait]
impl GenerativeTransport for GeminiClient {
    #[instrument(skip(self, request), fields(model = %request.model_id))]
    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, TransportError> {
        let payload = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: &request.decoding,
        };

        let response = self
            .client
            .post(self.endpoint(&request.model_id))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::ApiError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| TransportError::ApiError(e.to_string()))?;
        let parsed: GenerateContentResponse = serde_json::from_str(&raw)?;
        let text = parsed.text().trim().to_string();
        if text.is_empty() {
            return Err(TransportError::EmptyResponse);
        }
        Ok(text)
    }
}
