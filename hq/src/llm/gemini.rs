//! Gemini API client implementation
//!
//! Implements the GenerativeClient trait for the Generative Language REST API.
//! Retrying is left to the plan orchestrator; each call here is one request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{GenerateRequest, GenerativeClient, LlmError, Role};
use crate::config::AiConfig;

/// Whether `model` accepts `responseMimeType: application/json`
pub fn supports_structured_output(model: &str) -> bool {
    model.contains("1.5") || model.contains("2.")
}

/// Gemini API client
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl GeminiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &AiConfig) -> Result<Self, LlmError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = config
            .api_key()
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(&config.base_url, api_key, Duration::from_millis(config.timeout_ms))
    }

    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    /// Build the request body for generateContent
    fn build_request_body(&self, model: &str, request: &GenerateRequest) -> serde_json::Value {
        debug!(%model, turns = request.turns.len(), "build_request_body: called");
        let contents: Vec<serde_json::Value> = request
            .turns
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{ "text": turn.content }],
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": request.system_prompt }] },
            "contents": contents,
        });

        if request.structured_output && supports_structured_output(model) {
            debug!("build_request_body: requesting JSON output");
            body["generationConfig"] = serde_json::json!({ "responseMimeType": "application/json" });
        }

        body
    }

    fn send_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else {
            LlmError::Network(err)
        }
    }

    async fn error_from_response(response: reqwest::Response) -> LlmError {
        let status = response.status().as_u16();
        if status == 429 {
            return LlmError::RateLimited;
        }
        let message = response.text().await.unwrap_or_default();
        LlmError::ApiError { status, message }
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, if non-blank
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.trim().is_empty())
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        debug!("list_models: called");
        let url = format!("{}/v1beta/models", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("key", &self.api_key)])
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "list_models: API error");
            return Err(Self::error_from_response(response).await);
        }

        let list: ModelList = response.json().await?;
        debug!(count = list.models.len(), "list_models: success");
        Ok(list.models.into_iter().map(|m| m.name).collect())
    }

    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<String, LlmError> {
        debug!(%model, "generate: called");
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let body = self.build_request_body(model, request);

        let response = self
            .http
            .post(url)
            .query(&[("key", &self.api_key)])
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "generate: API error");
            return Err(Self::error_from_response(response).await);
        }

        let parsed: GenerateResponse = response.json().await?;
        parsed.first_text().ok_or_else(|| {
            debug!("generate: empty response");
            LlmError::InvalidResponse("Empty response".to_string())
        })
    }
}
