//! Wire types and transport for the Gemini `generateContent` endpoint.
//!
//! The `ModelBackend` trait is the seam between the rate-limited client and
//! the network, so tests can script replies without HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Request body for content generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<i64>,
    pub candidates_token_count: Option<i64>,
    pub total_token_count: Option<i64>,
}

impl GenerateResponse {
    /// Text of the first candidate. A candidate that stopped because the
    /// requested output exceeded the model's budget (`MAX_TOKENS`) is an
    /// error here, indistinguishable from any other failed attempt to the
    /// caller.
    pub fn first_text(&self) -> Result<&str, BackendError> {
        let candidate = self
            .candidates
            .first()
            .ok_or_else(|| BackendError::Parse("no candidates in response".into()))?;
        if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
            return Err(BackendError::Api("output budget exceeded (MAX_TOKENS)".into()));
        }
        candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| BackendError::Parse("no text in first candidate".into()))
    }
}

/// Transport seam for issuing one generation call against a named model.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, BackendError>;
}

/// Real backend over the Generative Language API with API-key auth.
pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to create HTTP client");
        Self { http, api_key }
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, BackendError> {
        let url = format!("{}/{}:generateContent", GEMINI_API_URL, model);
        tracing::debug!(model, "issuing generation request");

        let response = self
            .http
            .post(&url)
            .json(request)
            .query(&[("key", &self.api_key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            // The API wraps failures in {"error": {"message": ...}}.
            let message = serde_json::from_str::<Value>(&error_text)
                .ok()
                .and_then(|json| {
                    json.get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .map(|m| m.to_string())
                })
                .unwrap_or(error_text);
            tracing::error!(model, status = status.as_u16(), %message, "generation call failed");
            return Err(BackendError::Api(format!(
                "HTTP {}: {}",
                status.as_u16(),
                message
            )));
        }

        Ok(response.json().await?)
    }
}
