//! Client for the text completion service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CompletionError;
use crate::models::CompletionConfig;

/// Produces a completion for a fully rendered prompt.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Returns `None` when the service produced no content.
    async fn complete(&self, prompt: &str) -> Result<Option<String>, CompletionError>;

    /// Identifier of the completion model.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    base_url: String,
    model: String,
}

impl CompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CompletionError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionModel for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, CompletionError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout
                } else if e.is_connect() {
                    CompletionError::ConnectionError(e.to_string())
                } else {
                    CompletionError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::InvalidResponse(e.to_string())
            }
        })?;

        Ok(generated.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
