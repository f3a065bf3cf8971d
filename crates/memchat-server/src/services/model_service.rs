use crate::config::LlmConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::envelope::unwrap_envelope;

/// Text-generation seam. The response is returned as loosely-typed JSON; callers
/// decide how to pull text out of it.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<Value>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    stream: bool,
    max_tokens: usize,
}

#[derive(Clone)]
pub struct ModelService {
    client: Client,
    base_url: String,
    model: String,
}

impl ModelService {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build model HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ModelClient for ModelService {
    /// Non-streaming completion capped at `max_tokens`.
    async fn complete(&self, prompt: &str, max_tokens: usize) -> Result<Value> {
        debug!("Requesting completion: prompt_len={}, max_tokens={}", prompt.len(), max_tokens);

        let request = CompletionRequest {
            prompt,
            stream: false,
            max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/run/{}", self.base_url, self.model))
            .json(&request)
            .send()
            .await
            .context("Failed to call model API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Model API error: {} - {}", status, body);
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse model response")?;

        unwrap_envelope(body)
    }
}
