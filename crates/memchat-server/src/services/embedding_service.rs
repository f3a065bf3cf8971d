use crate::config::EmbeddingConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::envelope::unwrap_envelope;

/// Embedding seam consumed by the memory pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    text: &'a str,
}

/// HTTP client for an embedding model served behind `{base_url}/run/{model}`.
#[derive(Clone)]
pub struct EmbeddingService {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl EmbeddingService {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build embedding HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    async fn embed_internal(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for {} chars", text.len());

        let url = format!("{}/run/{}", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest { text })
            .send()
            .await
            .context("Failed to connect to embedding server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error ({}): {}", status, body);
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse embedding response as JSON")?;
        let body = unwrap_envelope(body)?;

        let embedding = parse_embedding(&body)
            .with_context(|| format!("Unrecognized embedding response format: {}", body))?;

        if embedding.is_empty() {
            anyhow::bail!("Generated embedding is empty");
        }

        if self.dimension > 0 && embedding.len() != self.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        Ok(embedding)
    }
}

#[async_trait::async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_internal(text).await
    }
}

/// Accepts the shapes common embedding servers answer with:
/// `{"data": [[..]]}`, `{"data": [{"embedding": [..]}]}`, `{"embedding": [..]}`,
/// `[{"embedding": [..]}]` and a bare `[..]`.
fn parse_embedding(body: &Value) -> Option<Vec<f32>> {
    let candidate = match body {
        Value::Object(map) => match (map.get("data"), map.get("embedding")) {
            (Some(Value::Array(data)), _) => first_vector(data.first()?)?,
            (_, Some(embedding)) => embedding,
            _ => return None,
        },
        Value::Array(items) => match items.first()? {
            Value::Number(_) => body,
            first => first_vector(first)?,
        },
        _ => return None,
    };

    candidate
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

fn first_vector(item: &Value) -> Option<&Value> {
    match item {
        Value::Array(_) => Some(item),
        Value::Object(map) => map.get("embedding"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            base_url,
            model: "bge".to_string(),
            dimension,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_parse_known_shapes() {
        let expected = Some(vec![0.5, 1.0]);
        assert_eq!(parse_embedding(&json!({"data": [[0.5, 1.0]]})), expected);
        assert_eq!(parse_embedding(&json!({"data": [{"embedding": [0.5, 1.0]}]})), expected);
        assert_eq!(parse_embedding(&json!({"embedding": [0.5, 1.0]})), expected);
        assert_eq!(parse_embedding(&json!([{"embedding": [0.5, 1.0]}])), expected);
        assert_eq!(parse_embedding(&json!([0.5, 1.0])), expected);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(parse_embedding(&json!({"data": [["a", 1.0]]})), None);
        assert_eq!(parse_embedding(&json!({"shape": [2]})), None);
        assert_eq!(parse_embedding(&json!("vector")), None);
    }

    #[tokio::test]
    async fn test_embed_against_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run/bge"))
            .and(body_json(json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": {"shape": [1, 3], "data": [[0.1, 0.2, 0.3]]}
            })))
            .mount(&server)
            .await;

        let service = EmbeddingService::new(&config(server.uri(), 3)).unwrap();
        let vector = service.embed("hello").await.unwrap();
        assert_eq!(vector.len(), 3);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [[0.1, 0.2]]})))
            .mount(&server)
            .await;

        let service = EmbeddingService::new(&config(server.uri(), 384)).unwrap();
        assert!(service.embed("hello").await.is_err());
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = EmbeddingService::new(&config(server.uri(), 0)).unwrap();
        assert!(service.embed("hello").await.is_err());
    }
}
