//! HTTP client for the sentence-embedding sidecar service.
//!
//! The service wraps a sentence-transformer model behind a small JSON API;
//! this client is the only encoder the production wiring uses. The search
//! engine depends on exactly two of its guarantees: identical input yields
//! identical vectors, and every vector has the configured dimension.

pub mod error;

pub use error::{EncoderError, EncoderResult};

use async_trait::async_trait;
use consensus_core::{ConsensusError, TextEncoder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the embedding service
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub base_url: String,
    pub dimension: usize,
    pub timeout: Duration,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("EMBEDDING_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            // all-MiniLM-L6-v2 output width
            dimension: std::env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(384),
            timeout: Duration::from_secs(
                std::env::var("EMBEDDING_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbedRequest {
    texts: Vec<String>,
    normalize: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Clone)]
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    dimension: usize,
}

impl EmbeddingClient {
    pub fn new(config: EncoderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url,
            dimension: config.dimension,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    /// Embed a batch of texts, unit-normalized by the service
    async fn embed(&self, texts: Vec<String>) -> EncoderResult<Vec<Vec<f32>>> {
        let expected = texts.len();
        let request = EmbedRequest {
            texts,
            normalize: true,
        };

        let response = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EncoderError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let result = response.json::<EmbedResponse>().await?;

        if result.embeddings.len() != expected {
            return Err(EncoderError::InvalidResponse(format!(
                "requested {} embeddings, got {}",
                expected,
                result.embeddings.len()
            )));
        }
        for vector in &result.embeddings {
            if vector.len() != self.dimension {
                return Err(EncoderError::InvalidResponse(format!(
                    "expected dimension {}, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }

        Ok(result.embeddings)
    }

    /// Check service health
    pub async fn health(&self) -> EncoderResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl TextEncoder for EmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, text: &str) -> Result<Vec<f32>, ConsensusError> {
        let mut embeddings = self
            .embed(vec![text.to_string()])
            .await
            .map_err(|e| ConsensusError::Encoding(e.to_string()))?;

        embeddings
            .pop()
            .ok_or_else(|| ConsensusError::Encoding("empty embedding response".to_string()))
    }

    async fn encode_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ConsensusError> {
        self.embed(texts.to_vec())
            .await
            .map_err(|e| ConsensusError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_are_sane() {
        let config = EncoderConfig {
            base_url: "http://localhost:8001".to_string(),
            dimension: 384,
            timeout: Duration::from_secs(10),
        };
        let client = EmbeddingClient::new(config);
        assert_eq!(client.dimension(), 384);
    }
}
