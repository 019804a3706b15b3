//! Embedding providers for semantic search
//!
//! The router consumes embeddings through the [`EmbeddingProvider`] trait.
//! Two providers ship in-tree: an OpenAI-compatible API client and a
//! deterministic hashed-token fallback for keyless development.

use crate::error::{Result, RouterError};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Produces fixed-dimension vectors for batches of texts.
///
/// Errors are retried zero times by the router; callers wanting retry
/// wrap the provider themselves.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed each text; all returned vectors have identical dimension.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI-compatible embeddings API client
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiEmbeddings {
    /// Create a client for the given model, reading the key from the caller
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(model, api_key, "https://api.openai.com/v1")
    }

    /// Create a client against a custom OpenAI-compatible endpoint
    pub fn with_base_url(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RouterError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({
                "input": texts,
                "model": self.model,
                "encoding_format": "float"
            }))
            .send()
            .await
            .map_err(|e| RouterError::embedding(format!("embeddings request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RouterError::embedding(format!(
                "embeddings API error: {}",
                error_text
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RouterError::embedding(format!("invalid embeddings response: {}", e)))?;

        let data = body["data"]
            .as_array()
            .ok_or_else(|| RouterError::embedding("missing 'data' in embeddings response"))?;

        if data.len() != texts.len() {
            return Err(RouterError::embedding(format!(
                "embeddings response length mismatch: expected {}, got {}",
                texts.len(),
                data.len()
            )));
        }

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let embedding = item["embedding"]
                .as_array()
                .ok_or_else(|| RouterError::embedding("missing 'embedding' in response item"))?;
            let vector: Vec<f32> = embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            vectors.push(normalize(vector));
        }

        debug!(
            "Embedded {} text(s) with model {}",
            vectors.len(),
            self.model
        );
        Ok(vectors)
    }
}

/// Deterministic bag-of-tokens embedder for development and testing.
///
/// Hashes each whitespace token into a fixed number of buckets and
/// normalizes the counts, so texts sharing vocabulary score high on
/// cosine similarity. Not a substitute for a real embedding model.
#[derive(Debug, Clone)]
pub struct HashedEmbeddings {
    dimensions: usize,
}

impl HashedEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashedEmbeddings {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let vectors = texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimensions];
                for token in text.to_lowercase().split_whitespace() {
                    let token = token.trim_matches(|c: char| !c.is_alphanumeric());
                    if token.is_empty() {
                        continue;
                    }
                    let mut hasher = DefaultHasher::new();
                    token.hash(&mut hasher);
                    let bucket = (hasher.finish() % self.dimensions as u64) as usize;
                    vector[bucket] += 1.0;
                }
                normalize(vector)
            })
            .collect();

        Ok(vectors)
    }
}

/// Normalize a vector to unit length
fn normalize(mut embedding: Vec<f32>) -> Vec<f32> {
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut embedding {
            *val /= norm;
        }
    }
    embedding
}
