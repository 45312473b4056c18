use super::Embedder;
use crate::cache::EmbeddingCache;
use crate::config::EmbeddingsConfig;
use crate::error::{CodescribeError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Largest batch an OpenAI-compatible endpoint accepts
const MAX_BATCH_SIZE: usize = 2048;

/// Request structure for the embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response structure from the embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint
///
/// Works against a hosted API or a local text-embeddings server serving a
/// sentence-transformer model. Question embeddings optionally go through an
/// LRU cache.
pub struct OpenAIEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    batch_size: usize,
    dimensions: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new embedder
    ///
    /// `base_url` is the API root (e.g. `http://localhost:8081/v1`);
    /// `batch_size` is capped at 2048.
    pub fn new(
        base_url: &str,
        model: String,
        api_key: Option<String>,
        batch_size: usize,
        dimensions: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| CodescribeError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            dimensions,
            cache: None,
        })
    }

    /// Attach a question cache
    pub fn with_cache(mut self, cache: Option<Arc<EmbeddingCache>>) -> Self {
        self.cache = cache;
        self
    }

    /// Build from the `[embeddings]` config section, reading the optional key
    /// from the configured environment variable.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        let cache = EmbeddingCache::new(config.cache_capacity).map(Arc::new);

        let embedder = Self::new(
            &config.base_url,
            config.model.clone(),
            api_key,
            config.batch_size,
            config.dimensions,
        )?
        .with_cache(cache);

        log::info!(
            "Embeddings: model {} at {} ({} dims)",
            config.model,
            embedder.endpoint,
            config.dimensions
        );
        Ok(embedder)
    }

    /// Make a single API request
    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CodescribeError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(CodescribeError::Embedding(format!(
                "Embeddings API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CodescribeError::Embedding(format!("Failed to parse response: {}", e)))?;

        if result.data.len() != texts.len() {
            return Err(CodescribeError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        let embeddings: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(CodescribeError::Embedding(format!(
                "Expected {}-dimensional embeddings, got {}",
                self.dimensions,
                bad.len()
            )));
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let start = std::time::Instant::now();
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            all_embeddings.extend(self.request(batch).await?);
        }

        log::debug!("Embedded {} texts in {:?}", texts.len(), start.elapsed());
        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Cache hit for query: {}", text);
                return Ok(cached);
            }
        }

        let embedding = self
            .request(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| CodescribeError::Embedding("Empty response from embeddings API".to_string()))?;

        if let Some(cache) = &self.cache {
            cache.put(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
