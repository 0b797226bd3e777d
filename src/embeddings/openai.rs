use crate::cache::EmbeddingCache;
use crate::error::{Result, AccordError};
use super::Embedder;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Largest input list accepted by one embeddings request
const MAX_INPUTS_PER_REQUEST: usize = 2048;

/// Retries for query embeddings (ingestion never retries)
const QUERY_MAX_RETRIES: usize = 3;

/// Request structure for OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    dimensions: usize,
}

/// Response structure from OpenAI embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI (or compatible) embeddings client
///
/// Document batches go out as-is and fail fast. Query embeddings go through
/// an optional LRU cache and retry on 429/5xx with exponential backoff.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new embedder without a query cache
    pub fn new(api_key: String, model: String, base_url: String, dimensions: usize) -> Result<Self> {
        Self::new_with_cache(api_key, model, base_url, dimensions, None)
    }

    /// Create a new embedder with an optional query-embedding cache
    pub fn new_with_cache(
        api_key: String,
        model: String,
        base_url: String,
        dimensions: usize,
        cache: Option<Arc<EmbeddingCache>>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AccordError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimensions,
            cache,
        })
    }

    /// Make a single API request
    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AccordError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(AccordError::Embedding(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AccordError::Embedding(format!("Failed to parse response: {}", e)))?;

        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        if data.len() != expected {
            return Err(AccordError::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                data.len()
            )));
        }

        let embeddings: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(AccordError::Embedding(format!(
                "Unexpected embedding dimension: expected {}, got {}",
                self.dimensions,
                bad.len()
            )));
        }

        Ok(embeddings)
    }

    /// Embed one text, retrying rate-limit and server errors
    async fn embed_with_retry(&self, text: &str, max_retries: usize) -> Result<Vec<f32>> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.request(vec![text.to_string()]).await {
                Ok(mut embeddings) => return Ok(embeddings.remove(0)),
                Err(e) if attempt < max_retries && is_retryable(&e) => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, max_retries, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(err: &AccordError) -> bool {
    let msg = err.to_string();
    ["429", "500", "502", "503", "504"].iter().any(|code| msg.contains(code))
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn id(&self) -> String {
        format!("openai:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for part in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            all_embeddings.extend(self.request(part.to_vec()).await?);
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                let (hits, misses) = cache.stats();
                log::debug!("Cache hit for query: {} ({} hits, {} misses)", text, hits, misses);
                return Ok(cached);
            }
        }

        let embedding = self.embed_with_retry(text, QUERY_MAX_RETRIES).await?;

        if let Some(cache) = &self.cache {
            cache.put(text.to_string(), embedding.clone());
        }

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> OpenAIEmbedder {
        OpenAIEmbedder::new(
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            "https://api.openai.com/v1/".to_string(),
            1536,
        )
        .unwrap()
    }

    #[test]
    fn test_embedder_new() {
        let embedder = embedder();
        assert_eq!(embedder.id(), "openai:text-embedding-3-small");
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(embedder.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&AccordError::Embedding("OpenAI API error 429 Too Many Requests: slow down".into())));
        assert!(is_retryable(&AccordError::Embedding("OpenAI API error 503 Service Unavailable: x".into())));
        assert!(!is_retryable(&AccordError::Embedding("OpenAI API error 401 Unauthorized: bad key".into())));
    }

    #[tokio::test]
    async fn test_embed_batch_empty_makes_no_request() {
        let embeddings = embedder().embed_batch(Vec::new()).await.unwrap();
        assert!(embeddings.is_empty());
    }

    #[tokio::test]
    async fn test_query_served_from_cache() {
        let cache = Arc::new(EmbeddingCache::new(4));
        cache.put("population of bangladesh".to_string(), vec![0.5; 8]);
        let embedder = OpenAIEmbedder::new_with_cache(
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            "http://127.0.0.1:9".to_string(),
            8,
            Some(cache),
        )
        .unwrap();

        let embedding = embedder.embed_query("population of bangladesh").await.unwrap();
        assert_eq!(embedding, vec![0.5; 8]);
    }
}
