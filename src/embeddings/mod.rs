pub mod hashing;
pub mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAIEmbedder;

use crate::cache::EmbeddingCache;
use crate::config::EmbeddingsConfig;
use crate::error::{AccordError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Text → fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier stored with each collection (provider and model)
    fn id(&self) -> String;

    /// Length of every returned vector
    fn dimensions(&self) -> usize;

    /// Embed documents in one pass, same order as the input
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Build the embedder selected by `[embeddings].provider`
pub fn from_config(config: &EmbeddingsConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                AccordError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                    config.api_key_env
                ))
            })?;

            // LRU cache for repeated queries; disabled at capacity 0
            let cache = if config.cache_capacity > 0 {
                Some(Arc::new(EmbeddingCache::new(config.cache_capacity)))
            } else {
                None
            };

            let embedder = OpenAIEmbedder::new_with_cache(
                api_key,
                config.model.clone(),
                config.base_url.clone(),
                config.dimensions,
                cache,
            )?;
            Ok(Arc::new(embedder))
        }
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        other => Err(AccordError::Config(format!("Unknown embeddings provider: {}", other))),
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_from_config_hashing() {
        let config = EmbeddingsConfig {
            provider: "hashing".to_string(),
            model: "unused".to_string(),
            api_key_env: "UNUSED".to_string(),
            base_url: "http://localhost".to_string(),
            dimensions: 64,
            cache_capacity: 0,
        };
        let embedder = from_config(&config).unwrap();
        assert_eq!(embedder.dimensions(), 64);
        assert_eq!(embedder.id(), "hashing:64");
    }

    #[test]
    fn test_from_config_unknown_provider() {
        let config = EmbeddingsConfig {
            provider: "word2vec".to_string(),
            model: "m".to_string(),
            api_key_env: "UNUSED".to_string(),
            base_url: "http://localhost".to_string(),
            dimensions: 64,
            cache_capacity: 0,
        };
        assert!(matches!(from_config(&config), Err(AccordError::Config(_))));
    }
}
