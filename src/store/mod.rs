pub mod sqlite;

pub use sqlite::{index_path, SqliteCollection};

use crate::error::{AccordError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

/// A chunk ready to be written: content-hash id, text and source metadata
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

/// A search hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

/// Persistent, append-only vector collection
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    /// Insert chunks with their vectors; ids already present are left untouched.
    /// Returns how many chunks were newly written.
    async fn upsert(&self, documents: Vec<StoredChunk>, vectors: Vec<Vec<f32>>) -> Result<usize>;

    /// Number of stored chunks
    async fn count(&self) -> Result<usize>;

    /// The subset of `ids` already stored
    async fn existing_ids(&self, ids: Vec<String>) -> Result<HashSet<String>>;

    /// At most `k` chunks scoring at least `score_threshold`, best first
    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredChunk>>;
}

/// Encode a vector as a little-endian f32 BLOB
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a little-endian f32 BLOB
pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(AccordError::Embedding(format!(
            "Invalid embedding BLOB length: {}",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}
