use crate::embeddings::Embedder;
use crate::error::Result;
use crate::store::{ScoredChunk, VectorStore};
use std::sync::Arc;

/// Separator between passages in a tool answer
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// Similarity search over one collection with fixed `k` and score threshold
#[derive(Clone)]
pub struct Retriever {
    name: String,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    k: usize,
    score_threshold: f32,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        k: usize,
        score_threshold: f32,
    ) -> Self {
        Self {
            name: store.name().to_string(),
            store,
            embedder,
            k,
            score_threshold,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    /// Up to `k` passages scoring at least the threshold, best first.
    /// Fewer are returned when fewer pass; the result is never padded.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let query_vec = self.embedder.embed_query(query).await?;
        let hits = self
            .store
            .similarity_search(&query_vec, self.k, self.score_threshold)
            .await?;
        log::debug!("Retriever {}: {} passage(s) for {:?}", self.name, hits.len(), query);
        Ok(hits)
    }

    /// Passage texts joined by a blank line; empty when nothing passes
    pub async fn answer(&self, query: &str) -> Result<String> {
        let hits = self.retrieve(query).await?;
        Ok(hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR))
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("name", &self.name)
            .field("k", &self.k)
            .field("score_threshold", &self.score_threshold)
            .finish_non_exhaustive()
    }
}
