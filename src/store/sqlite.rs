use super::{decode_embedding, encode_embedding, ScoredChunk, StoredChunk, VectorStore};
use crate::db::{migrate, Db};
use crate::embeddings::cosine_similarity;
use crate::error::{AccordError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// File holding the named collection inside a collection directory
pub fn index_path(dir: &Path, collection_name: &str) -> PathBuf {
    dir.join(format!("{}.sqlite3", collection_name))
}

/// Collection header row
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    pub embedding_function_id: String,
    pub dimensions: usize,
    pub created_at: String,
}

/// One collection persisted as `<dir>/<collection_name>.sqlite3`
pub struct SqliteCollection {
    db: Db,
    info: CollectionInfo,
}

impl SqliteCollection {
    /// Whether `dir` holds the named collection
    pub fn exists(dir: &Path, collection_name: &str) -> bool {
        index_path(dir, collection_name).is_file()
    }

    /// Create the collection directory and schema, or open it if it is
    /// already there. Fails when an existing collection holds vectors of a
    /// different dimension; a different embedding function id is only
    /// logged.
    pub async fn create(
        dir: &Path,
        collection_name: &str,
        name: &str,
        embedding_function_id: &str,
        dimensions: usize,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db = Db::new(index_path(dir, collection_name));

        let row = CollectionInfo {
            name: name.to_string(),
            embedding_function_id: embedding_function_id.to_string(),
            dimensions,
            created_at: Utc::now().to_rfc3339(),
        };
        let to_insert = row.clone();

        db.with_connection(move |conn| {
            migrate::run_migrations(conn)?;
            conn.execute(
                "INSERT OR IGNORE INTO collection (id, name, embedding_function_id, dimensions, created_at)
                 VALUES (1, ?1, ?2, ?3, ?4)",
                params![
                    to_insert.name,
                    to_insert.embedding_function_id,
                    to_insert.dimensions as i64,
                    to_insert.created_at,
                ],
            )?;
            Ok(())
        })
        .await?;

        let collection = Self::open(dir, collection_name).await?;
        if collection.info.dimensions != row.dimensions {
            return Err(AccordError::Config(format!(
                "Collection {} holds {}-dimension vectors, not {}",
                collection.info.name, collection.info.dimensions, row.dimensions
            )));
        }
        if collection.info.embedding_function_id != row.embedding_function_id {
            log::warn!(
                "Collection {} was built with {}, continuing with {}",
                collection.info.name,
                collection.info.embedding_function_id,
                row.embedding_function_id
            );
        }

        Ok(collection)
    }

    /// Open an existing collection
    pub async fn open(dir: &Path, collection_name: &str) -> Result<Self> {
        let fallback_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if !Self::exists(dir, collection_name) {
            return Err(AccordError::CollectionNotFound(fallback_name));
        }

        let db = Db::new(index_path(dir, collection_name));
        let info = db
            .with_connection(|conn| {
                migrate::run_migrations(conn)?;
                let info = conn
                    .query_row(
                        "SELECT name, embedding_function_id, dimensions, created_at FROM collection WHERE id = 1",
                        [],
                        |row| {
                            Ok(CollectionInfo {
                                name: row.get(0)?,
                                embedding_function_id: row.get(1)?,
                                dimensions: row.get::<_, i64>(2)? as usize,
                                created_at: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(info)
            })
            .await?
            .ok_or(AccordError::CollectionNotFound(fallback_name))?;

        Ok(Self { db, info })
    }

    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }
}

#[async_trait]
impl VectorStore for SqliteCollection {
    fn name(&self) -> &str {
        &self.info.name
    }

    async fn upsert(&self, documents: Vec<StoredChunk>, vectors: Vec<Vec<f32>>) -> Result<usize> {
        if documents.len() != vectors.len() {
            return Err(AccordError::InvalidInput(format!(
                "{} documents but {} vectors",
                documents.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.info.dimensions) {
            return Err(AccordError::Embedding(format!(
                "Collection {} expects {} dimensions, got {}",
                self.info.name,
                self.info.dimensions,
                bad.len()
            )));
        }
        if documents.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(documents.len());
        for (doc, vector) in documents.into_iter().zip(vectors) {
            let metadata_json = serde_json::to_string(&doc.metadata)
                .map_err(|e| AccordError::InvalidInput(format!("metadata not serializable: {}", e)))?;
            let source = doc.metadata.get("source").cloned();
            rows.push((doc.id, doc.text, metadata_json, source, encode_embedding(&vector)));
        }

        self.db
            .with_connection(move |conn| {
                // One transaction per batch: a failed batch leaves nothing behind
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO chunks (chunk_id, chunk_text, metadata_json, source, embedding)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for (id, text, metadata_json, source, blob) in &rows {
                        inserted += stmt.execute(params![id, text, metadata_json, source, blob])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await
    }

    async fn count(&self) -> Result<usize> {
        self.db
            .with_connection(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(n as usize)
            })
            .await
    }

    async fn existing_ids(&self, ids: Vec<String>) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare("SELECT 1 FROM chunks WHERE chunk_id = ?1")?;
                let mut found = HashSet::new();
                for id in ids {
                    if stmt.exists(params![id])? {
                        found.insert(id);
                    }
                }
                Ok(found)
            })
            .await
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.info.dimensions {
            return Err(AccordError::Embedding(format!(
                "Query has {} dimensions, collection {} expects {}",
                query_vector.len(),
                self.info.name,
                self.info.dimensions
            )));
        }

        let rows = self
            .db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT chunk_text, metadata_json, embedding FROM chunks ORDER BY seq",
                )?;
                let mut rows = stmt.query([])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ));
                }
                Ok(out)
            })
            .await?;

        let mut scored = Vec::new();
        for (text, metadata_json, blob) in rows {
            let embedding = decode_embedding(&blob)?;
            let score = cosine_similarity(query_vector, &embedding);
            if score < score_threshold {
                continue;
            }
            let metadata: BTreeMap<String, String> =
                serde_json::from_str(&metadata_json).unwrap_or_default();
            scored.push(ScoredChunk { text, metadata, score });
        }

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        log::debug!(
            "Collection {}: {} hit(s) at threshold {}",
            self.info.name,
            scored.len(),
            score_threshold
        );
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(id: &str, text: &str) -> StoredChunk {
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), format!("{}.txt", id));
        StoredChunk {
            id: id.to_string(),
            text: text.to_string(),
            metadata,
        }
    }

    async fn collection(temp_dir: &TempDir) -> SqliteCollection {
        SqliteCollection::create(&temp_dir.path().join("countries"), "rag-chroma", "countries", "test:2", 2)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("countries");
        assert!(!SqliteCollection::exists(&dir, "rag-chroma"));

        let created = collection(&temp_dir).await;
        assert!(SqliteCollection::exists(&dir, "rag-chroma"));
        assert!(dir.join("rag-chroma.sqlite3").is_file());
        assert_eq!(created.name(), "countries");

        let reopened = SqliteCollection::open(&dir, "rag-chroma").await.unwrap();
        assert_eq!(reopened.info(), created.info());
    }

    #[tokio::test]
    async fn test_open_missing_collection() {
        let temp_dir = TempDir::new().unwrap();
        let result = SqliteCollection::open(&temp_dir.path().join("absent"), "rag-chroma").await;
        assert!(matches!(result, Err(AccordError::CollectionNotFound(name)) if name == "absent"));
    }

    #[tokio::test]
    async fn test_create_rejects_other_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        collection(&temp_dir).await;

        let result = SqliteCollection::create(
            &temp_dir.path().join("countries"),
            "rag-chroma",
            "countries",
            "test:2",
            3,
        )
        .await;
        assert!(matches!(result, Err(AccordError::Config(_))));
    }

    #[tokio::test]
    async fn test_create_accepts_other_embedding_function_id() {
        let temp_dir = TempDir::new().unwrap();
        let first = collection(&temp_dir).await;

        let reopened = SqliteCollection::create(
            &temp_dir.path().join("countries"),
            "rag-chroma",
            "countries",
            "other:2",
            2,
        )
        .await
        .unwrap();
        assert_eq!(reopened.info(), first.info());
        assert_eq!(reopened.info().embedding_function_id, "test:2");
    }

    #[tokio::test]
    async fn test_upsert_ignores_known_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = collection(&temp_dir).await;

        let first = store
            .upsert(vec![chunk("a", "alpha"), chunk("b", "beta")], vec![vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();
        assert_eq!(first, 2);

        let second = store
            .upsert(vec![chunk("b", "beta"), chunk("c", "gamma")], vec![vec![0.0, 1.0], vec![1.0, 1.0]])
            .await
            .unwrap();
        assert_eq!(second, 1);
        assert_eq!(store.count().await.unwrap(), 3);

        let existing = store
            .existing_ids(vec!["a".to_string(), "z".to_string()])
            .await
            .unwrap();
        assert!(existing.contains("a"));
        assert!(!existing.contains("z"));
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let store = collection(&temp_dir).await;

        let result = store.upsert(vec![chunk("a", "alpha")], vec![vec![1.0, 0.0, 0.0]]).await;
        assert!(matches!(result, Err(AccordError::Embedding(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_similarity_search_threshold_and_k() {
        let temp_dir = TempDir::new().unwrap();
        let store = collection(&temp_dir).await;
        store
            .upsert(
                vec![chunk("a", "same"), chunk("b", "close"), chunk("c", "orthogonal")],
                vec![vec![1.0, 0.0], vec![0.8, 0.6], vec![0.0, 1.0]],
            )
            .await
            .unwrap();

        let hits = store.similarity_search(&[1.0, 0.0], 5, 0.4).await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["same", "close"]);
        assert!(hits.iter().all(|h| h.score >= 0.4));
        assert_eq!(hits[0].metadata.get("source").map(String::as_str), Some("a.txt"));

        let top_one = store.similarity_search(&[1.0, 0.0], 1, 0.0).await.unwrap();
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].text, "same");

        let none = store.similarity_search(&[1.0, 0.0], 0, 0.0).await.unwrap();
        assert!(none.is_empty());
    }
}
