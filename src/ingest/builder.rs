use super::chunker::{split_units, Chunk};
use super::parsers::ParserRegistry;
use super::walker::load_directory;
use crate::embeddings::Embedder;
use crate::error::{AccordError, Result};
use crate::store::{SqliteCollection, StoredChunk, VectorStore};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of building one source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub collection: String,
    /// Chunks in the freshly recomputed sequence
    pub total_chunks: usize,
    /// Chunk count found in the collection before this run
    pub resumed_from: usize,
    /// Chunks embedded and written by this run
    pub upserted: usize,
    /// Whether this run created the collection
    pub created: bool,
}

/// Chunk sizing and batching for one build
#[derive(Debug, Clone, Copy)]
pub struct BuildParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
}

/// Maps source directories onto persistent collections under one root
pub struct VectorIndexBuilder {
    registry: Arc<ParserRegistry>,
    embedder: Arc<dyn Embedder>,
    manifest_name: String,
}

impl VectorIndexBuilder {
    pub fn new(registry: Arc<ParserRegistry>, embedder: Arc<dyn Embedder>, manifest_name: &str) -> Self {
        Self {
            registry,
            embedder,
            manifest_name: manifest_name.to_string(),
        }
    }

    /// Build (or resume) the collection for `dir` at `vectordb_root/<basename>`.
    ///
    /// A directory without its manifest is rejected with
    /// `ManifestMissing` before anything is written under `vectordb_root`.
    /// The chunk sequence is recomputed on every run. Chunks are identified
    /// by content hash, so only chunks missing from the collection are
    /// embedded; an unchanged directory costs no embedding calls. Any
    /// embedding or store failure aborts the directory with whatever
    /// batches were already committed left in place.
    pub async fn build(
        &self,
        dir: &Path,
        params: BuildParams,
        vectordb_root: &Path,
        collection_name: &str,
    ) -> Result<BuildReport> {
        if params.batch_size == 0 {
            return Err(AccordError::InvalidInput("batch_size must be greater than 0".to_string()));
        }

        let name = collection_dir_name(dir)?;

        let manifest = dir.join(&self.manifest_name);
        if !manifest.is_file() {
            return Err(AccordError::ManifestMissing(manifest));
        }

        let collection_path = vectordb_root.join(&name);
        let created = !SqliteCollection::exists(&collection_path, collection_name);

        let chunks = self.load_chunks(dir, params).await?;

        if created {
            log::info!("Creating collection {} at {}", name, collection_path.display());
        }
        let store = SqliteCollection::create(
            &collection_path,
            collection_name,
            &name,
            &self.embedder.id(),
            self.embedder.dimensions(),
        )
        .await?;

        let resumed_from = store.count().await?;
        if !created {
            log::info!(
                "Collection {} exists with {} chunk(s); {} in current sequence",
                name,
                resumed_from,
                chunks.len()
            );
        }

        let documents: Vec<StoredChunk> = chunks.iter().map(|c| stored_chunk(c, dir)).collect();
        let known = store
            .existing_ids(documents.iter().map(|d| d.id.clone()).collect())
            .await?;
        let pending: Vec<StoredChunk> = documents
            .into_iter()
            .filter(|d| !known.contains(&d.id))
            .collect();

        let mut upserted = 0;
        for (i, batch) in pending.chunks(params.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed_batch(texts).await?;
            let written = store.upsert(batch.to_vec(), vectors).await?;
            upserted += written;
            log::debug!("Collection {}: batch {} wrote {} chunk(s)", name, i + 1, written);
        }

        log::info!(
            "Collection {}: {} new chunk(s), {} total",
            name,
            upserted,
            resumed_from + upserted
        );

        Ok(BuildReport {
            collection: name,
            total_chunks: chunks.len(),
            resumed_from,
            upserted,
            created,
        })
    }

    /// Load and split a directory on a blocking thread (parsers and the
    /// DOC converter do synchronous I/O)
    async fn load_chunks(&self, dir: &Path, params: BuildParams) -> Result<Vec<Chunk>> {
        let registry = Arc::clone(&self.registry);
        let dir: PathBuf = dir.to_path_buf();
        let manifest_name = self.manifest_name.clone();

        tokio::task::spawn_blocking(move || {
            let units = load_directory(&dir, &manifest_name, &registry)?;
            split_units(&units, params.chunk_size, params.chunk_overlap)
        })
        .await
        .map_err(|e| {
            AccordError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("loader task failed: {}", e),
            ))
        })?
    }
}

/// Collection name for a source directory: its basename
pub fn collection_dir_name(dir: &Path) -> Result<String> {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AccordError::InvalidInput(format!("No directory name in {}", dir.display())))
}

/// Metadata keys holding file paths
const PATH_KEYS: [&str; 2] = ["source", "converted"];

/// Content-hash id of a chunk loaded from `dir`.
///
/// Paths in the metadata are hashed relative to `dir`, so the same files
/// reached through another spelling of the directory keep their ids.
pub fn chunk_id(chunk: &Chunk, dir: &Path) -> String {
    let mut identity = chunk.metadata.clone();
    for key in PATH_KEYS {
        if let Some(value) = identity.get_mut(key) {
            if let Ok(relative) = Path::new(value.as_str()).strip_prefix(dir) {
                *value = relative.to_string_lossy().to_string();
            }
        }
    }

    // BTreeMap serialises with sorted keys
    let metadata = serde_json::to_string(&identity).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(metadata.as_bytes());
    hasher.update([0u8]);
    hasher.update(chunk.start.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(chunk.text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn stored_chunk(chunk: &Chunk, dir: &Path) -> StoredChunk {
    StoredChunk {
        id: chunk_id(chunk, dir),
        text: chunk.text.clone(),
        metadata: chunk.metadata.clone(),
    }
}
