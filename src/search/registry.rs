use super::retriever::Retriever;
use crate::embeddings::Embedder;
use crate::error::{AccordError, Result};
use crate::ingest::walker::read_manifest;
use crate::mcp::tools::{AgentTool, ToolBox};
use crate::store::SqliteCollection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where collection manifests live: `<data_root>/<collection>/<info_doc_name>`
#[derive(Debug, Clone)]
pub struct ManifestLookup {
    pub data_root: PathBuf,
    pub info_doc_name: String,
}

impl ManifestLookup {
    pub fn new(data_root: impl Into<PathBuf>, info_doc_name: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            info_doc_name: info_doc_name.into(),
        }
    }

    /// Trimmed manifest text, `None` when missing or blank
    pub fn manifest(&self, collection: &str) -> Option<String> {
        read_manifest(&self.data_root.join(collection), &self.info_doc_name)
    }
}

/// Open a retriever over every collection under `vectordb_root`.
///
/// Keys are collection directory basenames. Subdirectories without the
/// named collection, with an unreadable index, or built for a different
/// vector size than `embedder` are skipped with a log line.
pub async fn discover(
    vectordb_root: &Path,
    collection_name: &str,
    embedder: Arc<dyn Embedder>,
    k: usize,
    score_threshold: f32,
) -> Result<BTreeMap<String, Retriever>> {
    let mut retrievers = BTreeMap::new();

    if !vectordb_root.is_dir() {
        log::warn!("Vector store root {} does not exist", vectordb_root.display());
        return Ok(retrievers);
    }

    let mut dirs: Vec<PathBuf> = std::fs::read_dir(vectordb_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let name = match dir.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => continue,
        };

        let store = match SqliteCollection::open(&dir, collection_name).await {
            Ok(store) => store,
            Err(AccordError::CollectionNotFound(_)) => {
                log::warn!("No collection {} in {}, skipping", collection_name, dir.display());
                continue;
            }
            Err(e) => {
                log::error!("Cannot open collection {}: {}, skipping", name, e);
                continue;
            }
        };

        if store.info().dimensions != embedder.dimensions() {
            log::error!(
                "Collection {} has {} dimensions but the embedder produces {}, skipping",
                name,
                store.info().dimensions,
                embedder.dimensions()
            );
            continue;
        }
        if store.info().embedding_function_id != embedder.id() {
            log::warn!(
                "Collection {} was built with {}, querying with {}",
                name,
                store.info().embedding_function_id,
                embedder.id()
            );
        }

        let retriever = Retriever::new(Arc::new(store), Arc::clone(&embedder), k, score_threshold);
        log::info!(
            "Opened retriever for collection {} (k={}, score_threshold={})",
            name,
            retriever.k(),
            retriever.score_threshold()
        );
        retrievers.insert(name, retriever);
    }

    Ok(retrievers)
}

/// Tool name for a collection: spaces and hyphens become underscores
pub fn tool_name(collection: &str) -> String {
    collection.replace([' ', '-'], "_")
}

/// One retrieval tool per collection that has a non-empty manifest.
///
/// The manifest text becomes the tool description. Collections without a
/// manifest get no tool. Two collections that map to the same tool name
/// keep the first (in name order).
pub fn build_tools(retrievers: &BTreeMap<String, Retriever>, manifests: &ManifestLookup) -> Vec<AgentTool> {
    let mut toolbox = ToolBox::new();

    for (name, retriever) in retrievers {
        let Some(description) = manifests.manifest(name) else {
            log::warn!("No {} for collection {}, no tool created", manifests.info_doc_name, name);
            continue;
        };

        let retriever = retriever.clone();
        let tool = AgentTool::new(tool_name(name), description, move |query: String| {
            let retriever = retriever.clone();
            async move { retriever.answer(&query).await }
        });

        match toolbox.push(tool) {
            Ok(()) => log::info!("Created tool {} for collection {}", tool_name(name), name),
            Err(e) => log::warn!("{} (collection {})", e, name),
        }
    }

    toolbox.into_tools()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_tool_name() {
        assert_eq!(tool_name("world countries"), "world_countries");
        assert_eq!(tool_name("rag-chroma docs"), "rag_chroma_docs");
        assert_eq!(tool_name("chinook"), "chinook");
    }

    #[test]
    fn test_manifest_lookup() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("countries")).unwrap();
        fs::create_dir_all(temp_dir.path().join("empty")).unwrap();
        fs::write(temp_dir.path().join("countries").join("info.md"), "  Country facts\n").unwrap();
        fs::write(temp_dir.path().join("empty").join("info.md"), "   \n").unwrap();

        let lookup = ManifestLookup::new(temp_dir.path(), "info.md");
        assert_eq!(lookup.manifest("countries").as_deref(), Some("Country facts"));
        assert_eq!(lookup.manifest("empty"), None);
        assert_eq!(lookup.manifest("absent"), None);
    }

    #[tokio::test]
    async fn test_discover_skips_foreign_directories() {
        let temp_dir = TempDir::new().unwrap();
        let vectordb = temp_dir.path().join("vectordb");
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));

        SqliteCollection::create(&vectordb.join("world-countries"), "rag-chroma", "world-countries", &embedder.id(), 32)
            .await
            .unwrap();
        SqliteCollection::create(&vectordb.join("wide"), "rag-chroma", "wide", "hashing:64", 64)
            .await
            .unwrap();
        fs::create_dir_all(vectordb.join("stray")).unwrap();

        let retrievers = discover(&vectordb, "rag-chroma", Arc::clone(&embedder), 3, 0.4)
            .await
            .unwrap();
        let names: Vec<&String> = retrievers.keys().collect();
        assert_eq!(names, vec!["world-countries"]);
        assert_eq!(retrievers["world-countries"].k(), 3);
    }

    #[tokio::test]
    async fn test_discover_skips_corrupt_index() {
        let temp_dir = TempDir::new().unwrap();
        let vectordb = temp_dir.path().join("vectordb");
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));

        SqliteCollection::create(&vectordb.join("countries"), "rag-chroma", "countries", &embedder.id(), 32)
            .await
            .unwrap();
        fs::create_dir_all(vectordb.join("broken")).unwrap();
        fs::write(
            crate::store::index_path(&vectordb.join("broken"), "rag-chroma"),
            "not a database ".repeat(300),
        )
        .unwrap();

        let retrievers = discover(&vectordb, "rag-chroma", embedder, 3, 0.4).await.unwrap();
        let names: Vec<&String> = retrievers.keys().collect();
        assert_eq!(names, vec!["countries"]);
    }

    #[tokio::test]
    async fn test_discover_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));
        let retrievers = discover(&temp_dir.path().join("absent"), "rag-chroma", embedder, 3, 0.4)
            .await
            .unwrap();
        assert!(retrievers.is_empty());
    }

    #[tokio::test]
    async fn test_build_tools_requires_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let vectordb = temp_dir.path().join("vectordb");
        let data = temp_dir.path().join("docs");
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));

        for name in ["world-countries", "no manifest"] {
            SqliteCollection::create(&vectordb.join(name), "rag-chroma", name, &embedder.id(), 32)
                .await
                .unwrap();
        }
        fs::create_dir_all(data.join("world-countries")).unwrap();
        fs::write(data.join("world-countries").join("info.md"), "Facts about \"countries\"").unwrap();

        let retrievers = discover(&vectordb, "rag-chroma", embedder, 3, 0.4).await.unwrap();
        assert_eq!(retrievers.len(), 2);

        let tools = build_tools(&retrievers, &ManifestLookup::new(&data, "info.md"));
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "world_countries");
        assert_eq!(tools[0].description(), "Facts about \"countries\"");
        assert_eq!(tools[0].invoke("anything").await.unwrap(), "");
    }
}
