use crate::config::Config;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::mcp::tools::ToolBox;
use crate::search::{build_tools, discover, ManifestLookup};
use crate::sql;
use std::sync::Arc;

/// Every tool the server exposes: one retriever per collection with a
/// manifest, then `query_sqldb` when the SQL database file exists.
pub async fn build_toolbox(config: &Config, embedder: Arc<dyn Embedder>) -> Result<ToolBox> {
    let data = &config.data_embedding;

    let retrievers = discover(
        config.vectordb_dir(),
        &data.collection_name,
        embedder,
        data.k,
        data.score_threshold,
    )
    .await?;

    let manifests = ManifestLookup::new(config.data_root(), data.info_doc_name.as_str());
    let mut toolbox = ToolBox::new();
    for tool in build_tools(&retrievers, &manifests) {
        toolbox.push(tool)?;
    }

    if config.sql_agent.db_path.is_file() {
        if let Err(e) = toolbox.push(sql::lazy_sql_tool(config.sql_agent.clone())) {
            log::warn!("SQL tool not registered: {}", e);
        }
    } else {
        log::warn!(
            "SQL database {} not found, {} disabled",
            config.sql_agent.db_path.display(),
            sql::SQL_TOOL_NAME
        );
    }

    log::info!("{} tool(s) ready", toolbox.len());
    Ok(toolbox)
}
