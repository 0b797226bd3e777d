use accord::embeddings;
use accord::ingest::{discover_source_dirs, BuildParams, ParserRegistry, VectorIndexBuilder};
use accord::{AccordError, Config};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Build or resume one vector collection per source directory")]
struct Args {
    /// Build only this source directory instead of every matching one
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.log_level)
    ).init();

    log::info!("Starting Accord ingestion");

    let data = &config.data_embedding;
    log::info!("Data root: {}", config.data_root().display());
    log::info!("Vector store root: {}", config.vectordb_dir().display());

    std::fs::create_dir_all(config.vectordb_dir()).with_context(|| {
        format!("Failed to create {}", config.vectordb_dir().display())
    })?;

    let dirs = match args.dir {
        Some(dir) => vec![dir],
        None => discover_source_dirs(config.data_root(), &data.data_dir_re)?,
    };

    if dirs.is_empty() {
        log::warn!("No source directories matched {} in {}", data.data_dir_re, config.data_root().display());
        return Ok(());
    }

    let embedder = embeddings::from_config(&config.embeddings)?;
    let registry = Arc::new(ParserRegistry::new(&config.loader.doc_converter));
    let builder = VectorIndexBuilder::new(registry, embedder, &data.info_doc_name);
    let params = BuildParams {
        chunk_size: data.chunk_size,
        chunk_overlap: data.chunk_overlap,
        batch_size: data.batch_size,
    };

    let start = Instant::now();
    let mut total_upserted = 0;
    let mut skipped = 0;
    let mut errors = 0;

    for (idx, dir) in dirs.iter().enumerate() {
        log::info!("[{}/{}] Building {}", idx + 1, dirs.len(), dir.display());

        match builder
            .build(dir, params, config.vectordb_dir(), &data.collection_name)
            .await
        {
            Ok(report) => {
                total_upserted += report.upserted;
                log::info!(
                    "  {} chunk(s), {} already indexed, {} added",
                    report.total_chunks,
                    report.resumed_from,
                    report.upserted
                );
            }
            Err(e @ AccordError::ManifestMissing(_)) => {
                skipped += 1;
                log::error!("  {}, skipping {}", e, dir.display());
            }
            Err(e) => {
                errors += 1;
                log::error!("  Failed to build {}: {}", dir.display(), e);
            }
        }
    }

    log::info!(
        "Ingestion complete in {:.1}s: {} director(ies), {} chunk(s) added, {} skipped, {} error(s)",
        start.elapsed().as_secs_f64(),
        dirs.len(),
        total_upserted,
        skipped,
        errors
    );

    if errors > 0 {
        anyhow::bail!("{} director(ies) failed; rerun ingest to resume", errors);
    }
    Ok(())
}
