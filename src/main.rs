use accord::app::build_toolbox;
use accord::embeddings;
use accord::mcp::McpServer;
use accord::Config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "accord")]
#[command(about = "Serve per-collection retrieval tools and the SQL tool over MCP", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// MCP server over stdio (default)
    Serve,
    /// Print the tool definitions the server would expose
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;

    // Logs go to stderr; stdout carries the MCP protocol
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", &config.log_level)
    ).init();

    log::info!("Configuration loaded successfully");
    log::info!("Data root: {}", config.data_root().display());
    log::info!("Vector store root: {}", config.vectordb_dir().display());

    let embedder = embeddings::from_config(&config.embeddings)?;
    let toolbox = build_toolbox(&config, embedder).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let server = McpServer::new(Arc::new(toolbox));
            server.run().await?;
        }
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&toolbox.definitions())?);
        }
    }

    Ok(())
}
