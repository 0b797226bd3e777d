use accord::app::build_toolbox;
use accord::embeddings;
use accord::Config;
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Invoke one tool by name and print its answer")]
struct Args {
    /// Tool name (collection name with spaces and hyphens as underscores, or query_sqldb)
    tool: String,

    /// Query text
    query: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "warn")
    ).init();

    let args = Args::parse();

    let config = Config::load()?;
    let embedder = embeddings::from_config(&config.embeddings)?;
    let toolbox = build_toolbox(&config, embedder).await?;

    let Some(tool) = toolbox.get(&args.tool) else {
        let names: Vec<String> = toolbox.definitions().into_iter().map(|t| t.name).collect();
        anyhow::bail!("Unknown tool {}. Available: {}", args.tool, names.join(", "));
    };

    let answer = tool.invoke(args.query).await?;
    println!("{}", answer);
    Ok(())
}
