use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vectorbridge::{open_store, start_server, StoreConfig};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "vectorbridge - one CRUD and nearest-neighbour API over Chroma, Qdrant, Milvus, Weaviate, Pinecone and pgvector",
    long_about = None
)]
struct Args {
    /// JSON store configuration, tagged with "backend"
    #[arg(short, long)]
    config: PathBuf,

    #[arg(short, long, default_value_t = 3001)]
    port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("Starting vectorbridge gateway...");
    info!("Host: {}", args.host);
    info!("Port: {}", args.port);

    let config = StoreConfig::from_file(&args.config)?;
    info!("Loaded {} configuration from {}", config.backend(), args.config.display());

    // Connecting blocks on the network, keep it off the async workers.
    let store = tokio::task::spawn_blocking(move || open_store(config)).await??;

    start_server(store, &args.host, args.port).await?;

    Ok(())
}
