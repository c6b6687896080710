//! Query service: the HTTP front door for document management and the
//! safety-gated chat agent (§6).
//!
//! Usage:
//!   query-service [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Path to configuration file (default: config.toml)
//!   --host <HOST>     Bind host (default: 0.0.0.0)
//!   --port <PORT>     Bind port (default: 8080)

use rag_backend::agent::graph::{AgentGraph, GraphContext};
use rag_backend::api::{create_router, AppState};
use rag_backend::config::AppConfig;
use rag_backend::object_store::ObjectStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct Args {
    config_path: PathBuf,
    host: String,
    port: u16,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.toml"),
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                if let Some(path) = iter.next() {
                    args.config_path = PathBuf::from(path);
                }
            }
            "--host" => {
                if let Some(host) = iter.next() {
                    args.host = host;
                }
            }
            "--port" => {
                if let Some(port) = iter.next() {
                    if let Ok(p) = port.parse() {
                        args.port = p;
                    }
                }
            }
            "--help" | "-h" => {
                println!("query-service [--config <PATH>] [--host <HOST>] [--port <PORT>]");
                std::process::exit(0);
            }
            _ => {}
        }
    }

    args
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,rag_backend=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let args = parse_args();
    let config = if args.config_path.exists() {
        info!(config_path = ?args.config_path, "loading configuration");
        AppConfig::from_file(&args.config_path)?
    } else {
        info!("config file not found, using defaults");
        AppConfig::default()
    };
    config.validate()?;

    // `ON DELETE CASCADE` is only enforced per-connection in SQLite when
    // foreign_keys is turned on explicitly.
    let connect_options = SqliteConnectOptions::from_str(&config.database.url)?
        .foreign_keys(true)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    let document_store = Arc::new(rag_backend::documents::store::DocumentStore::new(pool.clone()));
    document_store.init_schema().await?;

    let chat_store = Arc::new(rag_backend::chat::store::ChatStore::new(pool.clone()));
    chat_store.init_schema().await?;

    let vector_store: Arc<dyn rag_backend::documents::vector_store::VectorStore> =
        Arc::new(rag_backend::documents::vector_store::SqliteVectorStore::new(
            pool,
            config.ingestion.embedding_dimension,
        ));

    let object_store: Arc<dyn ObjectStore> = Arc::new(
        rag_backend::object_store::S3ObjectStore::connect(&config.object_store).await?,
    );
    if !object_store.bucket_exists().await? {
        object_store.make_bucket().await?;
    }

    let llm: Arc<dyn rag_backend::llm::LlmClient> = if config.llm.cache.enabled {
        Arc::new(rag_backend::llm::OllamaClient::new_with_cache(config.llm.clone()).await?)
    } else {
        Arc::new(rag_backend::llm::OllamaClient::new(config.llm.clone()))
    };

    let indexer = Arc::new(rag_backend::documents::indexer::VectorIndexer::new(
        vector_store.clone(),
        &config.ingestion,
    ));
    let pipeline = Arc::new(rag_backend::documents::pipeline::DocumentPipeline::new(
        object_store.clone(),
        document_store.clone(),
        indexer,
        llm.clone(),
        config.ingestion.clone(),
    ));

    let graph_ctx = Arc::new(GraphContext::new(
        chat_store,
        vector_store,
        llm,
        &config.safety,
        config.chat.clone(),
        config.ingestion.clone(),
    ));
    let agent_graph = Arc::new(AgentGraph::new(graph_ctx));

    let state = AppState {
        object_store,
        document_store,
        pipeline,
        agent_graph,
        object_folder: config.object_store.folder.clone(),
    };

    let router = create_router(state);
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    info!(%addr, "query service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
