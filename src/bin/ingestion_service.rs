//! Ingestion service daemon: consumes object-store upload events and drives
//! each `.pdf` through the ingestion pipeline (§4.4, §4.5).
//!
//! Usage:
//!   ingestion-service [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Path to configuration file (default: config.toml)

use rag_backend::config::AppConfig;
use rag_backend::object_store::ObjectStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_config_path() -> PathBuf {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return PathBuf::from(path);
            }
        } else if arg == "--help" || arg == "-h" {
            println!("ingestion-service --config <PATH>");
            std::process::exit(0);
        }
    }
    PathBuf::from("config.toml")
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

    let config_path = parse_config_path();
    let config = if config_path.exists() {
        info!(?config_path, "loading configuration");
        AppConfig::from_file(&config_path)?
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

    let vector_store = Arc::new(rag_backend::documents::vector_store::SqliteVectorStore::new(
        pool,
        config.ingestion.embedding_dimension,
    ));

    let object_store = Arc::new(
        rag_backend::object_store::S3ObjectStore::connect(&config.object_store).await?,
    );
    if !object_store.bucket_exists().await? {
        info!(bucket = %config.object_store.bucket, "bucket does not exist, creating it");
        object_store.make_bucket().await?;
    }

    let llm = Arc::new(rag_backend::llm::OllamaClient::new(config.llm.clone()));

    let indexer = Arc::new(rag_backend::documents::indexer::VectorIndexer::new(
        vector_store,
        &config.ingestion,
    ));

    let pipeline = Arc::new(rag_backend::documents::pipeline::DocumentPipeline::new(
        object_store,
        document_store,
        indexer,
        llm,
        config.ingestion.clone(),
    ));

    let broker = rag_backend::broker::Broker::connect(&config.broker).await?;
    let consumer = rag_backend::documents::consumer::EventConsumer::new(broker, config.broker, pipeline);

    info!("ingestion service ready, consuming document-upload events");
    if let Err(e) = consumer.run().await {
        error!(error = %e, "ingestion service exited with an error");
        return Err(e.into());
    }

    Ok(())
}
