//! Editer Server
//!
//! Serves documents addressed by human-readable share-ids.
//!
//! # Configuration
//!
//! Settings come from `~/.config/editer/config.yaml` (or `--config`),
//! overridden by environment variables:
//! - `EDITER_HOST`, `EDITER_PORT`: listen address (default: 0.0.0.0:8000)
//! - `EDITER_DATABASE_PATH`: SQLite file (default: ~/.local/share/editer/editer.db)
//! - `EDITER_HRID_SEED`: share-id seed (default: random per process)
//! - `EDITER_MAX_DOCUMENT_SIZE`: largest accepted document in bytes (default: 1 MiB)
//! - `EDITER_MAX_CONTENT_LENGTH`: largest stored document in bytes (default: 10 MiB)
//! - `EDITER_ALLOWED_ORIGINS`: comma separated CORS origins
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint
//! - `POST /documents`, `GET|PUT /documents/{share_id}`

use clap::Parser;
use editer::api::{self, AppState};
use editer::config::Config;
use editer::db::{init_db, SqliteDocumentStore};
use editer_core::{DocumentService, HridGenerator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "editer-server")]
#[command(version)]
#[command(about = "Shareable text document server")]
struct Cli {
    /// Path to config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(config, cli.port).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    // A broken generator is fatal: refuse to start rather than serve.
    let generator = match &config.hrid_seed {
        Some(seed) => HridGenerator::new(seed.clone())?,
        None => HridGenerator::from_entropy(),
    };

    let pool = init_db(&config.database_path, config.connect_timeout()).await?;
    let store = SqliteDocumentStore::new(
        pool.clone(),
        config.max_content_length,
        config.operation_timeout(),
    );

    let service = DocumentService::new(Arc::new(generator), Arc::new(store))
        .with_max_create_attempts(config.max_create_attempts);

    let state = AppState::new(Arc::new(service), config.max_document_size)
        .with_database_name(config.database_name.clone());
    let app = api::router(state, &config.allowed_origins);

    let listener = api::bind(&config.host, port.unwrap_or(config.port)).await?;
    tracing::info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
