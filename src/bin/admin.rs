//! Editer Admin CLI
//!
//! Operator tool for inspecting share-ids and stored documents.
//!
//! # Usage
//!
//! ```bash
//! editer-admin ids --count 5 --seed audit-2024
//! editer-admin show 42-brave-otters-sing-loudly
//! ```
//!
//! Reads the same config file and `EDITER_*` variables as the server.

use clap::{Parser, Subcommand};
use editer::config::Config;
use editer::db::{init_db, SqliteDocumentStore};
use editer_core::{DocumentResponse, DocumentStore, HridGenerator};
use std::path::PathBuf;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "editer-admin")]
#[command(version)]
#[command(about = "Editer server administration tool")]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print share-ids from a generator sequence
    Ids {
        /// Number of ids to print
        #[arg(long, short = 'n', default_value_t = 10)]
        count: usize,
        /// Seed to replay (default: configured seed, else random)
        #[arg(long, short)]
        seed: Option<String>,
    },
    /// Print a stored document as JSON
    Show {
        /// Share-id of the document
        share_id: String,
    },
}

// ============================================================================
// Commands
// ============================================================================

fn print_ids(
    config: &Config,
    count: usize,
    seed: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let generator = match seed.or_else(|| config.hrid_seed.clone()) {
        Some(seed) => HridGenerator::new(seed)?,
        None => HridGenerator::from_entropy(),
    };

    for id in generator.generate_batch(count) {
        println!("{}", id);
    }
    Ok(())
}

async fn show_document(config: &Config, share_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let pool = init_db(&config.database_path, config.connect_timeout()).await?;
    let store = SqliteDocumentStore::new(
        pool.clone(),
        config.max_content_length,
        config.operation_timeout(),
    );

    let found = store.find_by_share_id(share_id).await;
    pool.close().await;

    match found? {
        Some(doc) => {
            let response = DocumentResponse::from(doc);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        None => {
            eprintln!("Error: Document '{}' not found", share_id);
            std::process::exit(1);
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match Config::load(cli.config) {
        Ok(config) => match cli.command {
            Commands::Ids { count, seed } => print_ids(&config, count, seed),
            Commands::Show { share_id } => show_document(&config, &share_id).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
