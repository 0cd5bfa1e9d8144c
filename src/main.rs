//! # Recollect CLI (`rcl`)
//!
//! Commands for database setup, URL ingestion, similarity queries, and
//! running the HTTP server.
//!
//! ```bash
//! rcl init                                  # create the database
//! rcl ingest https://example.com/post       # fetch, chunk, embed, store
//! rcl query "sliding window chunking"       # rank stored chunks
//! rcl serve                                 # start the JSON HTTP server
//! ```
//!
//! All commands accept `--config` pointing to a TOML file; see
//! `config/recollect.example.toml`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use recollect::config;
use recollect::db;
use recollect::ingest::Pipeline;
use recollect::migrate;
use recollect::server;

#[derive(Parser)]
#[command(
    name = "rcl",
    about = "Recollect — ingest web content and search it by meaning",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recollect.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest a URL: classify, fetch, chunk, embed, store.
    ///
    /// Re-ingesting a URL replaces its stored text and chunks.
    Ingest {
        /// The URL to ingest.
        url: String,
    },

    /// Search stored chunks by semantic similarity.
    Query {
        /// The search query text.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        top_k: Option<i64>,
    },

    /// Start the JSON HTTP server (POST /ingest, POST /query, GET /health).
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { url } => {
            let pipeline = Pipeline::new(cfg).await?;
            let source_id = pipeline.ingest(&url).await?;
            println!("ingested source {source_id}");
        }
        Commands::Query { query, top_k } => {
            let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
            let pipeline = Pipeline::new(cfg).await?;
            let results = pipeline.query(&query, top_k).await?;

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, result) in results.iter().enumerate() {
                let title = result.title.as_deref().unwrap_or("(untitled)");
                println!("{}. [{:.3}] {}", i + 1, result.score, title);
                println!("    url: {}", result.url);
                println!("    excerpt: \"{}\"", result.snippet);
                println!();
            }
        }
        Commands::Serve => {
            let pipeline = Pipeline::new(cfg).await?;
            server::run_server(pipeline).await?;
        }
    }

    Ok(())
}
