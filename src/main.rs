//! # Tecnobot CLI
//!
//! The `tecnobot` binary drives the sales-analysis backend: database
//! initialization, dataset import, context inspection, one-shot questions,
//! and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! tecnobot --config ./config/tecnobot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tecnobot init` | Create the SQLite database and run schema migrations |
//! | `tecnobot import <file>` | Replace the stored dataset with a delimited file |
//! | `tecnobot context` | Print the model-facing context for the stored dataset |
//! | `tecnobot ask "<question>"` | Ask a one-shot question about the dataset |
//! | `tecnobot serve` | Start the HTTP server |

mod config;
mod context;
mod gateway;
mod migrate;
mod models;
mod normalize;
mod server;
mod store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::gateway::CompletionGateway;
use crate::models::ConversationTurn;
use crate::store::{DatasetStore, SqliteStore};

/// Tecnobot CLI — sales-dataset ingestion and LLM-grounded analysis.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tecnobot.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tecnobot",
    about = "Tecnobot — sales-dataset ingestion and LLM-grounded analysis backend",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tecnobot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `vendas` table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Import a delimited sales file, replacing the stored dataset.
    ///
    /// Parses and normalizes the file, then replaces the entire stored
    /// generation. Rows with malformed dates or unparseable numeric fields
    /// are skipped and reported, never silently coerced.
    Import {
        /// Path to the delimited text file (header row + data rows).
        file: PathBuf,

        /// Field delimiter. Defaults to the `[import].delimiter` config value.
        #[arg(long)]
        delimiter: Option<char>,
    },

    /// Print the model-facing context for the stored dataset.
    ///
    /// Renders the full stored generation exactly as the completion service
    /// sees it. Useful for inspecting what the model is grounded on.
    Context,

    /// Ask a one-shot question about the dataset.
    ///
    /// Grounds the question in the stored dataset, or in an ad hoc file when
    /// `--file` is given, and prints the completion service's answer.
    Ask {
        /// The question, in natural language.
        question: String,

        /// Ground the question in this file instead of the stored dataset.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the import, chat, and health
    /// endpoints with permissive CORS.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tecnobot=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = SqliteStore::open(&cfg).await?;
            migrate::run_migrations(store.pool()).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file, delimiter } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let delimiter = delimiter.unwrap_or(cfg.import.delimiter);
            let batch = normalize::normalize_text(&text, delimiter)?;

            let store = SqliteStore::open(&cfg).await?;
            migrate::run_migrations(store.pool()).await?;
            let committed = store.replace_all(&batch.records).await?;

            println!("import {}", file.display());
            println!("  records imported: {}", committed);
            println!("  skipped (malformed date): {}", batch.skipped_dates);
            println!("  skipped (unparseable number): {}", batch.skipped_numeric);
            println!("ok");
        }
        Commands::Context => {
            let store = SqliteStore::open(&cfg).await?;
            let records = store.read_all_ordered().await?;
            println!("{}", context::format_context(&records));
        }
        Commands::Ask { question, file } => {
            let records = match file {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    normalize::normalize_text(&text, cfg.import.delimiter)?.records
                }
                None => {
                    let store = SqliteStore::open(&cfg).await?;
                    store.read_all_ordered().await?
                }
            };

            let gateway = CompletionGateway::new(&cfg.completion)?;
            let ctx = context::format_context(&records);
            let history = vec![ConversationTurn::user(question)];
            let answer = gateway.respond(&history, &ctx).await?;
            println!("{}", answer);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
