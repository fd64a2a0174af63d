//! # Review Pipeline CLI (`rvp`)
//!
//! The `rvp` binary exposes each pipeline component as an independent unit
//! of work, so an external scheduler can order them and re-run them safely.
//!
//! ## Usage
//!
//! ```bash
//! rvp --config ./config/rvp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rvp init` | Create the SQLite database and run schema setup |
//! | `rvp scrape-reviews` | Scrape the current window and write a dated batch file |
//! | `rvp scrape-metadata` | Scrape company profiles into the CSV snapshot |
//! | `rvp load-reviews` | Bulk-load new batch files into the search index |
//! | `rvp load-metadata` | Upsert the snapshot into the relational tables |
//! | `rvp window` | Show (or advance) the scrape window cursor |
//! | `rvp status` | Show window, batch and fingerprint state |
//! | `rvp predict "<text>"` | One-off sentiment inference |
//! | `rvp serve` | Start the serving API |
//!
//! A typical scheduled run chains:
//!
//! ```bash
//! rvp scrape-metadata && rvp load-metadata
//! rvp scrape-reviews && rvp load-reviews
//! ```

mod config;
mod db;
mod load_metadata;
mod load_reviews;
mod migrate;
mod models;
mod normalize;
mod scrape_metadata;
mod scrape_reviews;
mod search_index;
mod sentiment;
mod server;
mod status;
mod window;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Review Pipeline CLI — incremental review scraping, idempotent loading,
/// and a sentiment serving API.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rvp.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rvp",
    about = "Review Pipeline — incremental review scraping and idempotent loading",
    version,
    long_about = "Review Pipeline scrapes customer reviews one time window per run, writes \
    dated batch files, and bulk-loads them incrementally into a search index. Company metadata \
    is scraped into a CSV snapshot and upserted into a relational schema, gated by a content \
    fingerprint so unchanged snapshots load nothing."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rvp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (category,
    /// entreprise, adress, rating, metadata_file_state, pipeline_state).
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Scrape reviews for the current time window.
    ///
    /// Reads the persisted window cursor, walks the paginated review
    /// listing of every tracked company, writes one dated batch file, and
    /// advances the cursor for the next run.
    ScrapeReviews,

    /// Scrape company profiles into the metadata snapshot.
    ///
    /// Skipped entirely when the snapshot file already exists; delete the
    /// file to force a re-scrape.
    ScrapeMetadata,

    /// Bulk-load new batch files into the search index.
    ///
    /// Creates the index with its field mapping when absent, then loads
    /// every batch file dated after the most recent loaded date. Re-running
    /// with unchanged inputs loads nothing.
    LoadReviews,

    /// Upsert the metadata snapshot into the relational tables.
    ///
    /// Short-circuits with a no-change outcome when the snapshot
    /// fingerprint matches the last successful load.
    LoadMetadata,

    /// Show the persisted scrape window cursor.
    Window {
        /// Advance the cursor to the next window instead of just showing it.
        #[arg(long)]
        advance: bool,
    },

    /// Show window, batch-file and fingerprint state.
    Status,

    /// Predict the sentiment of free text from the CLI.
    Predict {
        /// The text to classify.
        text: String,

        /// Company name to strip from the text before classification.
        #[arg(long)]
        company: Option<String>,
    },

    /// Start the serving API.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::ScrapeReviews => {
            scrape_reviews::run_scrape_reviews(&cfg).await?;
        }
        Commands::ScrapeMetadata => {
            scrape_metadata::run_scrape_metadata(&cfg).await?;
        }
        Commands::LoadReviews => {
            let summary = load_reviews::run_load_reviews(&cfg).await?;
            println!(
                "loaded {} file(s) ({} documents), skipped {}, failed {}",
                summary.loaded, summary.documents, summary.skipped, summary.failed
            );
            if summary.failed > 0 {
                anyhow::bail!("{} batch file(s) failed to load", summary.failed);
            }
        }
        Commands::LoadMetadata => {
            match load_metadata::run_load_metadata(&cfg).await? {
                load_metadata::MetadataOutcome::NoChange => println!("no_change"),
                load_metadata::MetadataOutcome::Loaded { rows } => {
                    println!("metadata_loaded ({} rows)", rows)
                }
            }
        }
        Commands::Window { advance } => {
            let pool = db::connect(&cfg).await?;
            let current = window::current_window(&pool).await?;
            if advance {
                let next = window::advance_window(&pool, current).await?;
                println!("{} -> {}", current, next);
            } else {
                println!("{}", current);
            }
            pool.close().await;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Predict { text, company } => {
            let model = sentiment::LexiconModel::default();
            let (label, cleaned) =
                sentiment::predict_sentiment(&model, &text, company.as_deref());
            println!("sentiment: {}", label);
            println!("cleaned:   {}", cleaned);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
