//! # Kart Koç CLI (`koc`)
//!
//! The `koc` binary drives the answering pipeline: document ingestion,
//! similarity search, grounded question answering, index maintenance, and
//! the transaction-analytics demo commands.
//!
//! ## Usage
//!
//! ```bash
//! koc --config ./config/koc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `koc ingest` | Scan the docs directory, chunk, embed, and index |
//! | `koc search "<query>"` | Top-k similarity search over the index |
//! | `koc ask "<question>"` | Compose a grounded answer with citations |
//! | `koc count` | Number of records in the index |
//! | `koc reset` | Delete and recreate the collection |
//! | `koc simulate` | Write a synthetic transaction log |
//! | `koc rules` | Run recurring-charge and spend-risk rules |

mod analytics;
mod answer;
mod chunk;
mod config;
mod embedding;
mod extract;
mod generation;
mod index;
mod ingest;
mod models;
mod retriever;
mod retry;
mod txlog;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::answer::AnswerComposer;
use crate::embedding::GeminiEmbeddings;
use crate::generation::GeminiGeneration;
use crate::index::VectorIndex;
use crate::ingest::{IngestOutcome, IngestionPipeline};
use crate::retriever::Retriever;
use crate::retry::TokioSleeper;

/// Kart Koç — a retrieval-augmented document assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. The Gemini API key is read from the `GEMINI_API_KEY` environment
/// variable.
#[derive(Parser)]
#[command(
    name = "koc",
    about = "Kart Koç — ingest documents, search them, and answer questions with grounded citations",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/koc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest documents from the configured docs directory.
    ///
    /// Scans for `.txt`/`.pdf` files, chunks and embeds them, and writes
    /// the records into the vector index. An empty directory is seeded
    /// with a demo document so the index is never left empty.
    Ingest,

    /// Search the index by semantic similarity.
    Search {
        /// The query text.
        query: String,

        /// Number of hits to return.
        #[arg(long, default_value_t = 5)]
        k: usize,

        /// Emit hits as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the indexed documents.
    ///
    /// Retrieves the closest chunks, assembles a bounded context, and
    /// asks the generation model for a grounded answer with citations.
    Ask {
        /// The question text.
        question: String,

        /// Number of hits to retrieve (defaults to the configured value).
        #[arg(long)]
        top_k: Option<usize>,

        /// Sampling temperature (defaults to the configured value).
        #[arg(long)]
        temperature: Option<f32>,

        /// Context budget in characters (defaults to the configured value).
        #[arg(long)]
        max_context_chars: Option<usize>,

        /// Emit the answer as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Print the number of records in the index.
    Count,

    /// Delete all records and recreate the empty collection.
    Reset,

    /// Write a deterministic synthetic transaction log.
    Simulate {
        /// Output CSV path.
        #[arg(long, default_value = "./data/transactions.csv")]
        out: PathBuf,

        /// Days of history to generate.
        #[arg(long, default_value_t = 150)]
        days: u64,
    },

    /// Run the recurring-charge and spend-risk rules over a log.
    Rules {
        /// Transaction log CSV path.
        #[arg(long, default_value = "./data/transactions.csv")]
        transactions: PathBuf,

        /// Report renewals due within this many days.
        #[arg(long, default_value_t = 7)]
        days_ahead: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest => {
            let config = config::load_config(&cli.config)?;
            let gemini = GeminiEmbeddings::new(&config.gemini)?;
            let index = VectorIndex::open(&config.index.path).await?;
            let sleeper = TokioSleeper;
            let pipeline = IngestionPipeline::new(&config, &gemini, &sleeper, &index)?;

            let outcome = pipeline.ingest().await;
            match &outcome {
                IngestOutcome::Completed { chunks_added } => {
                    println!("ingest");
                    println!("  chunks added: {}", chunks_added);
                    println!("  index records: {}", index.count().await?);
                    println!("ok");
                }
                IngestOutcome::Failed { error } => {
                    println!("ingest");
                    println!("  chunks added: 0");
                    println!("  failed: {:#}", error);
                }
            }
            index.close().await;
        }

        Commands::Search { query, k, json } => {
            let config = config::load_config(&cli.config)?;
            let gemini = GeminiEmbeddings::new(&config.gemini)?;
            let index = VectorIndex::open(&config.index.path).await?;
            let retriever = Retriever::new(&gemini, &index);

            let hits = retriever.search(&query, k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No results.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    println!(
                        "{}. [{:.4}] {} (chunk {})",
                        i + 1,
                        hit.distance,
                        hit.meta.title,
                        hit.meta.chunk
                    );
                    println!("    excerpt: \"{}\"", excerpt(&hit.text, 120));
                    println!("    id: {}", hit.id);
                }
            }
            index.close().await;
        }

        Commands::Ask {
            question,
            top_k,
            temperature,
            max_context_chars,
            json,
        } => {
            let config = config::load_config(&cli.config)?;
            let gemini = GeminiEmbeddings::new(&config.gemini)?;
            let generation = GeminiGeneration::new(&config.gemini)?;
            let index = VectorIndex::open(&config.index.path).await?;
            let retriever = Retriever::new(&gemini, &index);
            let composer = AnswerComposer::new(retriever, &generation, config.answer.clone());

            let answer = composer
                .answer(&question, top_k, temperature, max_context_chars)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                println!("{}", answer.text);
                if !answer.sources.is_empty() {
                    println!();
                    println!("Kaynaklar:");
                    for source in &answer.sources {
                        println!(
                            "  - {} ({}, chunk {})",
                            source.title, source.source, source.chunk
                        );
                    }
                }
                println!();
                println!(
                    "hits: {} | top_k: {} | context chars: {}",
                    answer.meta.used_hits, answer.meta.top_k, answer.meta.context_chars
                );
            }
            index.close().await;
        }

        Commands::Count => {
            let config = config::load_config(&cli.config)?;
            let index = VectorIndex::open(&config.index.path).await?;
            println!("{}", index.count().await?);
            index.close().await;
        }

        Commands::Reset => {
            let config = config::load_config(&cli.config)?;
            let index = VectorIndex::open(&config.index.path).await?;
            index.reset().await?;
            println!("collection {} reset", index::COLLECTION);
            index.close().await;
        }

        Commands::Simulate { out, days } => {
            let today = chrono::Local::now().date_naive();
            let rows = txlog::simulate(days, today);
            txlog::write_csv(&out, &rows)?;
            println!("wrote {} transactions to {}", rows.len(), out.display());
        }

        Commands::Rules {
            transactions,
            days_ahead,
        } => {
            let today = chrono::Local::now().date_naive();
            let log = txlog::load_csv(&transactions)?;

            let recurring = analytics::detect_recurring(&log, today, days_ahead);
            if recurring.is_empty() {
                println!("No upcoming renewals.");
            } else {
                println!("Upcoming renewals:");
                for sub in &recurring {
                    println!(
                        "  - {} {:.2}₺ (last {}, renews {})",
                        sub.merchant, sub.amount, sub.last_date, sub.next_renewal
                    );
                }
            }

            let alerts = analytics::risk_check(&log, today);
            if alerts.is_empty() {
                println!("No risk alerts.");
            } else {
                println!("Risk alerts:");
                for alert in &alerts {
                    println!("  - {}", alert);
                }
            }
        }
    }

    Ok(())
}

fn excerpt(text: &str, n: usize) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= n {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(n).collect();
        format!("{}…", cut.trim_end())
    }
}
