//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa serve` | Start the HTTP / WebSocket server |
//! | `docqa ask "<prompt>" [--file <path>]` | Answer one question |
//! | `docqa extract <path>` | Print a file's extracted text |
//! | `docqa retrieve "<prompt>" --file <path> [--k N]` | Print ranked passages |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `docqa=info,docqa_core=info,tower_http=info`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docqa::config::{self, Config};
use docqa::embedding::create_provider;
use docqa::extract::ExtractorRegistry;
use docqa::pipeline::Pipeline;
use docqa_core::models::Document;
use docqa_core::retrieve::Retriever;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// docqa: ask questions about documents using a local language model.
#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when
    /// omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server on `[server].bind`.
    Serve,

    /// Answer a single question, optionally grounded in a file.
    ///
    /// Prints the answer, or the failure message with exit code 1.
    Ask {
        prompt: String,
        /// File to ground the answer in.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print the text extracted from a file.
    Extract { path: PathBuf },

    /// Print the passages of a file most relevant to a prompt, without
    /// calling the inference backend.
    Retrieve {
        prompt: String,
        #[arg(long)]
        file: PathBuf,
        /// Number of passages (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docqa=info,docqa_core=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document::new(filename, bytes))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            docqa::server::run_server(&cfg).await?;
        }
        Commands::Ask { prompt, file } => {
            let attachment = file.as_deref().map(read_document).transpose()?;
            let pipeline = Pipeline::from_config(&cfg)?;
            match pipeline.answer(&prompt, attachment).await {
                Ok(answer) => println!("{}", answer.text),
                Err(e) => {
                    println!("{}", e.user_message());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Extract { path } => {
            let doc = read_document(&path)?;
            let registry = ExtractorRegistry::from_config(&cfg);
            let extracted = tokio::task::spawn_blocking(move || {
                registry.extract(&doc.bytes, &doc.filename)
            })
            .await??;
            println!("{}", extracted.text);
        }
        Commands::Retrieve { prompt, file, k } => {
            run_retrieve(&cfg, &prompt, &file, k).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_retrieve(
    cfg: &Config,
    prompt: &str,
    file: &Path,
    k: Option<usize>,
) -> anyhow::Result<()> {
    let doc = read_document(file)?;
    let registry = ExtractorRegistry::from_config(cfg);
    let extracted =
        tokio::task::spawn_blocking(move || registry.extract(&doc.bytes, &doc.filename)).await??;

    let retriever = Retriever::new(create_provider(&cfg.embedding)?, cfg.retrieval.top_k);
    let retrieval = retriever
        .retrieve_k(prompt, &extracted.text, k.unwrap_or(retriever.top_k()))
        .await?;

    println!(
        "{} of {} passages (category: {}{})",
        retrieval.passages.len(),
        retrieval.total_passages,
        extracted.category,
        if retrieval.degraded { ", degraded chunking" } else { "" }
    );
    for (rank, hit) in retrieval.passages.iter().enumerate() {
        println!(
            "{}. [#{} d={:.4}] {}",
            rank + 1,
            hit.passage.ordinal,
            hit.distance,
            hit.passage.text
        );
    }
    Ok(())
}
