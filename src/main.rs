//! # docent CLI
//!
//! Ask questions about PDF documents and get answers grounded in their most
//! relevant paragraphs, with those paragraphs highlighted in place.
//!
//! ## Usage
//!
//! ```bash
//! docent --config ./config/docent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docent parse <file>` | Print the paragraphs and coordinates extracted from a PDF |
//! | `docent ask "<question>" <paths…>` | Answer a question over files and directories |
//! | `docent summarize` | Summarize text from a file or stdin |
//! | `docent serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! docent parse report.pdf --json
//! docent ask "What is the capital of France?" ./papers --out ./highlighted --html view.html
//! docent summarize --file notes.txt
//! RUST_LOG=debug docent serve
//! ```

use clap::{Parser, Subcommand};
use docent::{cli, config, server};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docent: grounded question answering over PDF documents.
#[derive(Parser)]
#[command(name = "docent", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the default path does not exist, built-in defaults are used.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract paragraphs from a document and print them.
    Parse {
        file: PathBuf,

        /// Print JSON instead of one line per paragraph.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question over documents.
    ///
    /// Paths may be PDF files or directories, which are searched
    /// recursively for `*.pdf`.
    Ask {
        question: String,

        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Write highlighted copies of the documents into this directory.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Write a self-contained HTML viewer to this file.
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Summarize text in a few sentences.
    Summarize {
        /// Read the text from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let result = run(args).await;

    if let Err(err) = &result {
        let transient = err
            .downcast_ref::<docent_core::Error>()
            .is_some_and(|e| e.is_transient());
        if transient {
            eprintln!("The service is temporarily unavailable. Please try again in a moment.");
        }
    }
    result
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config_or_default(&args.config)?;

    match args.command {
        Commands::Parse { file, json } => {
            cli::run_parse(&cfg, &file, json)?;
        }
        Commands::Ask {
            question,
            paths,
            out,
            html,
        } => {
            cli::run_ask(&cfg, &question, &paths, out.as_deref(), html.as_deref()).await?;
        }
        Commands::Summarize { file } => {
            cli::run_summarize(&cfg, file.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
