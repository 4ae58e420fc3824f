//! Implementations of the `docent` subcommands.
//!
//! Each `run_*` function takes the loaded [`Config`] and prints its result
//! to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use docent_core::models::ParsedDocument;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::loader::load_documents;
use crate::parse::parse_document;
use crate::pipeline::Pipeline;
use crate::session::Session;
use crate::viewer::render_viewer;

/// `docent parse <file> [--json]`
pub fn run_parse(config: &Config, file: &Path, json: bool) -> Result<()> {
    let document = load_documents(&[file.to_path_buf()])?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No document at {}", file.display()))?;
    let parsed = parse_document(document, &config.parsing)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ParseReport::from(&parsed))?);
    } else {
        print!("{}", format_paragraphs(&parsed));
    }
    Ok(())
}

#[derive(Serialize)]
struct ParseReport<'a> {
    name: &'a str,
    paragraphs: &'a [docent_core::models::Paragraph],
}

impl<'a> From<&'a ParsedDocument> for ParseReport<'a> {
    fn from(doc: &'a ParsedDocument) -> Self {
        Self {
            name: doc.name(),
            paragraphs: doc.paragraphs(),
        }
    }
}

/// One line per paragraph: `#index p.page [left,top,right,bottom] text`.
pub fn format_paragraphs(doc: &ParsedDocument) -> String {
    let mut out = String::new();
    for p in doc.paragraphs() {
        let c = p.coordinates;
        out.push_str(&format!(
            "#{} p.{} [{:.1},{:.1},{:.1},{:.1}] {}\n",
            p.index,
            c.page + 1,
            c.left,
            c.top,
            c.right,
            c.bottom,
            p.text
        ));
    }
    out
}

/// `docent ask <question> <paths…> [--out DIR] [--html FILE]`
pub async fn run_ask(
    config: &Config,
    question: &str,
    paths: &[PathBuf],
    out_dir: Option<&Path>,
    html: Option<&Path>,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled; set [embedding] provider in the config file");
    }
    if !config.generation.is_enabled() {
        bail!("Generation provider is disabled; set [generation] provider in the config file");
    }
    let pipeline = Pipeline::from_config(config.clone())?;
    let mut session = Session::new();
    for document in load_documents(paths)? {
        let name = document.name().to_string();
        pipeline
            .ingest(&mut session, document)
            .with_context(|| format!("Failed to load {}", name))?;
    }

    let outcome = pipeline.ask(&mut session, question).await?;
    println!("{}", outcome.answer);

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        for name in session.document_names() {
            if let Some(annotated) = session.annotation(name) {
                let path = dir.join(name);
                std::fs::write(&path, annotated.content())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!("wrote {}", path.display());
            }
        }
    }

    if let Some(path) = html {
        let page = render_viewer(&session, outcome.focus_document.as_deref());
        std::fs::write(path, page).with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("wrote {}", path.display());
    }

    Ok(())
}

/// `docent summarize [--file F]`; reads stdin when no file is given.
pub async fn run_summarize(config: &Config, file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };

    if !config.generation.is_enabled() {
        bail!("Generation provider is disabled; set [generation] provider in the config file");
    }
    let pipeline = Pipeline::from_config(config.clone())?;
    let mut session = Session::new();
    let outcome = pipeline.summarize(&mut session, &text).await?;
    println!("{}", outcome.summary);
    Ok(())
}
