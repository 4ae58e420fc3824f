//! The question pipeline: rank, select, highlight, generate.
//!
//! A [`Pipeline`] holds the configured providers and is shared freely; all
//! per-user state lives in the [`Session`] passed to each call. One question
//! runs its steps strictly in sequence:
//!
//! 1. answer cache lookup keyed by (document names, question); a hit
//!    highlights the cached selection again and stops here
//! 2. [`rank_paragraphs`] (embedding only what the cache lacks)
//! 3. [`select_context`] and [`build_context`]
//! 4. [`highlight`] the selection, replacing the session's annotations
//! 5. prompt truncation, generation, best-candidate choice, answer caching

use docent_core::cache::AnswerKey;
use docent_core::embedding::Embedder;
use docent_core::generation::{pick_best, GenerationParams, Generator};
use docent_core::models::{Document, ParsedDocument, RankedParagraph};
use docent_core::rank::rank_paragraphs;
use docent_core::select::{build_context, select_context};
use docent_core::{Error, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::highlight::highlight;
use crate::parse::parse_document;
use crate::prompt::{build_answer_prompt, build_summary_prompt, PromptWindow};
use crate::session::Session;

/// Result of one question.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub answer: String,
    /// `true` when the answer came from the session cache; nothing was
    /// ranked or generated, and the cached selection was highlighted again.
    pub cached: bool,
    /// Document holding the best-ranked paragraph, shown first by viewers.
    pub focus_document: Option<String>,
    /// Selected paragraphs, ascending by score.
    pub context: Vec<RankedParagraph>,
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub summary: String,
    pub cached: bool,
}

pub struct Pipeline {
    config: Config,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    window: PromptWindow,
}

impl Pipeline {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> anyhow::Result<Self> {
        let window = PromptWindow::new(config.generation.prompt_token_limit)?;
        Ok(Self {
            config,
            embedder,
            generator,
            window,
        })
    }

    /// Build a pipeline with the providers named in `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Self::new(config, embedder, generator)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse `document` and add it to `session`. Returns `true` if it
    /// replaced a document of the same name.
    pub fn ingest(&self, session: &mut Session, document: Document) -> Result<bool> {
        let parsed = self.parse(document)?;
        Ok(self.add(session, parsed))
    }

    /// The CPU-bound half of [`ingest`](Self::ingest); needs no session.
    pub fn parse(&self, document: Document) -> Result<ParsedDocument> {
        parse_document(document, &self.config.parsing)
    }

    /// Add an already parsed document. Returns `true` on replacement.
    pub fn add(&self, session: &mut Session, parsed: ParsedDocument) -> bool {
        info!(
            document = parsed.name(),
            paragraphs = parsed.len(),
            "document added to session"
        );
        session.add_document(parsed)
    }

    /// Answer `question` over the session's documents.
    ///
    /// The question is trimmed first, so questions differing only in
    /// surrounding whitespace share a cache entry.
    pub async fn ask(&self, session: &mut Session, question: &str) -> Result<AskOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::EmptyQuestion);
        }
        if session.documents().is_empty() {
            return Err(Error::NoDocuments);
        }

        let key = AnswerKey::question(&session.document_names(), question);
        if let Some(answer) = session.cache().get_answer(&key).map(str::to_string) {
            let selected = session
                .cache()
                .get_answer_context(&key)
                .map(<[_]>::to_vec)
                .unwrap_or_default();
            session.set_annotations(highlight(&selected, &self.config.highlight)?);
            info!(paragraphs = selected.len(), "answer served from cache");
            return Ok(AskOutcome {
                answer,
                cached: true,
                focus_document: selected.last().map(|p| p.document_name().to_string()),
                context: selected,
            });
        }

        let documents = session.documents().to_vec();
        let ranked = rank_paragraphs(
            &documents,
            question,
            self.embedder.as_ref(),
            session.cache_mut(),
        )
        .await?;

        let selected = select_context(&ranked, &self.config.selection.params());
        let context = build_context(&selected);
        let focus_document = selected.last().map(|p| p.document_name().to_string());

        session.set_annotations(highlight(&selected, &self.config.highlight)?);

        info!(question, "generating answer");
        let prompt = self.window.truncate(&build_answer_prompt(&context, question));
        let answer = self
            .generate(&prompt, &self.config.generation.answer_params())
            .await?;
        session
            .cache_mut()
            .put_answer_with_context(key, answer.clone(), selected.clone());

        Ok(AskOutcome {
            answer,
            cached: false,
            focus_document,
            context: selected,
        })
    }

    /// Summarize free text. Summaries are cached by the text itself.
    pub async fn summarize(&self, session: &mut Session, text: &str) -> Result<SummaryOutcome> {
        if text.trim().is_empty() {
            return Err(Error::EmptySummaryText);
        }

        let key = AnswerKey::summary(text);
        if let Some(summary) = session.cache().get_answer(&key) {
            info!("summary served from cache");
            return Ok(SummaryOutcome {
                summary: summary.to_string(),
                cached: true,
            });
        }

        let prompt = self.window.truncate(&build_summary_prompt(text));
        let summary = self
            .generate(&prompt, &self.config.generation.summary_params())
            .await?;
        session.cache_mut().put_answer(key, summary.clone());

        Ok(SummaryOutcome {
            summary,
            cached: false,
        })
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let generations = self
            .generator
            .generate(prompt, params)
            .await
            .map_err(|e| {
                warn!(error = %e, model = self.generator.model_name(), "generation request failed");
                Error::GenerationServiceUnavailable(e.to_string())
            })?;
        pick_best(generations)
    }
}
