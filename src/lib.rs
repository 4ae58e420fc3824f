//! # docent
//!
//! Grounded question answering over PDF documents.
//!
//! Documents are split into paragraphs with page coordinates, paragraphs
//! are embedded once per session and ranked against each question, a small
//! homogeneous set of top paragraphs becomes the generation context, and
//! those paragraphs are highlighted in annotated copies of the documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Parse   │──▶│ Rank (cache) │──▶│ Select ctx   │──▶│  Generate   │
//! │ lopdf    │   │ embeddings   │   │ stdev stop   │   │ best of n   │
//! └──────────┘   └──────────────┘   └──────┬───────┘   └─────────────┘
//!                                          ▼
//!                                   ┌──────────────┐
//!                                   │  Highlight   │
//!                                   └──────────────┘
//! ```
//!
//! The pure pieces (models, cache, ranking, selection, service traits) live
//! in the `docent-core` crate; this crate adds PDF handling, HTTP
//! providers, configuration, the CLI and the HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`parse`] | PDF paragraph and coordinate extraction |
//! | [`highlight`] | Annotated copies with highlighted paragraphs |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Generation providers |
//! | [`prompt`] | Prompt templates and token-window truncation |
//! | [`session`] | Per-user documents, annotations and cache |
//! | [`pipeline`] | The question and summary pipeline |
//! | [`loader`] | Loading documents from disk |
//! | [`viewer`] | Self-contained HTML viewer |
//! | [`cli`] | Subcommand implementations |
//! | [`server`] | HTTP server |

pub mod cli;
pub mod config;
pub mod embedding;
pub mod generation;
pub mod highlight;
pub mod loader;
pub mod parse;
mod font;
mod pdf;
pub mod pipeline;
pub mod prompt;
pub mod server;
pub mod session;
pub mod viewer;
