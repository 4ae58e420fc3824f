//! # docent core
//!
//! Pure retrieval logic for docent: document models, the per-session
//! embedding/answer cache, similarity ranking, and context selection.
//!
//! This crate contains no tokio, HTTP, filesystem I/O, or PDF handling.
//! Embedding and generation backends are reached only through the
//! [`embedding::Embedder`] and [`generation::Generator`] traits, which the
//! application crate implements.

pub mod cache;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod rank;
pub mod select;

pub use error::{Error, Result};
