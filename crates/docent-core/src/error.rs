//! Error taxonomy shared by every stage of the question pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("embedding service unavailable: {0}")]
    EmbeddingServiceUnavailable(String),
    #[error("generation service unavailable: {0}")]
    GenerationServiceUnavailable(String),
    #[error("no embeddings cached for document: {0}")]
    CacheMiss(String),
    #[error("expected {expected} embeddings, got {actual}")]
    EmbeddingCountMismatch { expected: usize, actual: usize },
    #[error("paragraph {index} out of range for document {document}")]
    ParagraphOutOfRange { document: String, index: usize },
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("text to summarize must not be empty")]
    EmptySummaryText,
    #[error("no documents loaded")]
    NoDocuments,
    #[error("generation service returned no candidates")]
    EmptyGeneration,
}

impl Error {
    /// True for failures the user can simply retry (throttling, outages).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingServiceUnavailable(_) | Error::GenerationServiceUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_failures_are_transient() {
        assert!(Error::EmbeddingServiceUnavailable("429".into()).is_transient());
        assert!(Error::GenerationServiceUnavailable("503".into()).is_transient());
        assert!(!Error::UnsupportedFormat("docx".into()).is_transient());
        assert!(!Error::CacheMiss("a.pdf".into()).is_transient());
    }
}
