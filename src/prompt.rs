//! Prompt construction and token-window truncation.
//!
//! Prompts are cut to their last `limit` tokens (cl100k BPE), so when the
//! context is too long it is the start of the context that falls away while
//! the question and the trailing `Answer:` cue always survive.

use anyhow::{Context, Result};
use tiktoken_rs::CoreBPE;

/// Prompt asking for an answer grounded only in `context`.
pub fn build_answer_prompt(context: &str, question: &str) -> String {
    format!(
        "Read the paragraphs from the context below and answer the question, \
         if the question cannot be answered based on the context alone, write \
         \"sorry i had trouble answering this question, based on the provided information\"\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         Answer:"
    )
}

/// Prompt asking for a short summary of `text`.
pub fn build_summary_prompt(text: &str) -> String {
    format!(
        "Read the paragraph below and summarize it in a few sentences, \
         if the context can not be summarized, write \
         \"Sorry, I could not come up with a good summary\"\n\
         \n\
         Paragraph:\n\
         {text}\n\
         \n\
         Summary:"
    )
}

/// Keeps the tail of a prompt within a token budget.
pub struct PromptWindow {
    bpe: CoreBPE,
    limit: usize,
}

impl PromptWindow {
    pub fn new(limit: usize) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().context("Failed to load cl100k tokenizer")?;
        Ok(Self { bpe, limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Return the last `limit` tokens of `prompt` as text.
    ///
    /// A cut that lands inside a multi-byte character cannot be decoded; the
    /// start is then moved forward a token at a time until it can.
    pub fn truncate(&self, prompt: &str) -> String {
        let tokens = self.bpe.encode_with_special_tokens(prompt);
        if tokens.len() <= self.limit {
            return prompt.to_string();
        }

        let mut start = tokens.len() - self.limit;
        while start < tokens.len() {
            if let Ok(text) = self.bpe.decode(tokens[start..].to_vec()) {
                tracing::debug!(
                    dropped = start,
                    kept = tokens.len() - start,
                    "prompt truncated to token window"
                );
                return text;
            }
            start += 1;
        }
        String::new()
    }
}
