//! Shared fixtures: hand-built PDFs and stub services.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use docent_core::embedding::Embedder;
use docent_core::generation::{Generation, GenerationParams, Generator};
use std::collections::HashMap;
use std::sync::Mutex;

pub const FRANCE: &str = "Paris is the capital of France.";
pub const WATER: &str = "Water boils at 100C.";
pub const EIFFEL: &str = "The Eiffel Tower is in Paris.";
pub const QUESTION: &str = "What is the capital of France?";

/// Font size used by [`pdf_with_pages`].
pub const FONT_SIZE: f32 = 12.0;
/// Baseline of the first line on every page.
pub const FIRST_BASELINE: f32 = 720.0;

/// A PDF where each page holds paragraphs and each paragraph holds lines.
///
/// Lines are set 14pt apart; paragraphs are separated by a 30pt jump, so
/// every paragraph is its own block. Offsets in the xref table are exact.
pub fn pdf_with_pages(pages: &[Vec<Vec<&str>>]) -> Vec<u8> {
    let page_count = pages.len();
    let mut objects: Vec<Vec<u8>> = Vec::new();

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    objects.push(
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>",
            kids.join(" "),
            page_count
        )
        .into_bytes(),
    );
    objects.push(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec());

    for (i, paragraphs) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
                content_id
            )
            .into_bytes(),
        );

        let mut stream = format!(
            "BT /F1 {} Tf 14 TL 72 {} Td\n",
            FONT_SIZE, FIRST_BASELINE
        );
        for (p, lines) in paragraphs.iter().enumerate() {
            if p > 0 {
                stream.push_str("0 -30 Td\n");
            }
            for (l, line) in lines.iter().enumerate() {
                if l > 0 {
                    stream.push_str("T* ");
                }
                stream.push_str(&format!("({}) Tj\n", escape(line)));
            }
        }
        stream.push_str("ET\n");

        objects.push(stream_object(stream.as_bytes()));
    }

    assemble(&objects)
}

/// A one-page PDF showing `content` with `/F1` bound to object 5.
///
/// Objects 1 to 4 are the catalog, page tree, page and content stream;
/// `font_objects` are numbered from 5 in order.
pub fn pdf_with_font(content: &str, font_objects: Vec<Vec<u8>>) -> Vec<u8> {
    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_vec(),
        stream_object(content.as_bytes()),
    ];
    objects.extend(font_objects);
    assemble(&objects)
}

/// An object body holding `data` as an unfiltered stream.
pub fn stream_object(data: &[u8]) -> Vec<u8> {
    let mut object = format!("<< /Length {} >>\nstream\n", data.len()).into_bytes();
    object.extend_from_slice(data);
    object.extend_from_slice(b"\nendstream");
    object
}

/// Number `objects` from 1 and write them with an exact xref table.
fn assemble(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// One page, three one-line paragraphs about Paris.
pub fn france_pdf() -> Vec<u8> {
    pdf_with_pages(&[vec![vec![FRANCE], vec![WATER], vec![EIFFEL]]])
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Unit vector whose cosine similarity with `[1, 0]` is `score`.
pub fn scored(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).sqrt()]
}

/// Embedder backed by a lookup table; unknown texts embed as `[1, 0]`.
/// Every request batch is recorded.
#[derive(Default)]
pub struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl StubEmbedder {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Scores 0.95 / 0.10 / 0.90 for the three France paragraphs.
    pub fn france() -> Self {
        Self::new(&[
            (FRANCE, scored(0.95)),
            (WATER, scored(0.10)),
            (EIFFEL, scored(0.90)),
        ])
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub-embedder"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().push(texts.to_vec());
        Ok(texts
            .iter()
            .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![1.0, 0.0]))
            .collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding API error 429 Too Many Requests")
    }
}

/// Generator returning two fixed candidates; the better one is `" Paris.\n"`.
#[derive(Default)]
pub struct StubGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    fn model_name(&self) -> &str {
        "stub-generator"
    }

    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<Vec<Generation>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(vec![
            Generation {
                text: " Lyon ".to_string(),
                likelihood: -3.0,
            },
            Generation {
                text: " Paris.\n".to_string(),
                likelihood: -0.5,
            },
        ])
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<Vec<Generation>> {
        bail!("generation API error 503 Service Unavailable")
    }
}
