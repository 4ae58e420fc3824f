//! Document parsing: bytes in, ordered paragraphs with page coordinates out.
//!
//! Only PDF is parsed. Every other format is reported as
//! [`Error::UnsupportedFormat`].
//!
//! # PDF layout analysis
//!
//! Each page's content stream is decoded and interpreted just far enough to
//! place text: the graphics CTM (`cm`, `q`, `Q`) and the text state (`BT`,
//! `Tm`, `Td`, `TD`, `T*`, `TL`, `Tf`, `Tc`, `Tw`, `Tz`, `Ts`) are tracked,
//! and every string shown by `Tj`, `TJ`, `'` or `"` becomes a *span*.
//! Strings are decoded and measured through the page's fonts (encoding,
//! `ToUnicode` and widths). Boxes use an ascent of 0.8 em and a descent of 0.2 em.
//!
//! Spans on one baseline form a *line*. Consecutive lines whose vertical
//! gap is at most `block_gap_factor` line heights and which overlap
//! horizontally form a *block*, and each block is one paragraph. Blocks are
//! emitted in page order, then content-stream order.

use docent_core::models::{Coordinates, Document, DocumentFormat, ParsedDocument};
use docent_core::{Error, Result};
use lopdf::content::Content;
use lopdf::Object;

use crate::config::ParsingConfig;
use crate::font::{self, raw_text, PageFonts, DEFAULT_GLYPH_WIDTH};
use crate::pdf::{self, number};

const ASCENT_EM: f32 = 0.8;
const DESCENT_EM: f32 = 0.2;
/// `TJ` adjustments beyond this (thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Parse one document into paragraphs.
pub fn parse_document(document: Document, config: &ParsingConfig) -> Result<ParsedDocument> {
    match document.format() {
        DocumentFormat::Pdf => {
            let paragraphs = extract_pdf_paragraphs(document.content(), config)?;
            tracing::debug!(
                document = document.name(),
                paragraphs = paragraphs.len(),
                "parsed document"
            );
            Ok(ParsedDocument::new(document, paragraphs))
        }
        other => Err(Error::UnsupportedFormat(other.label().to_string())),
    }
}

/// Parse a batch, stopping at the first failure.
pub fn parse_documents(documents: Vec<Document>, config: &ParsingConfig) -> Result<Vec<ParsedDocument>> {
    documents
        .into_iter()
        .map(|doc| parse_document(doc, config))
        .collect()
}

fn extract_pdf_paragraphs(bytes: &[u8], config: &ParsingConfig) -> Result<Vec<(String, Coordinates)>> {
    let doc = pdf::load(bytes)?;
    let mut paragraphs = Vec::new();

    for (page_index, (_, page_id)) in doc.get_pages().into_iter().enumerate() {
        let media_box = pdf::media_box(&doc, page_id);
        let raw = doc.get_page_content(page_id).map_err(pdf::pdf_error)?;
        let content = Content::decode(&raw).map_err(pdf::pdf_error)?;

        let fonts = font::page_fonts(&doc, page_id);
        let spans = TextInterpreter::new(&fonts).run(&content);
        let lines = group_lines(spans);
        let blocks = group_blocks(lines, config.block_gap_factor);

        for block in blocks {
            let text = normalize_whitespace(&block.text);
            if text.is_empty() {
                continue;
            }
            let [llx, _, _, ury] = media_box;
            paragraphs.push((
                text,
                Coordinates {
                    left: block.x0 - llx,
                    top: ury - block.y1,
                    right: block.x1 - llx,
                    bottom: ury - block.y0,
                    page: page_index,
                },
            ));
        }
    }

    Ok(paragraphs)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============ Content-stream interpretation ============

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m1 × m2`: apply `m1` first, then `m2`.
fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translate(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

/// A run of shown text in PDF user space (y grows upward).
#[derive(Debug, Clone)]
struct Span {
    text: String,
    x0: f32,
    x1: f32,
    baseline: f32,
    size: f32,
}

/// The parts of the graphics state that place text; saved by `q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz` as a fraction.
    horizontal_scaling: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 0.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            rise: 0.0,
        }
    }
}

struct TextInterpreter<'f, 'a> {
    fonts: &'f PageFonts<'a>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Option<Matrix>,
    line_matrix: Option<Matrix>,
    spans: Vec<Span>,
}

impl<'f, 'a> TextInterpreter<'f, 'a> {
    fn new(fonts: &'f PageFonts<'a>) -> Self {
        Self {
            fonts,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: None,
            line_matrix: None,
            spans: Vec::new(),
        }
    }

    fn run(mut self, content: &Content) -> Vec<Span> {
        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operand(operands) {
                        self.state.ctm = multiply(&m, &self.state.ctm);
                    }
                }
                "BT" => {
                    self.text_matrix = Some(IDENTITY);
                    self.line_matrix = Some(IDENTITY);
                }
                "ET" => {
                    self.text_matrix = None;
                    self.line_matrix = None;
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.state.font = Some(name.clone());
                    }
                    if let Some(size) = operands.get(1).and_then(number) {
                        self.state.font_size = size;
                    }
                }
                "TL" => set_number(&mut self.state.leading, operands),
                "Tc" => set_number(&mut self.state.char_spacing, operands),
                "Tw" => set_number(&mut self.state.word_spacing, operands),
                "Ts" => set_number(&mut self.state.rise, operands),
                "Tz" => {
                    if let Some(percent) = operands.first().and_then(number) {
                        self.state.horizontal_scaling = percent / 100.0;
                    }
                }
                "Td" => {
                    if let (Some(tx), Some(ty)) = two_numbers(operands) {
                        self.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let (Some(tx), Some(ty)) = two_numbers(operands) {
                        self.state.leading = -ty;
                        self.move_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operand(operands) {
                        self.text_matrix = Some(m);
                        self.line_matrix = Some(m);
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(bytes);
                    }
                }
                "\"" => {
                    if let (Some(aw), Some(ac)) = two_numbers(operands) {
                        self.state.word_spacing = aw;
                        self.state.char_spacing = ac;
                    }
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        self.show_array(items);
                    }
                }
                _ => {}
            }
        }
        self.spans
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        let line = multiply(&translate(tx, ty), &self.line_matrix.unwrap_or(IDENTITY));
        self.line_matrix = Some(line);
        self.text_matrix = Some(line);
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    /// Decode `bytes` with the current font and measure their advance in
    /// unscaled text space.
    fn measure(&self, bytes: &[u8]) -> (String, f32) {
        let state = &self.state;
        let (text, glyphs) = match state.font.as_ref().and_then(|name| self.fonts.get(name)) {
            Some(font) => (font.decode(bytes), font.glyphs(bytes)),
            None => {
                let text = raw_text(bytes);
                let glyphs = text.chars().map(|c| (DEFAULT_GLYPH_WIDTH, c == ' ')).collect();
                (text, glyphs)
            }
        };
        let advance = glyphs
            .iter()
            .map(|&(width, is_space)| {
                let spacing = if is_space { state.word_spacing } else { 0.0 };
                (width / 1000.0 * state.font_size + state.char_spacing + spacing)
                    * state.horizontal_scaling
            })
            .sum();
        (text, advance)
    }

    fn show(&mut self, bytes: &[u8]) {
        let (text, advance) = self.measure(bytes);
        self.emit(&text, advance);
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut text = String::new();
        let mut advance = 0.0;
        for item in items {
            if let Object::String(bytes, _) = item {
                let (piece, width) = self.measure(bytes);
                text.push_str(&piece);
                advance += width;
            } else if let Some(n) = number(item) {
                // Negative numbers move the pen right.
                if -n > TJ_SPACE_THRESHOLD && !text.ends_with(' ') {
                    text.push(' ');
                }
                advance -= n / 1000.0 * self.state.font_size * self.state.horizontal_scaling;
            }
        }
        self.emit(&text, advance);
    }

    fn emit(&mut self, text: &str, advance: f32) {
        // Text shown outside BT/ET is malformed; ignore it.
        let Some(tm) = self.text_matrix else {
            return;
        };
        let rendering = multiply(&tm, &self.state.ctm);
        let origin = multiply(&translate(0.0, self.state.rise), &rendering);
        let scale_x = rendering[0].hypot(rendering[1]);
        let scale_y = rendering[2].hypot(rendering[3]);

        let text: String = text
            .chars()
            .filter(|c| !c.is_control() || c.is_whitespace())
            .collect();
        if !text.trim().is_empty() && self.state.font_size > 0.0 {
            let x0 = origin[4];
            self.spans.push(Span {
                text,
                x0,
                x1: x0 + advance.max(0.0) * scale_x,
                baseline: origin[5],
                size: self.state.font_size * scale_y,
            });
        }

        self.text_matrix = Some(multiply(&translate(advance, 0.0), &tm));
    }
}

fn set_number(slot: &mut f32, operands: &[Object]) {
    if let Some(value) = operands.first().and_then(number) {
        *slot = value;
    }
}

fn two_numbers(operands: &[Object]) -> (Option<f32>, Option<f32>) {
    (
        operands.first().and_then(number),
        operands.get(1).and_then(number),
    )
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(m)
}

// ============ Lines and blocks ============

/// Text with a box in PDF user space: `y0` is the lower edge, `y1` the upper.
#[derive(Debug, Clone)]
struct TextBox {
    text: String,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl TextBox {
    fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    fn overlaps_horizontally(&self, other: &TextBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }

    fn extend(&mut self, other: &TextBox, separator: &str) {
        self.text.push_str(separator);
        self.text.push_str(&other.text);
        self.x0 = self.x0.min(other.x0);
        self.y0 = self.y0.min(other.y0);
        self.x1 = self.x1.max(other.x1);
        self.y1 = self.y1.max(other.y1);
    }
}

fn span_box(span: &Span) -> TextBox {
    TextBox {
        text: span.text.clone(),
        x0: span.x0,
        y0: span.baseline - DESCENT_EM * span.size,
        x1: span.x1,
        y1: span.baseline + ASCENT_EM * span.size,
    }
}

/// Merge consecutive spans that share a baseline.
fn group_lines(spans: Vec<Span>) -> Vec<TextBox> {
    let mut lines: Vec<TextBox> = Vec::new();
    let mut current: Option<(TextBox, f32, f32)> = None;

    for span in spans {
        let next = span_box(&span);
        let same_baseline = matches!(
            &current,
            Some((_, baseline, size)) if (span.baseline - baseline).abs() <= 0.5 * size.max(span.size)
        );
        if same_baseline {
            if let Some((line, _, size)) = current.as_mut() {
                let gap = next.x0 - line.x1;
                let needs_space = gap > 0.15 * span.size
                    && !line.text.ends_with(' ')
                    && !next.text.starts_with(' ');
                line.extend(&next, if needs_space { " " } else { "" });
                *size = size.max(span.size);
            }
        } else {
            if let Some((line, _, _)) = current.take() {
                lines.push(line);
            }
            current = Some((next, span.baseline, span.size));
        }
    }
    if let Some((line, _, _)) = current {
        lines.push(line);
    }
    lines
}

/// Merge consecutive lines into blocks.
///
/// A line joins the open block when it sits below the block's last line,
/// the gap between them is at most `gap_factor` times that line's height,
/// and the two overlap horizontally.
fn group_blocks(lines: Vec<TextBox>, gap_factor: f32) -> Vec<TextBox> {
    let mut blocks: Vec<TextBox> = Vec::new();
    let mut current: Option<(TextBox, TextBox)> = None;

    for line in lines {
        let continues = matches!(
            &current,
            Some((_, last)) if line.y1 <= last.y1
                && last.y0 - line.y1 <= gap_factor * last.height()
                && line.overlaps_horizontally(last)
        );
        if continues {
            if let Some((block, last)) = current.as_mut() {
                block.extend(&line, " ");
                *last = line;
            }
        } else {
            if let Some((block, _)) = current.take() {
                blocks.push(block);
            }
            current = Some((line.clone(), line));
        }
    }
    if let Some((block, _)) = current {
        blocks.push(block);
    }
    blocks
}
