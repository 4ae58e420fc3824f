//! Page font resources: how string operands become text and advances.
//!
//! Text is decoded through the font's `ToUnicode` CMap or named encoding
//! (via [`lopdf::Encoding`]), or through a table built from an encoding
//! dictionary's `/Differences`. Composite (`Type0`) fonts read two-byte
//! codes. Glyph widths come from `/Widths` for simple fonts and from the
//! descendant font's `/W` and `/DW` for composite ones.

use lopdf::{Dictionary, Document as PdfDocument, Encoding, Object, ObjectId};
use std::collections::BTreeMap;

use crate::pdf::{number, resolve};

/// Width of glyphs a font does not describe, in thousandths of an em.
pub const DEFAULT_GLYPH_WIDTH: f32 = 500.0;
/// `/DW` when a composite font omits it.
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// Fonts of one page, keyed by resource name (the `Tf` operand).
pub type PageFonts<'a> = BTreeMap<Vec<u8>, Font<'a>>;

pub fn page_fonts(doc: &PdfDocument, page_id: ObjectId) -> PageFonts<'_> {
    match doc.get_page_fonts(page_id) {
        Ok(fonts) => fonts
            .into_iter()
            .map(|(name, dict)| (name, Font::load(doc, dict)))
            .collect(),
        Err(err) => {
            tracing::debug!(error = %err, "page fonts unreadable, decoding raw bytes");
            BTreeMap::new()
        }
    }
}

pub struct Font<'a> {
    decoder: Decoder<'a>,
    two_byte: bool,
    widths: Widths,
}

enum Decoder<'a> {
    Encoding(Encoding<'a>),
    /// Text per single-byte code.
    Table(Vec<String>),
    Raw,
}

enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f32>,
        missing: f32,
    },
    /// Inclusive code ranges with one width each.
    Cid {
        ranges: Vec<(u32, u32, f32)>,
        default: f32,
    },
}

impl<'a> Font<'a> {
    pub fn load(doc: &'a PdfDocument, dict: &'a Dictionary) -> Self {
        let two_byte = matches!(dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Type0"));
        let widths = if two_byte {
            cid_widths(doc, dict)
        } else {
            simple_widths(doc, dict)
        };
        Self {
            decoder: load_decoder(doc, dict),
            two_byte,
            widths,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match &self.decoder {
            Decoder::Encoding(encoding) => encoding
                .bytes_to_string(bytes)
                .unwrap_or_else(|_| self.raw(bytes)),
            Decoder::Table(table) => bytes.iter().map(|&b| table[b as usize].as_str()).collect(),
            Decoder::Raw => self.raw(bytes),
        }
    }

    /// One `(width, is_space)` pair per glyph code in `bytes`.
    ///
    /// Widths are in thousandths of an em. `is_space` marks the single-byte
    /// code 32, the only code word spacing applies to.
    pub fn glyphs(&self, bytes: &[u8]) -> Vec<(f32, bool)> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, &b| acc * 256 + b as u32);
                    (self.width(code), false)
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| (self.width(b as u32), b == b' '))
                .collect()
        }
    }

    fn width(&self, code: u32) -> f32 {
        match &self.widths {
            Widths::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Cid { ranges, default } => ranges
                .iter()
                .find(|(first, last, _)| (*first..=*last).contains(&code))
                .map(|(_, _, width)| *width)
                .unwrap_or(*default),
        }
    }

    fn raw(&self, bytes: &[u8]) -> String {
        if self.two_byte {
            bytes
                .chunks_exact(2)
                .filter_map(|pair| char::from_u32(u16::from_be_bytes([pair[0], pair[1]]) as u32))
                .collect()
        } else {
            raw_text(bytes)
        }
    }
}

/// Bytes shown without a known font: UTF-16BE with a BOM, otherwise one
/// char per byte.
pub fn raw_text(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn get<'a>(doc: &'a PdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|value| resolve(doc, value))
}

fn get_number(doc: &PdfDocument, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    get(doc, dict, key).and_then(number)
}

fn load_decoder<'a>(doc: &'a PdfDocument, font: &'a Dictionary) -> Decoder<'a> {
    // ToUnicode wins over /Differences; lopdf falls back to it when the
    // encoding is not a name.
    if !font.has(b"ToUnicode") {
        if let Some(Object::Dictionary(encoding)) = get(doc, font, b"Encoding") {
            return Decoder::Table(differences_table(doc, encoding));
        }
    }
    match font.get_font_encoding(doc) {
        Ok(encoding) => Decoder::Encoding(encoding),
        Err(err) => {
            tracing::debug!(error = %err, "font encoding unreadable, decoding raw bytes");
            Decoder::Raw
        }
    }
}

fn differences_table(doc: &PdfDocument, encoding: &Dictionary) -> Vec<String> {
    let base = match get(doc, encoding, b"BaseEncoding") {
        Some(Object::Name(name)) => name.as_slice(),
        _ => b"StandardEncoding".as_slice(),
    };
    let mut table = base_table(doc, base);

    if let Some(Object::Array(differences)) = get(doc, encoding, b"Differences") {
        let mut code = 0usize;
        for item in differences {
            match item {
                Object::Integer(start) => code = (*start).clamp(0, 255) as usize,
                Object::Name(glyph) => {
                    if let (Some(slot), Some(text)) = (table.get_mut(code), glyph_text(glyph)) {
                        *slot = text;
                    }
                    code += 1;
                }
                _ => {}
            }
        }
    }
    table
}

/// Text for every byte under a named base encoding.
fn base_table(doc: &PdfDocument, name: &[u8]) -> Vec<String> {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Encoding", Object::Name(name.to_vec()));
    let encoding = font.get_font_encoding(doc).ok();
    (0u8..=255)
        .map(|b| {
            encoding
                .as_ref()
                .and_then(|e| e.bytes_to_string(&[b]).ok())
                .unwrap_or_else(|| (b as char).to_string())
        })
        .collect()
}

/// Text for a glyph name, following the Adobe glyph naming rules for
/// `uniXXXX`, `uXXXX`, ligatures joined by `_` and `.suffix` variants.
fn glyph_text(name: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(name).ok()?;
    let base = name.split('.').next().unwrap_or_default();
    if base.is_empty() {
        return None;
    }
    base.split('_').map(component_text).collect()
}

fn component_text(name: &str) -> Option<String> {
    if name.len() == 1 && name.as_bytes()[0].is_ascii_alphanumeric() {
        return Some(name.to_string());
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if !hex.is_empty() && hex.len() % 4 == 0 {
            let units = (0..hex.len())
                .step_by(4)
                .map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
                .collect::<Option<Vec<u16>>>()?;
            return String::from_utf16(&units).ok();
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c.to_string());
            }
        }
    }
    GLYPH_NAMES
        .iter()
        .find(|(glyph, _)| *glyph == name)
        .map(|(_, text)| text.to_string())
}

/// Glyph names common in `/Differences` arrays of text fonts.
const GLYPH_NAMES: &[(&str, &str)] = &[
    ("space", " "),
    ("exclam", "!"),
    ("quotedbl", "\""),
    ("numbersign", "#"),
    ("dollar", "$"),
    ("percent", "%"),
    ("ampersand", "&"),
    ("quotesingle", "'"),
    ("parenleft", "("),
    ("parenright", ")"),
    ("asterisk", "*"),
    ("plus", "+"),
    ("comma", ","),
    ("hyphen", "-"),
    ("period", "."),
    ("slash", "/"),
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("colon", ":"),
    ("semicolon", ";"),
    ("less", "<"),
    ("equal", "="),
    ("greater", ">"),
    ("question", "?"),
    ("at", "@"),
    ("bracketleft", "["),
    ("backslash", "\\"),
    ("bracketright", "]"),
    ("asciicircum", "^"),
    ("underscore", "_"),
    ("grave", "`"),
    ("braceleft", "{"),
    ("bar", "|"),
    ("braceright", "}"),
    ("asciitilde", "~"),
    ("quoteleft", "\u{2018}"),
    ("quoteright", "\u{2019}"),
    ("quotedblleft", "\u{201C}"),
    ("quotedblright", "\u{201D}"),
    ("endash", "\u{2013}"),
    ("emdash", "\u{2014}"),
    ("bullet", "\u{2022}"),
    ("ellipsis", "\u{2026}"),
    ("dagger", "\u{2020}"),
    ("daggerdbl", "\u{2021}"),
    ("section", "\u{00A7}"),
    ("paragraph", "\u{00B6}"),
    ("degree", "\u{00B0}"),
    ("copyright", "\u{00A9}"),
    ("registered", "\u{00AE}"),
    ("trademark", "\u{2122}"),
    ("minus", "\u{2212}"),
    ("multiply", "\u{00D7}"),
    ("divide", "\u{00F7}"),
    ("fi", "fi"),
    ("fl", "fl"),
    ("ff", "ff"),
    ("ffi", "ffi"),
    ("ffl", "ffl"),
    ("germandbls", "\u{00DF}"),
    ("eacute", "\u{00E9}"),
    ("egrave", "\u{00E8}"),
    ("aacute", "\u{00E1}"),
    ("agrave", "\u{00E0}"),
    ("udieresis", "\u{00FC}"),
    ("odieresis", "\u{00F6}"),
    ("adieresis", "\u{00E4}"),
    ("ccedilla", "\u{00E7}"),
];

fn simple_widths(doc: &PdfDocument, font: &Dictionary) -> Widths {
    // Type3 widths are in glyph space; scale them to thousandths of an em.
    let scale = match get(doc, font, b"FontMatrix") {
        Some(Object::Array(matrix)) if is_type3(font) => matrix
            .first()
            .and_then(|m| resolve(doc, m))
            .and_then(number)
            .map_or(1.0, |m| m * 1000.0),
        _ => 1.0,
    };
    let first_char = get_number(doc, font, b"FirstChar").unwrap_or(0.0).max(0.0) as u32;
    let widths = match get(doc, font, b"Widths") {
        Some(Object::Array(items)) => items
            .iter()
            .map(|w| resolve(doc, w).and_then(number).unwrap_or(0.0) * scale)
            .collect(),
        _ => Vec::new(),
    };
    let missing = match get(doc, font, b"FontDescriptor") {
        Some(Object::Dictionary(descriptor)) => get_number(doc, descriptor, b"MissingWidth"),
        _ => None,
    }
    .map_or(DEFAULT_GLYPH_WIDTH, |w| w * scale);

    Widths::Simple {
        first_char,
        widths,
        missing,
    }
}

fn is_type3(font: &Dictionary) -> bool {
    matches!(font.get(b"Subtype").and_then(Object::as_name), Ok(b"Type3"))
}

fn cid_widths(doc: &PdfDocument, font: &Dictionary) -> Widths {
    let descendant = match get(doc, font, b"DescendantFonts") {
        Some(Object::Array(fonts)) => fonts.first().and_then(|f| resolve(doc, f)),
        _ => None,
    };
    let Some(Object::Dictionary(cid_font)) = descendant else {
        return Widths::Cid {
            ranges: Vec::new(),
            default: DEFAULT_CID_WIDTH,
        };
    };

    let default = get_number(doc, cid_font, b"DW").unwrap_or(DEFAULT_CID_WIDTH);
    let mut ranges = Vec::new();
    if let Some(Object::Array(items)) = get(doc, cid_font, b"W") {
        // Entries are `c [w1 w2 …]` or `c_first c_last w`.
        let item = |i: usize| items.get(i).and_then(|o| resolve(doc, o));
        let mut i = 0;
        while let Some(first) = item(i).and_then(number) {
            let first = first.max(0.0) as u32;
            match item(i + 1) {
                Some(Object::Array(widths)) => {
                    for (offset, w) in widths.iter().enumerate() {
                        if let Some(w) = resolve(doc, w).and_then(number) {
                            let code = first + offset as u32;
                            ranges.push((code, code, w));
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let (Some(last), Some(w)) = (number(last), item(i + 2).and_then(number)) else {
                        break;
                    };
                    ranges.push((first, last.max(0.0) as u32, w));
                    i += 3;
                }
                None => break,
            }
        }
    }
    Widths::Cid { ranges, default }
}
