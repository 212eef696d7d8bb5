//! Per-page text extraction.
//!
//! A [`PageReader`] owns a single, thread-private handle to the underlying
//! PDF engine. Readers are never shared across threads: callers that want
//! parallel extraction construct one reader per worker task. The default
//! backend is the pure-Rust `lopdf` engine; a Pdfium-backed reader is
//! available behind the `pdfium` feature.

use std::path::Path;

use lopdf::Document;
use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Selects which per-glyph detail is materialized in [`PageContent`].
///
/// The chunking pipeline consumes only line text and runs with everything
/// disabled; glyph geometry and font detail are populated by the Pdfium
/// backend when requested.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub extract_positions: bool,
    pub extract_fonts: bool,
    pub extract_colors: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            extract_positions: true,
            extract_fonts: true,
            extract_colors: false,
        }
    }
}

/// Available extraction engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfBackend {
    Lopdf,
    #[cfg(feature = "pdfium")]
    Pdfium,
}

/// Backend used by [`PageReader::open`]. The `PDF_BACKEND=pdfium`
/// environment variable selects Pdfium when the feature is compiled in.
pub fn default_backend() -> PdfBackend {
    #[cfg(feature = "pdfium")]
    if std::env::var("PDF_BACKEND").as_deref() == Ok("pdfium") {
        return PdfBackend::Pdfium;
    }
    PdfBackend::Lopdf
}

/// Axis-aligned bounding box in page points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Font description attached to a glyph when font extraction is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontInfo {
    pub name: String,
    pub is_bold: bool,
    pub is_italic: bool,
    pub is_monospace: bool,
}

/// One extracted glyph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChar {
    #[serde(rename = "char")]
    pub glyph: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<FontInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
}

/// One extracted line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    pub chars: Vec<TextChar>,
}

/// Structural kind of a block. Only text blocks are extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
}

/// One extracted block: a run of lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    pub lines: Vec<TextLine>,
}

/// Structured text of a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub blocks: Vec<TextBlock>,
}

impl PageContent {
    /// Plain text view: line texts joined with `\n` within a block and
    /// `\n` between blocks.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            for line in &block.lines {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&line.text);
            }
        }
        out
    }
}

#[derive(Debug)]
enum ReaderBackend {
    Lopdf {
        doc: Document,
        // lopdf page numbers (1-based) in document order
        pages: Vec<u32>,
    },
    #[cfg(feature = "pdfium")]
    Pdfium(crate::reader_pdfium::PdfiumReader),
}

/// A thread-private handle onto one opened PDF document.
#[derive(Debug)]
pub struct PageReader {
    backend: ReaderBackend,
}

impl PageReader {
    /// Open `path` with the default backend.
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        Self::open_with(path, default_backend())
    }

    /// Open `path` with an explicit backend.
    pub fn open_with(path: &Path, backend: PdfBackend) -> Result<Self, ParseError> {
        if !path.exists() {
            return Err(ParseError::NotFound {
                path: path.to_path_buf(),
            });
        }
        match backend {
            PdfBackend::Lopdf => {
                let doc = Document::load(path).map_err(|err| ParseError::PdfCorrupt {
                    reason: err.to_string(),
                })?;
                let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
                Ok(PageReader {
                    backend: ReaderBackend::Lopdf { doc, pages },
                })
            }
            #[cfg(feature = "pdfium")]
            PdfBackend::Pdfium => Ok(PageReader {
                backend: ReaderBackend::Pdfium(crate::reader_pdfium::PdfiumReader::open(path)?),
            }),
        }
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        match &self.backend {
            ReaderBackend::Lopdf { pages, .. } => pages.len(),
            #[cfg(feature = "pdfium")]
            ReaderBackend::Pdfium(reader) => reader.page_count(),
        }
    }

    /// Extract the structured text of one page (0-based index).
    pub fn extract_page(
        &self,
        index: usize,
        options: &ExtractOptions,
    ) -> Result<PageContent, ParseError> {
        match &self.backend {
            ReaderBackend::Lopdf { doc, pages } => {
                let page_number = *pages.get(index).ok_or(ParseError::OutOfRange {
                    index,
                    page_count: pages.len(),
                })?;
                let raw = doc
                    .extract_text(&[page_number])
                    .map_err(|err| ParseError::PdfCorrupt {
                        reason: err.to_string(),
                    })?;
                Ok(content_from_text(&raw, options))
            }
            #[cfg(feature = "pdfium")]
            ReaderBackend::Pdfium(reader) => reader.extract_page(index, options),
        }
    }
}

/// Build the structured-text tree from a page's raw text: one block per
/// page, one line per newline-delimited run.
pub(crate) fn content_from_text(raw: &str, options: &ExtractOptions) -> PageContent {
    let normalized = raw.replace('\r', "");
    let mut lines: Vec<&str> = normalized.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    let want_chars = options.extract_positions || options.extract_fonts || options.extract_colors;
    let lines = lines
        .into_iter()
        .map(|text| TextLine {
            text: text.to_string(),
            bbox: None,
            chars: if want_chars {
                text.chars()
                    .map(|c| TextChar {
                        glyph: c.to_string(),
                        bbox: None,
                        origin_x: None,
                        origin_y: None,
                        font: None,
                        size: None,
                    })
                    .collect()
            } else {
                Vec::new()
            },
        })
        .collect();

    PageContent {
        blocks: vec![TextBlock {
            block_type: BlockType::Text,
            bbox: None,
            lines,
        }],
    }
}
