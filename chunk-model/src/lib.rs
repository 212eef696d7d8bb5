//! Shared, lightweight chunk record schema and helpers.
//!
//! One JSON record = one retrieval chunk: the chunk text plus a metadata
//! object compatible with the docling chunker format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema label carried by every emitted record.
pub const SCHEMA_NAME: &str = "docling_core.transforms.chunker.DocMeta";
/// Schema version (major bumps are breaking).
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Sentinel heading level meaning "no heading observed".
pub const NO_HEADING_LEVEL: u32 = 999;

/// Provenance of the source document a chunk was cut from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocOrigin {
    /// MIME type of the source (e.g., "application/pdf").
    pub mimetype: String,
    /// Deterministic 64-bit digest of the source file bytes.
    pub binary_hash: u64,
    /// Source file name without directories.
    pub filename: String,
    /// Source URI when known; serialized as null otherwise.
    pub uri: Option<String>,
}

/// Per-chunk metadata emitted next to the chunk text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub schema_name: String,
    pub version: String,
    /// First page (0-based) the chunk draws text from.
    pub start_page: usize,
    /// Last page (0-based) the chunk draws text from.
    pub end_page: usize,
    pub page_count: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Token count of the chunk text, recomputed after the final pass.
    pub token_count: usize,
    pub has_major_heading: bool,
    pub min_heading_level: u32,
    /// Present only when an overlap excerpt was attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_tokens: Option<usize>,
    pub origin: DocOrigin,
    /// Extraction timestamp in ISO 8601 (UTC).
    pub extracted_at: String,
    /// Kept empty for downstream-format compatibility.
    pub doc_items: Vec<Value>,
    pub headings: Vec<String>,
    pub captions: Option<Vec<String>>,
}

/// One output record = one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Searchable text body.
    pub text: String,
    pub meta: ChunkMeta,
}

impl ChunkRecord {
    /// Soft validation suitable for ingestion.
    pub fn validate_soft(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("text is empty".into());
        }
        if self.meta.start_page > self.meta.end_page {
            return Err(format!(
                "page range inverted: {}..{}",
                self.meta.start_page, self.meta.end_page
            ));
        }
        Ok(())
    }
}
