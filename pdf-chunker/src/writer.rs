//! Chunk record emission: map pipeline chunks onto the docling-compatible
//! JSON schema and write them to disk.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use chunk_model::{ChunkMeta, ChunkRecord, DocOrigin, SCHEMA_NAME, SCHEMA_VERSION};

use crate::{Chunk, ChunkError};

/// Deterministic 64-bit digest of the source bytes (SHA-256 truncated).
pub fn binary_hash(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    u64::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}

/// Build output records for `chunks` cut from the document at `source`.
pub fn to_records(chunks: &[Chunk], source: &Path) -> Result<Vec<ChunkRecord>, ChunkError> {
    let bytes = fs::read(source).map_err(|err| ChunkError::Io {
        path: source.to_path_buf(),
        source: err,
    })?;
    let hash = binary_hash(&bytes);
    let filename = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extracted_at = chrono::Utc::now().to_rfc3339();
    let total_chunks = chunks.len();

    let records = chunks
        .iter()
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let start_page = chunk.start_page.unwrap_or(0);
            let end_page = chunk.end_page.unwrap_or(start_page);
            ChunkRecord {
                text: chunk.text.clone(),
                meta: ChunkMeta {
                    schema_name: SCHEMA_NAME.into(),
                    version: SCHEMA_VERSION.into(),
                    start_page,
                    end_page,
                    page_count: end_page - start_page + 1,
                    chunk_index,
                    total_chunks,
                    token_count: chunk.tokens,
                    has_major_heading: chunk.has_major_heading,
                    min_heading_level: chunk.min_heading_level,
                    overlap_tokens: (chunk.overlap_tokens > 0).then_some(chunk.overlap_tokens),
                    origin: DocOrigin {
                        mimetype: "application/pdf".into(),
                        binary_hash: hash,
                        filename: filename.clone(),
                        uri: None,
                    },
                    extracted_at: extracted_at.clone(),
                    doc_items: Vec::new(),
                    headings: Vec::new(),
                    captions: None,
                },
            }
        })
        .collect();

    Ok(records)
}

/// Serialize `chunks` as a pretty-printed JSON array at `output`.
pub fn write_chunks_json(chunks: &[Chunk], source: &Path, output: &Path) -> Result<(), ChunkError> {
    let records = to_records(chunks, source)?;
    let json = serde_json::to_string_pretty(&records)?;
    fs::write(output, json).map_err(|err| ChunkError::Io {
        path: output.to_path_buf(),
        source: err,
    })?;
    debug!(records = records.len(), output = %output.display(), "chunks written");
    Ok(())
}
