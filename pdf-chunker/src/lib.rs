//! Hierarchical PDF chunking.
//!
//! Extracts page text in parallel, then rewrites the flat line stream into
//! structure-respecting chunks that honor a hard upper and a soft lower
//! token bound:
//!
//! 1. annotate lines (heading / list / code / blank detection)
//! 2. fold lines into heading-delimited semantic units
//! 3. greedy-pack units into chunks under the upper bound
//! 4. merge undersized chunks (with a heading veto)
//! 5. split oversized chunks at the coarsest boundary available
//! 6. strict final merge, recount, hard-bound backstop
//! 7. attach overlap excerpts
//!
//! All sizes are measured with the embedded greedy tokenizer, so the
//! bounds are defined relative to that tokenizer.

pub mod annotate;
pub mod passes;
pub mod units;
pub mod writer;

use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use chunk_model::NO_HEADING_LEVEL;
use pdf_extractor::{PageOutcome, ParseOptions, PdfParser};
use tiktoken_lite::Tokenizer;

/// Chunking configuration.
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    /// Hard upper bound on a chunk's token count.
    pub max_tokens: usize,
    /// Soft lower bound; undersized chunks survive only when no legal
    /// merge exists.
    pub min_tokens: usize,
    /// Size of the tail excerpt attached to each non-first chunk.
    pub overlap_tokens: usize,
    /// Extraction worker threads; 0 selects hardware parallelism.
    pub thread_count: usize,
    /// Pages per extraction dispatch round.
    pub batch_size: usize,
    /// Enable the soft heading heuristics (numbered / all-caps lines).
    pub detect_soft_headings: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            min_tokens: 150,
            overlap_tokens: 0,
            thread_count: 0,
            batch_size: 10,
            detect_soft_headings: false,
        }
    }
}

impl ChunkOptions {
    /// Check invariants: `max >= 1`, `min <= max`, `overlap < max`.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.max_tokens == 0 {
            return Err(ChunkError::InvalidArgument {
                message: "max_tokens must be at least 1".into(),
            });
        }
        if self.min_tokens > self.max_tokens {
            return Err(ChunkError::InvalidArgument {
                message: format!(
                    "min_tokens ({}) must not exceed max_tokens ({})",
                    self.min_tokens, self.max_tokens
                ),
            });
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(ChunkError::InvalidArgument {
                message: format!(
                    "overlap_tokens ({}) must be smaller than max_tokens ({})",
                    self.overlap_tokens, self.max_tokens
                ),
            });
        }
        Ok(())
    }
}

/// Chunking-side error taxonomy.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("invalid option: {message}")]
    InvalidArgument { message: String },
    #[error(transparent)]
    Parse(#[from] pdf_extractor::ParseError),
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One output chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Concatenated source lines, each terminated by `\n`.
    pub text: String,
    pub tokens: usize,
    /// 0-based page range; `None` only for chunks built from pageless text.
    pub start_page: Option<usize>,
    pub end_page: Option<usize>,
    /// Tail excerpt of the previous chunk; empty for the first chunk.
    pub overlap_text: String,
    pub overlap_tokens: usize,
    pub has_major_heading: bool,
    pub min_heading_level: u32,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk {
            text: String::new(),
            tokens: 0,
            start_page: None,
            end_page: None,
            overlap_text: String::new(),
            overlap_tokens: 0,
            has_major_heading: false,
            min_heading_level: NO_HEADING_LEVEL,
        }
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of chunking one document.
#[derive(Debug, Clone, Default)]
pub struct ChunkingResult {
    pub chunks: Vec<Chunk>,
    /// Pages actually processed (respects the page limit).
    pub total_pages: usize,
    pub total_chunks: usize,
    pub processing_time_ms: f64,
    /// Document-level failure, if any; page-level failures are logged and
    /// skipped instead.
    pub error: Option<String>,
}

/// The chunking pipeline, configured once per run.
pub struct HierarchicalChunker {
    options: ChunkOptions,
    tokenizer: Tokenizer,
}

impl HierarchicalChunker {
    pub fn new(options: ChunkOptions) -> Result<Self, ChunkError> {
        options.validate()?;
        Ok(HierarchicalChunker {
            options,
            tokenizer: Tokenizer::new(),
        })
    }

    pub fn options(&self) -> ChunkOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ChunkOptions) -> Result<(), ChunkError> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    /// Run the pure pipeline over pre-extracted `(text, page_number)` pages.
    pub fn chunk_pages(&self, pages: &[(String, usize)]) -> Vec<Chunk> {
        let opts = &self.options;

        let non_empty: Vec<(String, usize)> = pages
            .iter()
            .filter(|(text, _)| !text.is_empty())
            .cloned()
            .collect();
        if non_empty.is_empty() {
            return Vec::new();
        }

        let lines =
            annotate::annotate_pages(&non_empty, opts.detect_soft_headings, &self.tokenizer);
        let units = units::group_units(&lines);
        debug!(lines = lines.len(), units = units.len(), "pipeline input");

        let chunks = passes::assemble_chunks(&units, opts.max_tokens);
        let chunks = passes::merge_undersized(chunks, opts.min_tokens, opts.max_tokens);
        let chunks = passes::split_oversized(chunks, opts.max_tokens, &self.tokenizer);
        let mut chunks = passes::final_merge(chunks, opts.min_tokens, opts.max_tokens);
        passes::recount(&mut chunks, &self.tokenizer);
        let mut chunks = passes::enforce_upper_bound(chunks, opts.max_tokens, &self.tokenizer);
        passes::attach_overlap(&mut chunks, opts.overlap_tokens, &self.tokenizer);

        chunks
    }

    /// Chunk a PDF file. `page_limit <= 0` means no limit.
    pub fn chunk_file(&self, path: &Path, page_limit: i64) -> ChunkingResult {
        let started = Instant::now();

        match self.collect_pages(path, page_limit) {
            Ok(pages) => {
                let total_pages = pages.len();
                let chunks = self.chunk_pages(&pages);
                info!(
                    pages = total_pages,
                    chunks = chunks.len(),
                    "chunking finished"
                );
                ChunkingResult {
                    total_chunks: chunks.len(),
                    total_pages,
                    processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                    chunks,
                    error: None,
                }
            }
            Err(err) => ChunkingResult {
                processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                error: Some(err.to_string()),
                ..ChunkingResult::default()
            },
        }
    }

    /// Chunk a PDF and write the JSON records to `output`.
    pub fn chunk_to_file(
        &self,
        input: &Path,
        output: &Path,
        page_limit: i64,
    ) -> Result<(), ChunkError> {
        let pages = self.collect_pages(input, page_limit)?;
        let chunks = self.chunk_pages(&pages);
        writer::write_chunks_json(&chunks, input, output)
    }

    fn collect_pages(
        &self,
        path: &Path,
        page_limit: i64,
    ) -> Result<Vec<(String, usize)>, ChunkError> {
        let parser = PdfParser::new(ParseOptions {
            thread_count: self.options.thread_count,
            batch_size: self.options.batch_size,
            extract_positions: false,
            extract_fonts: false,
            extract_colors: false,
        });

        let limit = if page_limit > 0 {
            Some(page_limit as usize)
        } else {
            None
        };

        let mut pages: Vec<(String, usize)> = Vec::new();
        parser.parse_streaming(path, |result| {
            match result.outcome {
                PageOutcome::Content(content) => {
                    pages.push((content.plain_text(), result.page_number));
                }
                PageOutcome::Failed(reason) => {
                    warn!(page = result.page_number, %reason, "skipping failed page");
                }
            }
            match limit {
                Some(limit) => pages.len() < limit,
                None => true,
            }
        })?;

        Ok(pages)
    }
}
