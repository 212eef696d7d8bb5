//! Parallel PDF page extraction.
//!
//! The driver fans per-page extraction out over a fixed worker pool, one
//! engine handle per task, and streams results back to a consumer callback
//! in ascending page order. Concurrency is invisible to the consumer.

pub mod pool;
pub mod reader;
#[cfg(feature = "pdfium")]
mod reader_pdfium;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use pool::{PoolError, TaskError, TaskHandle, WorkerPool};
pub use reader::{
    default_backend, BBox, BlockType, ExtractOptions, FontInfo, PageContent, PageReader,
    PdfBackend, TextBlock, TextChar, TextLine,
};

/// Extraction-side error taxonomy.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("input not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("document cannot be opened: {reason}")]
    PdfCorrupt { reason: String },
    #[error("page index {index} outside 0..{page_count}")]
    OutOfRange { index: usize, page_count: usize },
    #[error("worker pool is stopped")]
    PoolStopped,
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Immutable per-run parser configuration.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Worker threads; 0 selects hardware parallelism.
    pub thread_count: usize,
    /// Pages grouped per dispatch round.
    pub batch_size: usize,
    pub extract_positions: bool,
    pub extract_fonts: bool,
    pub extract_colors: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            thread_count: 0,
            batch_size: 10,
            extract_positions: true,
            extract_fonts: true,
            extract_colors: false,
        }
    }
}

impl ParseOptions {
    fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            extract_positions: self.extract_positions,
            extract_fonts: self.extract_fonts,
            extract_colors: self.extract_colors,
        }
    }
}

/// Outcome of extracting one page: content, or the reason it failed.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Content(PageContent),
    Failed(String),
}

/// Per-page result delivered to streaming consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// 0-based page index.
    pub page_number: usize,
    pub outcome: PageOutcome,
}

impl PageResult {
    pub fn success(&self) -> bool {
        matches!(self.outcome, PageOutcome::Content(_))
    }

    pub fn content(&self) -> Option<&PageContent> {
        match &self.outcome {
            PageOutcome::Content(content) => Some(content),
            PageOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            PageOutcome::Content(_) => None,
            PageOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// Aggregate counters over the parser's lifetime, with throughput figures
/// derived at read time.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ParserStats {
    pub documents_processed: u64,
    pub pages_processed: u64,
    pub total_processing_time_ms: u64,
    pub pages_per_second: f64,
    pub average_processing_time_ms: f64,
}

#[derive(Default)]
struct StatCounters {
    documents: AtomicU64,
    pages: AtomicU64,
    total_ms: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> ParserStats {
        let documents = self.documents.load(Ordering::Relaxed);
        let pages = self.pages.load(Ordering::Relaxed);
        let total_ms = self.total_ms.load(Ordering::Relaxed);

        let pages_per_second = if total_ms > 0 {
            pages as f64 / (total_ms as f64 / 1000.0)
        } else {
            0.0
        };
        let average_processing_time_ms = if documents > 0 {
            total_ms as f64 / documents as f64
        } else {
            0.0
        };

        ParserStats {
            documents_processed: documents,
            pages_processed: pages,
            total_processing_time_ms: total_ms,
            pages_per_second,
            average_processing_time_ms,
        }
    }
}

/// Progress callback for batch parsing: (completed, total).
pub type ProgressCallback = std::sync::Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Parallel, streaming PDF parser.
pub struct PdfParser {
    options: ParseOptions,
    pool: WorkerPool,
    stats: StatCounters,
}

impl PdfParser {
    pub fn new(options: ParseOptions) -> Self {
        PdfParser {
            pool: WorkerPool::new(options.thread_count),
            options,
            stats: StatCounters::default(),
        }
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Stream per-page results to `consumer` in ascending page order.
    ///
    /// Pages are dispatched in batches of `batch_size`; every task opens its
    /// own [`PageReader`]. The consumer returns `false` to stop: no further
    /// batches are dispatched, in-flight tasks are still awaited, and
    /// results past the stop point are discarded. Returns the document's
    /// page count.
    pub fn parse_streaming<F>(&self, path: &Path, mut consumer: F) -> Result<usize, ParseError>
    where
        F: FnMut(PageResult) -> bool,
    {
        let started = Instant::now();
        let page_count = PageReader::open(path)?.page_count();
        info!(path = %path.display(), pages = page_count, "streaming parse started");

        let extract = self.options.extract_options();
        let batch_size = self.options.batch_size.max(1);
        let path_buf = path.to_path_buf();
        let mut stopped = false;

        let mut batch_start = 0usize;
        while batch_start < page_count && !stopped {
            let batch_end = (batch_start + batch_size).min(page_count);

            let mut handles = Vec::with_capacity(batch_end - batch_start);
            for page_idx in batch_start..batch_end {
                let task_path = path_buf.clone();
                let handle = self
                    .pool
                    .submit(move || extract_single_page(&task_path, page_idx, &extract))
                    .map_err(|_| ParseError::PoolStopped)?;
                handles.push((page_idx, handle));
            }

            // Wait for the whole batch, then deliver in page order. Tasks
            // were submitted in ascending order, so joining in submission
            // order already yields a sorted batch; the explicit sort keeps
            // the ordering guarantee independent of scheduling.
            let mut results: Vec<PageResult> = handles
                .into_iter()
                .map(|(page_idx, handle)| match handle.join() {
                    Ok(result) => result,
                    Err(err) => PageResult {
                        page_number: page_idx,
                        outcome: PageOutcome::Failed(err.to_string()),
                    },
                })
                .collect();
            results.sort_by_key(|r| r.page_number);

            for result in results {
                if stopped {
                    break;
                }
                self.stats.pages.fetch_add(1, Ordering::Relaxed);
                if !consumer(result) {
                    debug!("consumer requested early termination");
                    stopped = true;
                }
            }

            batch_start = batch_end;
        }

        self.stats.documents.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_ms
            .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);

        Ok(page_count)
    }

    /// Extract every page of one document sequentially on the calling
    /// thread. Pages that fail to parse are recorded as failed results;
    /// the operation aborts only for document-level errors.
    pub fn parse_document(&self, path: &Path) -> Result<Vec<PageResult>, ParseError> {
        let started = Instant::now();
        let results = extract_whole_document(path, &self.options.extract_options())?;

        self.stats.documents.fetch_add(1, Ordering::Relaxed);
        self.stats
            .pages
            .fetch_add(results.len() as u64, Ordering::Relaxed);
        self.stats
            .total_ms
            .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);

        Ok(results)
    }

    /// Parse several documents concurrently, one pool task per document.
    /// Results come back in input order; per-document failures are captured
    /// in the corresponding slot. `progress` observes completions.
    pub fn parse_batch(
        &self,
        paths: &[PathBuf],
        progress: Option<ProgressCallback>,
    ) -> Vec<Result<Vec<PageResult>, ParseError>> {
        let started = Instant::now();
        let total = paths.len();
        let completed = std::sync::Arc::new(AtomicU64::new(0));
        let extract = self.options.extract_options();

        let handles: Vec<_> = paths
            .iter()
            .map(|path| {
                let task_path = path.clone();
                let progress = progress.clone();
                let completed = std::sync::Arc::clone(&completed);
                self.pool.submit(move || {
                    let result = extract_whole_document(&task_path, &extract);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = progress {
                        callback(done as usize, total);
                    }
                    result
                })
            })
            .collect();

        let mut results = Vec::with_capacity(total);
        for handle in handles {
            match handle {
                Ok(handle) => match handle.join() {
                    Ok(result) => {
                        if let Ok(pages) = &result {
                            self.stats
                                .pages
                                .fetch_add(pages.len() as u64, Ordering::Relaxed);
                        }
                        self.stats.documents.fetch_add(1, Ordering::Relaxed);
                        results.push(result);
                    }
                    Err(err) => results.push(Err(ParseError::Internal {
                        message: err.to_string(),
                    })),
                },
                Err(_) => results.push(Err(ParseError::PoolStopped)),
            }
        }

        self.stats
            .total_ms
            .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);
        results
    }

    /// Snapshot of the aggregate counters.
    pub fn get_stats(&self) -> ParserStats {
        self.stats.snapshot()
    }

    /// Current depth of the worker queue.
    pub fn queue_len(&self) -> usize {
        self.pool.queue_len()
    }

    /// Tasks currently running on workers.
    pub fn active_tasks(&self) -> usize {
        self.pool.active_tasks()
    }
}

fn extract_single_page(path: &Path, index: usize, options: &ExtractOptions) -> PageResult {
    let outcome = match PageReader::open(path).and_then(|reader| reader.extract_page(index, options))
    {
        Ok(content) => PageOutcome::Content(content),
        Err(err) => {
            warn!(page = index, error = %err, "page extraction failed");
            PageOutcome::Failed(err.to_string())
        }
    };
    PageResult {
        page_number: index,
        outcome,
    }
}

fn extract_whole_document(
    path: &Path,
    options: &ExtractOptions,
) -> Result<Vec<PageResult>, ParseError> {
    let reader = PageReader::open(path)?;
    let page_count = reader.page_count();

    let mut results = Vec::with_capacity(page_count);
    for index in 0..page_count {
        let outcome = match reader.extract_page(index, options) {
            Ok(content) => PageOutcome::Content(content),
            Err(err) => {
                warn!(page = index, error = %err, "page extraction failed");
                PageOutcome::Failed(err.to_string())
            }
        };
        results.push(PageResult {
            page_number: index,
            outcome,
        });
    }
    Ok(results)
}
