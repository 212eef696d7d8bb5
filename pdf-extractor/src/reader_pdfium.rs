//! Pdfium-backed page reader. Behind feature `pdfium`.
//!
//! Pdfium is not reentrant; each reader owns its own library binding and
//! opens the document per call, so nothing engine-side is ever shared
//! across threads.

#![cfg(feature = "pdfium")]

use std::path::{Path, PathBuf};

use pdfium_render::prelude::*;

use crate::reader::{content_from_text, ExtractOptions, PageContent};
use crate::ParseError;

fn bind_pdfium() -> Result<Box<dyn PdfiumLibraryBindings>, ParseError> {
    // Prefer an explicit DLL path, then a directory, then the system library.
    if let Ok(path) = std::env::var("PDFIUM_DLL_PATH") {
        let pb = PathBuf::from(path);
        let lib_path = if pb.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&pb)
        } else {
            pb
        };
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            return Ok(bindings);
        }
    }
    if let Ok(dir) = std::env::var("PDFIUM_DIR") {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&PathBuf::from(dir));
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            return Ok(bindings);
        }
    }
    Pdfium::bind_to_system_library().map_err(|err| ParseError::Internal {
        message: format!("failed to bind pdfium: {err}"),
    })
}

pub(crate) struct PdfiumReader {
    path: PathBuf,
    page_count: usize,
}

impl PdfiumReader {
    pub(crate) fn open(path: &Path) -> Result<Self, ParseError> {
        let pdfium = Pdfium::new(bind_pdfium()?);
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|err| ParseError::PdfCorrupt {
                reason: err.to_string(),
            })?;
        let page_count = document.pages().len() as usize;
        Ok(PdfiumReader {
            path: path.to_path_buf(),
            page_count,
        })
    }

    pub(crate) fn page_count(&self) -> usize {
        self.page_count
    }

    pub(crate) fn extract_page(
        &self,
        index: usize,
        options: &ExtractOptions,
    ) -> Result<PageContent, ParseError> {
        if index >= self.page_count {
            return Err(ParseError::OutOfRange {
                index,
                page_count: self.page_count,
            });
        }
        let pdfium = Pdfium::new(bind_pdfium()?);
        let document = self
            .pdfium_document(&pdfium)?;
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|err| ParseError::PdfCorrupt {
                reason: err.to_string(),
            })?;
        let text = page
            .text()
            .map(|t| t.all())
            .map_err(|err| ParseError::PdfCorrupt {
                reason: err.to_string(),
            })?;
        Ok(content_from_text(&text, options))
    }

    fn pdfium_document<'a>(&self, pdfium: &'a Pdfium) -> Result<PdfDocument<'a>, ParseError> {
        pdfium
            .load_pdf_from_file(&self.path, None)
            .map_err(|err| ParseError::PdfCorrupt {
                reason: err.to_string(),
            })
    }
}
