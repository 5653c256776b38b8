use super::{EngineId, PageExtraction, PdfDocument, PdfEngine};
use crate::error::IngestError;
use crate::models::Metadata;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::debug;

const ENGINE: &str = "pdf-extract";

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractEngine;

impl PdfEngine for PdfExtractEngine {
    fn id(&self) -> EngineId {
        EngineId::PdfExtract
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, IngestError> {
        let open_error = |details: String| IngestError::EngineOpen {
            engine: ENGINE,
            path: path.to_path_buf(),
            details,
        };

        let bytes = std::fs::read(path).map_err(|error| open_error(error.to_string()))?;

        // pdf-extract panics on some malformed font tables.
        let pages = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        }))
        .map_err(|_| open_error("extractor panicked while parsing the document".to_string()))?
        .map_err(|error| open_error(error.to_string()))?;

        Ok(Box::new(PdfExtractDocument {
            bytes,
            pages,
            fallback: None,
            path: path.to_path_buf(),
        }))
    }
}

struct PdfExtractDocument {
    bytes: Vec<u8>,
    pages: Vec<String>,
    fallback: Option<lopdf::Document>,
    path: PathBuf,
}

impl PdfExtractDocument {
    fn fallback_text(&mut self, page_number: usize) -> Result<String, IngestError> {
        let page_error = |details: String| IngestError::PageExtraction {
            page_number,
            details,
        };

        if self.fallback.is_none() {
            let document = lopdf::Document::load_mem(&self.bytes).map_err(|error| page_error(error.to_string()))?;
            self.fallback = Some(document);
        }

        match &self.fallback {
            Some(document) => document
                .extract_text(&[page_number as u32])
                .map_err(|error| page_error(error.to_string())),
            None => Ok(String::new()),
        }
    }
}

impl PdfDocument for PdfExtractDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn extract_page(&mut self, index: usize) -> Result<PageExtraction, IngestError> {
        let page_number = index + 1;
        let text = self.pages.get(index).cloned().ok_or_else(|| IngestError::PageExtraction {
            page_number,
            details: format!("page index out of range (document has {} pages)", self.pages.len()),
        })?;

        let text = if text.trim().is_empty() {
            debug!(page = page_number, path = %self.path.display(), "pdf-extract page blank, trying font-aware fallback");
            self.fallback_text(page_number)?
        } else {
            text
        };

        Ok(PageExtraction {
            text,
            metadata: Metadata::new(),
        })
    }

    fn close(self: Box<Self>) -> Result<(), IngestError> {
        Ok(())
    }
}
