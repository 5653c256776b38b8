use super::{EngineId, PageExtraction, PdfDocument, PdfEngine};
use crate::error::IngestError;
use crate::models::Metadata;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const ENGINE: &str = "pdftotext";
const FORM_FEED: char = '\x0c';

#[derive(Debug, Clone)]
pub struct PdftotextEngine {
    binary: PathBuf,
}

impl Default for PdftotextEngine {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("pdftotext"),
        }
    }
}

impl PdftotextEngine {
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|output| output.status.success() || !output.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl PdfEngine for PdftotextEngine {
    fn id(&self) -> EngineId {
        EngineId::Pdftotext
    }

    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, IngestError> {
        let output = run(&self.binary, &["-layout"], path).map_err(|details| IngestError::EngineOpen {
            engine: ENGINE,
            path: path.to_path_buf(),
            details,
        })?;

        Ok(Box::new(PdftotextDocument {
            binary: self.binary.clone(),
            path: path.to_path_buf(),
            pages: split_pages(&output),
        }))
    }
}

struct PdftotextDocument {
    binary: PathBuf,
    path: PathBuf,
    pages: Vec<String>,
}

impl PdfDocument for PdftotextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn extract_page(&mut self, index: usize) -> Result<PageExtraction, IngestError> {
        let page_number = index + 1;
        let layout = self.pages.get(index).ok_or_else(|| IngestError::PageExtraction {
            page_number,
            details: format!("page index out of range (document has {} pages)", self.pages.len()),
        })?;

        if !layout.trim().is_empty() {
            return Ok(PageExtraction {
                text: layout.clone(),
                metadata: Metadata::new(),
            });
        }

        // Layout mode can drop text in multi-column pages; raw mode keeps
        // content-stream order.
        debug!(page = page_number, "layout text empty, retrying in raw mode");
        let page = page_number.to_string();
        let raw = run(&self.binary, &["-raw", "-f", &page, "-l", &page], &self.path)
            .map_err(|details| IngestError::PageExtraction {
                page_number,
                details,
            })?;

        Ok(PageExtraction {
            text: raw.trim_end_matches(FORM_FEED).to_string(),
            metadata: Metadata::new(),
        })
    }

    fn close(self: Box<Self>) -> Result<(), IngestError> {
        Ok(())
    }
}

fn run(binary: &Path, args: &[&str], path: &Path) -> Result<String, String> {
    let output = Command::new(binary)
        .args(args)
        .arg(path)
        .arg("-")
        .output()
        .map_err(|error| format!("failed to spawn {}: {error}", binary.display()))?;

    if !output.status.success() {
        return Err(format!(
            "exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// pdftotext terminates every page with a form feed.
fn split_pages(output: &str) -> Vec<String> {
    let mut pages: Vec<String> = output.split(FORM_FEED).map(str::to_string).collect();
    if pages.last().is_some_and(|last| last.trim().is_empty()) {
        pages.pop();
    }
    pages
}
