use crate::chunking::RecursiveSplitter;
use crate::error::IngestError;
use crate::models::{Chunk, ContentSelectors, ExtractionRequest, PageWarning};
use crate::orchestrator::PdfPipeline;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub chunks: Vec<Chunk>,
    pub skipped_files: Vec<SkippedPdf>,
    pub page_warnings: Vec<PageWarning>,
}

pub fn ingest_paths_best_effort(
    pipeline: &PdfPipeline,
    splitter: &RecursiveSplitter,
    paths: &[PathBuf],
    selectors: Option<&ContentSelectors>,
    max_pages: Option<usize>,
) -> IngestionReport {
    let mut report = IngestionReport::default();

    for path in paths {
        let mut request = ExtractionRequest::new(path.clone());
        if let Some(selectors) = selectors {
            request = request.with_selectors(selectors.clone());
        }
        if let Some(max_pages) = max_pages {
            request = request.with_max_pages(max_pages);
        }

        match pipeline.process_with_report(&request) {
            Ok(extraction) => {
                report.chunks.extend(splitter.split(&extraction.units));
                report.page_warnings.extend(extraction.warnings);
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "skipping pdf");
                report.skipped_files.push(SkippedPdf {
                    path: path.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        files = paths.len(),
        chunks = report.chunks.len(),
        skipped = report.skipped_files.len(),
        page_warnings = report.page_warnings.len(),
        "batch ingested"
    );

    report
}

pub fn ingest_folder_best_effort(
    pipeline: &PdfPipeline,
    splitter: &RecursiveSplitter,
    folder: &Path,
    selectors: Option<&ContentSelectors>,
    max_pages: Option<usize>,
) -> Result<IngestionReport, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    Ok(ingest_paths_best_effort(pipeline, splitter, &files, selectors, max_pages))
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, ingest_folder_best_effort, ingest_paths_best_effort};
    use crate::chunking::{RecursiveSplitter, SplitterConfig};
    use crate::engines::{EngineId, EngineProbe};
    use crate::models::{ContentSelectors, PipelineOptions, TextSelector};
    use crate::orchestrator::PdfPipeline;
    use crate::test_support::{write_pdf, TestPage};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    fn pipeline() -> Result<PdfPipeline, Box<dyn std::error::Error>> {
        let probe = EngineProbe::from_available([EngineId::Lopdf])?;
        Ok(PdfPipeline::with_probe(probe, PipelineOptions::default()))
    }

    fn splitter() -> Result<RecursiveSplitter, Box<dyn std::error::Error>> {
        Ok(RecursiveSplitter::new(SplitterConfig::new(200, 20))?)
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("B.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(base.join("notes.txt"), b"not a pdf")?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn ingestion_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = ingest_folder_best_effort(&pipeline()?, &splitter()?, dir.path(), None, None);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn best_effort_skips_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;
        write_pdf(&dir.path().join("valid.pdf"), &[TestPage::text("Hazard communication")])?;

        let report = ingest_folder_best_effort(&pipeline()?, &splitter()?, dir.path(), None, None)?;

        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        assert_eq!(report.chunks.len(), 1);
        assert!(report.chunks[0].text.contains("Hazard communication"));
        Ok(())
    }

    #[test]
    fn missing_path_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let missing = dir.path().join("missing.pdf");

        let report = ingest_paths_best_effort(&pipeline()?, &splitter()?, &[missing], None, None);

        assert!(report.chunks.is_empty());
        assert!(report.skipped_files[0].reason.contains("not found"));
        Ok(())
    }

    #[test]
    fn selectors_and_page_limit_are_forwarded() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("doc.pdf");
        write_pdf(
            &path,
            &[TestPage::text("Scope and application"), TestPage::text("Definitions")],
        )?;
        let selectors = ContentSelectors {
            filter_text: Some(TextSelector {
                max_length: Some(5),
                ..TextSelector::default()
            }),
            extract_images: false,
        };

        let report = ingest_paths_best_effort(&pipeline()?, &splitter()?, &[path], Some(&selectors), Some(1));

        assert_eq!(report.chunks.len(), 1);
        let text = &report.chunks[0].text;
        assert!(text.ends_with("..."), "got {text:?}");
        assert_eq!(text.chars().count(), 8);
        assert!(!report.chunks.iter().any(|chunk| chunk.text.contains("Definitions")));
        Ok(())
    }
}
