use crate::engines::{backend, EngineId, EngineProbe, ImageInfo, PdfDocument, PdfEngine};
use crate::error::IngestError;
use crate::filter::TextFilter;
use crate::models::{
    ContentUnit, ExtractionReport, ExtractionRequest, PageWarning, PdfInfo, PipelineOptions,
    UnitType, KEY_ENGINE, KEY_PAGE_NUMBER,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, info, warn};

const TEXT_SAMPLE_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub available_engines: Vec<EngineId>,
    pub preferred_engine: Option<String>,
    pub recommended_engine: EngineId,
    pub selected_engine: EngineId,
}

#[derive(Debug, Clone)]
pub struct PdfPipeline {
    probe: EngineProbe,
    options: PipelineOptions,
}

impl PdfPipeline {
    pub fn new(options: PipelineOptions) -> Result<Self, IngestError> {
        Ok(Self::with_probe(EngineProbe::global()?, options))
    }

    pub fn with_probe(probe: EngineProbe, options: PipelineOptions) -> Self {
        Self { probe, options }
    }

    pub fn probe(&self) -> &EngineProbe {
        &self.probe
    }

    pub fn selected_engine(&self) -> EngineId {
        self.probe.resolve(self.options.preferred_engine.as_deref())
    }

    pub fn engine_info(&self) -> EngineInfo {
        EngineInfo {
            available_engines: self.probe.available_engines().to_vec(),
            preferred_engine: self.options.preferred_engine.clone(),
            recommended_engine: self.probe.recommended_engine(),
            selected_engine: self.selected_engine(),
        }
    }

    pub fn process(&self, request: &ExtractionRequest) -> Result<Vec<ContentUnit>, IngestError> {
        Ok(self.process_with_report(request)?.units)
    }

    pub fn process_with_report(&self, request: &ExtractionRequest) -> Result<ExtractionReport, IngestError> {
        let engine = backend(self.selected_engine())?;
        self.process_with_engine(engine.as_ref(), request)
    }

    pub fn process_with_engine(
        &self,
        engine: &dyn PdfEngine,
        request: &ExtractionRequest,
    ) -> Result<ExtractionReport, IngestError> {
        let path = request.file_path.as_path();
        ensure_file(path)?;
        let filter = request.text_selector().map(TextFilter::new).transpose()?;

        debug!(path = %path.display(), engine = %engine.id(), "opening pdf");
        let mut document = engine.open(path)?;

        let total = document.page_count();
        let effective = request.max_pages.map_or(total, |max_pages| total.min(max_pages));
        let source = path.to_string_lossy().into_owned();

        let mut report = ExtractionReport {
            engine: Some(engine.id().to_string()),
            ..ExtractionReport::default()
        };

        for index in 0..effective {
            let page_number = index + 1;
            let page = PageContext {
                source: &source,
                page_number,
                engine: engine.id(),
            };

            match document.extract_page(index) {
                Ok(extraction) => {
                    let text = match &filter {
                        Some(filter) if !extraction.text.trim().is_empty() => filter.apply(&extraction.text),
                        _ => extraction.text,
                    };
                    if let Some(unit) = ContentUnit::new(text, &source, UnitType::Page) {
                        report.units.push(page.decorate(unit.with_all_metadata(extraction.metadata)));
                    }
                }
                Err(error) => {
                    report.warnings.push(page.warning(&error));
                    continue;
                }
            }

            if request.extract_images() {
                match image_summary(document.as_mut(), index, &page) {
                    Ok(Some(unit)) => report.units.push(unit),
                    Ok(None) => {}
                    Err(error) => report.warnings.push(page.warning(&error)),
                }
            }

            report.pages_processed += 1;
        }

        document.close()?;

        info!(
            path = %path.display(),
            engine = %engine.id(),
            total_pages = total,
            pages_processed = report.pages_processed,
            units = report.units.len(),
            warnings = report.warnings.len(),
            "pdf processed"
        );

        Ok(report)
    }

    // Diagnostic summary of a PDF. Engine failures are reported in
    // `PdfInfo::error` instead of failing the call.
    pub fn describe(&self, path: &Path) -> Result<PdfInfo, IngestError> {
        ensure_file(path)?;
        let engine = self.selected_engine();

        let mut info = PdfInfo {
            file_path: path.to_string_lossy().into_owned(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            file_size: std::fs::metadata(path)?.len(),
            engine: engine.to_string(),
            ..PdfInfo::default()
        };

        let mut document = match backend(engine).and_then(|backend| backend.open(path)) {
            Ok(document) => document,
            Err(error) => {
                info.error = Some(error.to_string());
                return Ok(info);
            }
        };

        info.page_count = Some(document.page_count());
        info.metadata = document.document_metadata();
        if document.page_count() > 0 {
            match document.extract_page(0) {
                Ok(page) => {
                    let mut sample: String = page.text.chars().take(TEXT_SAMPLE_CHARS).collect();
                    sample.push_str("...");
                    info.text_sample = Some(sample);
                }
                Err(error) => info.error = Some(error.to_string()),
            }
        }
        if let Err(error) = document.close() {
            info.error = Some(error.to_string());
        }

        Ok(info)
    }
}

struct PageContext<'a> {
    source: &'a str,
    page_number: usize,
    engine: EngineId,
}

impl PageContext<'_> {
    fn decorate(&self, unit: ContentUnit) -> ContentUnit {
        unit.with_metadata(KEY_PAGE_NUMBER, self.page_number)
            .with_metadata(KEY_ENGINE, self.engine.name())
    }

    fn warning(&self, error: &IngestError) -> PageWarning {
        warn!(
            source = self.source,
            page = self.page_number,
            engine = %self.engine,
            %error,
            "skipping page"
        );
        PageWarning {
            source: self.source.to_string(),
            page_number: self.page_number,
            engine: self.engine.to_string(),
            message: error.to_string(),
        }
    }
}

fn image_summary(
    document: &mut dyn PdfDocument,
    index: usize,
    page: &PageContext<'_>,
) -> Result<Option<ContentUnit>, IngestError> {
    let images = document.page_images(index)?;
    if images.is_empty() {
        return Ok(None);
    }

    let text = format!("Page {} contains {} images", page.page_number, images.len());
    Ok(ContentUnit::new(text, page.source, UnitType::ImageSummary).map(|unit| {
        page.decorate(unit)
            .with_metadata("image_count", images.len())
            .with_metadata("images", Value::Array(images.iter().map(image_json).collect()))
    }))
}

fn image_json(image: &ImageInfo) -> Value {
    json!({
        "index": image.index,
        "name": image.name,
        "width": image.width,
        "height": image.height,
        "bbox": image.bbox,
    })
}

fn ensure_file(path: &Path) -> Result<(), IngestError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(IngestError::FileNotFound(path.to_path_buf()))
    }
}
