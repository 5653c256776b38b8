pub mod lopdf_engine;
#[cfg(feature = "pdf-extract")]
pub mod pdf_extract_engine;
pub mod pdftotext;

pub use lopdf_engine::LopdfEngine;
#[cfg(feature = "pdf-extract")]
pub use pdf_extract_engine::PdfExtractEngine;
pub use pdftotext::PdftotextEngine;

use crate::error::IngestError;
use crate::models::Metadata;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, warn};

// Linked annotation walks stop here; malformed files can contain cycles.
const MAX_LINKED_ANNOTATIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineId {
    Lopdf,
    Pdftotext,
    PdfExtract,
}

impl EngineId {
    pub const RANKED: [EngineId; 3] = [EngineId::Lopdf, EngineId::Pdftotext, EngineId::PdfExtract];

    pub fn name(self) -> &'static str {
        match self {
            EngineId::Lopdf => "lopdf",
            EngineId::Pdftotext => "pdftotext",
            EngineId::PdfExtract => "pdf-extract",
        }
    }

    fn is_present(self) -> bool {
        match self {
            EngineId::Lopdf => true,
            EngineId::Pdftotext => PdftotextEngine::is_available(),
            EngineId::PdfExtract => cfg!(feature = "pdf-extract"),
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineId {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lopdf" => Ok(EngineId::Lopdf),
            "pdftotext" | "poppler" => Ok(EngineId::Pdftotext),
            "pdf-extract" | "pdf_extract" => Ok(EngineId::PdfExtract),
            other => Err(IngestError::UnknownEngine(other.to_string())),
        }
    }
}

static AVAILABLE_ENGINES: OnceLock<Vec<EngineId>> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProbe {
    available: Vec<EngineId>,
}

impl EngineProbe {
    pub fn global() -> Result<Self, IngestError> {
        let available = AVAILABLE_ENGINES.get_or_init(|| {
            let found: Vec<EngineId> = EngineId::RANKED
                .into_iter()
                .filter(|engine| engine.is_present())
                .collect();
            debug!(engines = ?found, "probed pdf engines");
            found
        });

        Self::from_available(available.iter().copied())
    }

    pub fn from_available(engines: impl IntoIterator<Item = EngineId>) -> Result<Self, IngestError> {
        let available: Vec<EngineId> = engines
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if available.is_empty() {
            return Err(IngestError::NoEngineAvailable);
        }

        Ok(Self { available })
    }

    pub fn available_engines(&self) -> &[EngineId] {
        &self.available
    }

    pub fn is_available(&self, engine: EngineId) -> bool {
        self.available.contains(&engine)
    }

    pub fn recommended_engine(&self) -> EngineId {
        self.available[0]
    }

    pub fn resolve(&self, preferred: Option<&str>) -> EngineId {
        let recommended = self.recommended_engine();
        let Some(name) = preferred.map(str::trim).filter(|name| !name.is_empty()) else {
            return recommended;
        };
        if name.eq_ignore_ascii_case("auto") {
            return recommended;
        }

        match name.parse::<EngineId>() {
            Ok(engine) if self.is_available(engine) => engine,
            Ok(engine) => {
                warn!(preferred = %engine, fallback = %recommended, "preferred pdf engine unavailable");
                recommended
            }
            Err(error) => {
                warn!(%error, fallback = %recommended, "ignoring preferred pdf engine");
                recommended
            }
        }
    }
}

pub fn backend(engine: EngineId) -> Result<Box<dyn PdfEngine>, IngestError> {
    match engine {
        EngineId::Lopdf => Ok(Box::new(LopdfEngine)),
        EngineId::Pdftotext => Ok(Box::new(PdftotextEngine::default())),
        #[cfg(feature = "pdf-extract")]
        EngineId::PdfExtract => Ok(Box::new(PdfExtractEngine)),
        #[cfg(not(feature = "pdf-extract"))]
        EngineId::PdfExtract => Err(IngestError::UnknownEngine(
            "pdf-extract (built without the pdf-extract feature)".to_string(),
        )),
    }
}

pub trait PdfEngine {
    fn id(&self) -> EngineId;

    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, IngestError>;
}

pub trait PdfDocument {
    fn page_count(&self) -> usize;

    fn extract_page(&mut self, index: usize) -> Result<PageExtraction, IngestError>;

    fn page_images(&mut self, _index: usize) -> Result<Vec<ImageInfo>, IngestError> {
        Ok(Vec::new())
    }

    fn document_metadata(&self) -> Metadata {
        Metadata::new()
    }

    fn close(self: Box<Self>) -> Result<(), IngestError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtraction {
    pub text: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub index: usize,
    pub name: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    // `[x0, y0, x1, y1]` in default user space.
    pub bbox: Option<[f64; 4]>,
}

pub fn join_fragments<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for (position, fragment) in fragments.into_iter().enumerate() {
        if position > 0 {
            joined.push(' ');
        }
        joined.push_str(fragment.as_ref());
    }
    joined
}

// How a backend exposes a page's annotations. lopdf hands out the `Annots`
// array (`Bulk`); `Linked` is for backends that only offer a first
// annotation and a way to step to the next one.
pub enum AnnotationWalk<'a, T> {
    Bulk(Box<dyn Iterator<Item = T> + 'a>),
    Linked {
        first: Option<T>,
        next: Box<dyn Fn(&T) -> Option<T> + 'a>,
    },
}

pub fn count_annotations<T>(walk: AnnotationWalk<'_, T>) -> usize {
    match walk {
        AnnotationWalk::Bulk(items) => items.count(),
        AnnotationWalk::Linked { first, next } => {
            let mut count = 0;
            let mut current = first;
            while let Some(annotation) = current {
                count += 1;
                if count >= MAX_LINKED_ANNOTATIONS {
                    break;
                }
                current = next(&annotation);
            }
            count
        }
    }
}
