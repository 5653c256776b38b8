use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("no pdf extraction engine is available (tried lopdf, pdftotext, pdf-extract)")]
    NoEngineAvailable,

    #[error("unknown pdf engine: {0}")]
    UnknownEngine(String),

    #[error("{engine} could not open {}: {details}", .path.display())]
    EngineOpen {
        engine: &'static str,
        path: PathBuf,
        details: String,
    },

    #[error("{engine} could not close {}: {details}", .path.display())]
    EngineClose {
        engine: &'static str,
        path: PathBuf,
        details: String,
    },

    #[error("page {page_number} extraction failed: {details}")]
    PageExtraction { page_number: usize, details: String },

    #[error("invalid filter pattern {pattern:?}: {source}")]
    InvalidFilterPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid split configuration: {0}")]
    InvalidSplitConfiguration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store request failed: {0}")]
    Request(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
