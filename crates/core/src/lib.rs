pub mod chunking;
pub mod embeddings;
pub mod engines;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use chunking::{split, RecursiveSplitter, SplitterConfig, TextSpan, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use engines::{EngineId, EngineProbe, PdfDocument, PdfEngine};
pub use enrich::{RegulationEnricher, UploadEnricher};
pub use error::{IngestError, Result, StoreError};
pub use filter::TextFilter;
pub use ingest::{
    discover_pdf_files, ingest_folder_best_effort, ingest_paths_best_effort, IngestionReport,
    SkippedPdf,
};
pub use models::{
    Chunk, ContentSelectors, ContentUnit, ExtractionReport, ExtractionRequest, Metadata,
    PageWarning, PdfInfo, PipelineOptions, TextSelector, UnitType,
};
pub use orchestrator::{EngineInfo, PdfPipeline};
pub use stores::InMemoryVectorStore;
pub use traits::VectorStore;
