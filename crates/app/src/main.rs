use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use docpipe_core::{
    ingest_folder_best_effort, ingest_paths_best_effort, Chunk, ContentSelectors,
    ExtractionRequest, InMemoryVectorStore, IngestionReport, PdfPipeline, PipelineOptions,
    RecursiveSplitter, RegulationEnricher, SplitterConfig, TextSelector, UploadEnricher,
    VectorStore, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docpipe", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// PDF engine: lopdf, pdftotext, pdf-extract or auto.
    #[arg(long, global = true, env = "DOCPIPE_ENGINE")]
    engine: Option<String>,
}

#[derive(Args)]
struct ChunkArgs {
    /// Maximum characters per chunk.
    #[arg(long, env = "DOCPIPE_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by neighbouring chunks.
    #[arg(long, env = "DOCPIPE_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// JSON file with content selectors.
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Stop after this many pages per document.
    #[arg(long)]
    max_pages: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// List usable PDF engines and the one that would be selected.
    Engines,
    /// Print a diagnostic summary of one PDF.
    Info { pdf: PathBuf },
    /// Extract content units from one PDF.
    Extract {
        pdf: PathBuf,
        #[arg(long)]
        max_pages: Option<usize>,
        /// JSON file with content selectors.
        #[arg(long)]
        selectors: Option<PathBuf>,
        /// Emit an image summary unit for pages with images.
        #[arg(long, default_value_t = false)]
        extract_images: bool,
    },
    /// Extract and split PDFs into chunks.
    Chunk {
        /// PDF files to process.
        paths: Vec<PathBuf>,
        /// Folder searched recursively for PDFs.
        #[arg(long, conflicts_with = "paths")]
        folder: Option<PathBuf>,
        #[command(flatten)]
        chunking: ChunkArgs,
    },
    /// Ingest a folder into an in-memory store and query it.
    Search {
        #[arg(long)]
        folder: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "5")]
        top_k: usize,
        #[command(flatten)]
        chunking: ChunkArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docpipe boot"
    );

    let pipeline = PdfPipeline::new(PipelineOptions {
        preferred_engine: cli.engine,
    })?;

    match cli.command {
        Command::Engines => print_json(&pipeline.engine_info())?,
        Command::Info { pdf } => print_json(&pipeline.describe(&pdf)?)?,
        Command::Extract {
            pdf,
            max_pages,
            selectors,
            extract_images,
        } => {
            let mut selectors = load_selectors(selectors.as_deref()).await?.unwrap_or_default();
            selectors.extract_images |= extract_images;

            let mut request = ExtractionRequest::new(pdf).with_selectors(selectors);
            if let Some(max_pages) = max_pages {
                request = request.with_max_pages(max_pages);
            }

            let report = pipeline.process_with_report(&request)?;
            for warning in &report.warnings {
                warn!(page = warning.page_number, message = %warning.message, "page skipped");
            }
            let units: Vec<Value> = report
                .units
                .iter()
                .map(|unit| json!({ "text": unit.text(), "metadata": unit.metadata() }))
                .collect();
            print_json(&units)?;
        }
        Command::Chunk {
            paths,
            folder,
            chunking,
        } => {
            let report = ingest(&pipeline, &chunking, folder.as_deref(), &paths).await?;
            print_json(&report)?;
        }
        Command::Search {
            folder,
            query,
            top_k,
            chunking,
        } => {
            let report = ingest(&pipeline, &chunking, Some(folder.as_path()), &[]).await?;

            let store: InMemoryVectorStore = InMemoryVectorStore::default();
            store.add(&report.chunks).await?;
            info!(stored = store.count().await?, "chunks indexed");

            let hits = store.similarity_search(&query, top_k).await?;
            print_json(&hits)?;
        }
    }

    Ok(())
}

async fn ingest(
    pipeline: &PdfPipeline,
    args: &ChunkArgs,
    folder: Option<&Path>,
    paths: &[PathBuf],
) -> anyhow::Result<IngestionReport> {
    let splitter = RecursiveSplitter::new(SplitterConfig::new(args.chunk_size, args.chunk_overlap))?;
    let selectors = load_selectors(args.selectors.as_deref()).await?;

    let mut report = match folder {
        Some(folder) => ingest_folder_best_effort(pipeline, &splitter, folder, selectors.as_ref(), args.max_pages)?,
        None if paths.is_empty() => anyhow::bail!("pass pdf paths or --folder"),
        None => ingest_paths_best_effort(pipeline, &splitter, paths, selectors.as_ref(), args.max_pages),
    };

    for skipped in &report.skipped_files {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
    }

    enrich(&mut report.chunks);
    Ok(report)
}

fn enrich(chunks: &mut [Chunk]) {
    RegulationEnricher.enrich(chunks);

    let mut uploads: BTreeMap<String, UploadEnricher> = BTreeMap::new();
    for chunk in chunks.iter_mut() {
        let Some(source) = chunk.source().map(str::to_string) else {
            continue;
        };
        let enricher = uploads.entry(source).or_insert_with_key(|source| {
            let name = Path::new(source)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.clone());
            UploadEnricher::new(name)
        });
        enricher.enrich(std::slice::from_mut(chunk));
    }
}

async fn load_selectors(path: Option<&Path>) -> anyhow::Result<Option<ContentSelectors>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading selectors from {}", path.display()))?;

    // A bare text selector is accepted as shorthand for `filter_text`.
    let selectors = match serde_json::from_str::<ContentSelectors>(&raw) {
        Ok(selectors) if selectors != ContentSelectors::default() => selectors,
        _ => ContentSelectors {
            filter_text: Some(serde_json::from_str::<TextSelector>(&raw).with_context(|| {
                format!("parsing selectors in {}", path.display())
            })?),
            extract_images: false,
        },
    };
    Ok(Some(selectors))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
