use chrono::Utc;
use clap::{Parser, Subcommand};
use rag_pipeline_core::{
    discover_source_files, BreakpointPolicy, ChunkingConfig, Embedder, EvalMetric, EvalPipeline,
    HashingEmbedder, IngestionPipeline, LlmClient, LlmConfig, MultiQueryRetriever, QaDataset,
    QdrantStore, Retriever, SearchQuery, SemanticSplitter, SourceFormat, TextSplitter, VectorIndex,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rag-pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "rag_chunks")]
    qdrant_collection: String,

    /// OpenAI-compatible chat endpoint base URL
    #[arg(long, default_value = "http://localhost:11434/v1")]
    llm_url: String,

    /// API key for the chat endpoint
    #[arg(long, env = "LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Model served by the chat endpoint
    #[arg(long, default_value = "llama3")]
    llm_model: String,
}

#[derive(Subcommand)]
enum Command {
    /// Load documents, chunk them, and index the chunks into Qdrant.
    Ingest {
        /// Source file, repeatable; order is preserved.
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Folder to scan recursively for matching files.
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Source format: pdf or text.
        #[arg(long, default_value = "text")]
        format: String,
        /// PDF engine when --format pdf.
        #[arg(long, default_value = "lopdf")]
        pdf_backend: String,
        /// Text encoding when --format text.
        #[arg(long, default_value = "utf-8")]
        encoding: String,
        /// Splitter: simple or semantic.
        #[arg(long, default_value = "simple")]
        splitter: String,
        /// Breakpoint policy for the semantic splitter.
        #[arg(long, default_value = "interquartile")]
        breakpoint_policy: String,
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
        #[arg(long, default_value = "200")]
        chunk_overlap: usize,
    },
    /// Query the vector index and print the ranked chunks.
    Search {
        #[arg(long)]
        query: String,
        /// Number of candidates to return.
        #[arg(long, default_value = "10")]
        top_k: usize,
        /// Expand the query into several phrasings before retrieving.
        #[arg(long, default_value_t = false)]
        multi_query: bool,
        /// Phrasings to generate when --multi-query is set.
        #[arg(long, default_value = "3")]
        variants: usize,
    },
    /// Run the retrieve-answer-judge loop over a QA dataset.
    Eval {
        /// Path to a QA dataset JSON file.
        #[arg(long)]
        dataset: PathBuf,
        /// Metric to score, repeatable; all metrics when omitted.
        #[arg(long = "metric")]
        metrics: Vec<String>,
        /// Contexts to retrieve per question.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Evaluate only the first N dataset items.
        #[arg(long)]
        limit: Option<usize>,
        /// Write the full report JSON here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = HashingEmbedder::default();
    let store = QdrantStore::new(
        &cli.qdrant_url,
        &cli.qdrant_collection,
        embedder.dimensions(),
    );

    let mut llm_config = LlmConfig::new(&cli.llm_url, &cli.llm_model);
    if let Some(api_key) = &cli.llm_api_key {
        llm_config = llm_config.with_api_key(api_key);
    }
    let llm = LlmClient::new(llm_config);

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "rag-pipeline boot"
    );

    match cli.command {
        Command::Ingest {
            files,
            folder,
            format,
            pdf_backend,
            encoding,
            splitter,
            breakpoint_policy,
            chunk_size,
            chunk_overlap,
        } => {
            let source_format = parse_source_format(&format, &pdf_backend, &encoding)?;

            let mut paths = files;
            if let Some(folder) = folder {
                paths.extend(discover_source_files(&folder, source_format));
            }

            let pipeline = IngestionPipeline::new(paths, source_format)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let report = pipeline
                .run()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if !report.skipped_files.is_empty() {
                warn!(skipped = report.skipped_files.len(), "some files were skipped");
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
                }
            }

            let chunks = match splitter.as_str() {
                "simple" => {
                    let config = ChunkingConfig {
                        chunk_size,
                        chunk_overlap,
                        ..ChunkingConfig::default()
                    };
                    TextSplitter::new(config)
                        .map_err(|error| anyhow::anyhow!(error.to_string()))?
                        .split_documents(&report.documents)
                }
                "semantic" => {
                    let policy: BreakpointPolicy = breakpoint_policy
                        .parse()
                        .map_err(|error: rag_pipeline_core::IngestError| {
                            anyhow::anyhow!(error.to_string())
                        })?;
                    SemanticSplitter::new(embedder, policy).split_documents(&report.documents)
                }
                other => anyhow::bail!("unknown splitter {other:?}: must be simple or semantic"),
            };

            info!(
                documents = report.documents.len(),
                chunk_count = chunks.len(),
                "indexing chunks"
            );

            let embeddings: Vec<_> = chunks
                .iter()
                .map(|chunk| embedder.embed(&chunk.content))
                .collect();

            store
                .ensure_collection()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            store
                .index_chunks(&chunks, &embeddings)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} documents ({} skipped) indexed as {} chunks at {}",
                report.documents.len(),
                report.skipped_files.len(),
                chunks.len(),
                report.completed_at.to_rfc3339()
            );
        }
        Command::Search {
            query,
            top_k,
            multi_query,
            variants,
        } => {
            let retriever = Retriever::new(store, embedder);
            let search_query = SearchQuery::new(query, top_k);

            let hits = if multi_query {
                MultiQueryRetriever::new(retriever, llm)
                    .with_variant_count(variants)
                    .retrieve(&search_query)
                    .await
            } else {
                retriever.retrieve(&search_query).await
            }
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("query: {}", search_query.text);
            for hit in hits {
                println!(
                    "score={:.4} chunk={} document={} source={}",
                    hit.score, hit.chunk_id, hit.document_number, hit.source_path
                );
                println!("  {}", hit.content);
            }
        }
        Command::Eval {
            dataset,
            metrics,
            top_k,
            limit,
            output,
        } => {
            let mut qa = QaDataset::load_json(&dataset)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            if let Some(limit) = limit {
                qa = qa.take(limit);
            }

            let metrics = if metrics.is_empty() {
                EvalMetric::all()
            } else {
                metrics
                    .iter()
                    .map(|metric| metric.parse())
                    .collect::<Result<Vec<EvalMetric>, _>>()
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?
            };

            let retriever = Retriever::new(store, embedder);
            let pipeline = EvalPipeline::new(retriever, llm, metrics, top_k)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let report = pipeline
                .run(&qa)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "evaluated {} samples from {} (report {})",
                report.samples.len(),
                report.dataset,
                report.id
            );
            for mean in &report.mean_scores {
                println!("{}: {:.3}", mean.metric.as_str(), mean.score);
            }

            if let Some(path) = output {
                report
                    .save_json(&path)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                println!("report written to {}", path.display());
            }
        }
    }

    Ok(())
}

fn parse_source_format(
    format: &str,
    pdf_backend: &str,
    encoding: &str,
) -> anyhow::Result<SourceFormat> {
    match format {
        "pdf" => {
            let backend = pdf_backend
                .parse()
                .map_err(|error: rag_pipeline_core::IngestError| {
                    anyhow::anyhow!(error.to_string())
                })?;
            Ok(SourceFormat::Pdf(backend))
        }
        "text" => {
            let encoding = encoding
                .parse()
                .map_err(|error: rag_pipeline_core::IngestError| {
                    anyhow::anyhow!(error.to_string())
                })?;
            Ok(SourceFormat::Text(encoding))
        }
        other => anyhow::bail!("unknown source format {other:?}: must be pdf or text"),
    }
}
