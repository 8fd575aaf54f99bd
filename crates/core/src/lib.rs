pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod eval;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod retriever;
pub mod stores;
pub mod traits;

pub use chunking::{
    normalize_whitespace, BreakpointPolicy, ChunkingConfig, SemanticSplitter, TextSplitter,
    SUPPORTED_BREAKPOINT_POLICIES,
};
pub use embeddings::{Embedder, HashingEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{EvalError, IngestError, LlmError, SearchError};
pub use eval::{
    EvalMetric, EvalPipeline, EvalReport, EvalSample, MetricScore, QaDataset, QaItem,
    SUPPORTED_EVAL_METRICS,
};
pub use extractor::{
    extract_pdf_text, join_page_texts, read_text_file, PageText, PdfBackend, PdfExtractor,
    TextEncoding, SUPPORTED_PDF_BACKENDS, SUPPORTED_TEXT_ENCODINGS,
};
pub use ingest::{
    discover_source_files, file_exists, IngestionPipeline, IngestionReport, SkippedFile,
    SourceFormat,
};
pub use llm::{LlmClient, LlmConfig};
pub use models::{Document, DocumentCollection, SearchCandidate, SearchQuery, TextChunk};
pub use retriever::{MultiQueryRetriever, Retriever, DEFAULT_QUERY_VARIANTS};
pub use stores::QdrantStore;
pub use traits::VectorIndex;
