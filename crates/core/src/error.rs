use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error in {path}: {details}")]
    PdfParse { path: String, details: String },

    #[error("invalid pdf backend {requested:?}: must be one of {supported:?}")]
    InvalidBackend {
        requested: String,
        supported: &'static [&'static str],
    },

    #[error("invalid text encoding {requested:?}: must be one of {supported:?}")]
    InvalidEncoding {
        requested: String,
        supported: &'static [&'static str],
    },

    #[error("text decode error in {path}: {details}")]
    TextDecode { path: String, details: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("llm request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("search request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error from {endpoint}: {details}")]
    Api { endpoint: String, details: String },

    #[error("response contained no completion choices")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed dataset: {0}")]
    Dataset(String),

    #[error("invalid eval metric {requested:?}: must be one of {supported:?}")]
    InvalidMetric {
        requested: String,
        supported: &'static [&'static str],
    },

    #[error("judge response could not be parsed: {0}")]
    JudgeParse(String),

    #[error("llm request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
