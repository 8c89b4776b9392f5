use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SubastaError {
    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("pdftotext failed with exit code {code}: {stderr}")]
    PdftotextFailed { code: i32, stderr: String },

    #[error("failed to parse document: {0}")]
    ParseError(String),

    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error("failed to read table {path}: {reason}")]
    TableRead { path: PathBuf, reason: String },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Failure reported by a document source. Never retried by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("document {id} not found")]
    NotFound { id: u32 },

    #[error("timed out fetching document {id}")]
    Timeout { id: u32 },

    #[error("network error fetching document {id}: {reason}")]
    Network { id: u32, reason: String },
}
