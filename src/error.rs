//! Error types for logsage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::retry::Retryable;

/// Flat error classification carried over the daemon protocol.
///
/// Clients use it to decide whether a request is worth retrying without
/// parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfig,
    LoadError,
    UnsupportedFormat,
    EmbeddingServiceError,
    CompletionServiceError,
    UpstreamTimeout,
    Busy,
    NoCorpusLoaded,
    EmptyQuery,
    IndexError,
    ProtocolError,
}

impl ErrorKind {
    /// Whether the same request may succeed if sent again later.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Busy
                | ErrorKind::UpstreamTimeout
                | ErrorKind::EmbeddingServiceError
                | ErrorKind::CompletionServiceError
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::LoadError => "load_error",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::EmbeddingServiceError => "embedding_service_error",
            ErrorKind::CompletionServiceError => "completion_service_error",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::Busy => "busy",
            ErrorKind::NoCorpusLoaded => "no_corpus_loaded",
            ErrorKind::EmptyQuery => "empty_query",
            ErrorKind::IndexError => "index_error",
            ErrorKind::ProtocolError => "protocol_error",
        };
        f.write_str(s)
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid chunking: overlap ({overlap}) must be smaller than max chunk size ({max})")]
    InvalidChunking { max: usize, overlap: usize },

    #[error("invalid prompt template: {0}")]
    InvalidTemplate(String),
}

/// Errors raised while turning an uploaded file into documents.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("upload too large: {size} bytes exceeds limit of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            _ => ErrorKind::LoadError,
        }
    }
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding service: {0}")]
    ConnectionError(String),

    #[error("embedding service error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl EmbeddingError {
    pub fn kind(&self) -> ErrorKind {
        if self.is_timeout() {
            ErrorKind::UpstreamTimeout
        } else {
            ErrorKind::EmbeddingServiceError
        }
    }
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) => true,
            EmbeddingError::ServerError(msg) => is_transient_status(msg),
            EmbeddingError::RequestError(e) => e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::Timeout => false,
        }
    }

    fn is_timeout(&self) -> bool {
        match self {
            EmbeddingError::Timeout => true,
            EmbeddingError::RequestError(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Errors related to the text completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("failed to connect to completion service: {0}")]
    ConnectionError(String),

    #[error("completion service error: {0}")]
    ServerError(String),

    #[error("completion request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),

    #[error("completion timeout")]
    Timeout,
}

impl CompletionError {
    pub fn kind(&self) -> ErrorKind {
        if self.is_timeout() {
            ErrorKind::UpstreamTimeout
        } else {
            ErrorKind::CompletionServiceError
        }
    }
}

impl Retryable for CompletionError {
    fn is_retryable(&self) -> bool {
        match self {
            CompletionError::ConnectionError(_) => true,
            CompletionError::ServerError(msg) => is_transient_status(msg),
            CompletionError::RequestError(e) => e.is_connect(),
            CompletionError::InvalidResponse(_) | CompletionError::Timeout => false,
        }
    }

    fn is_timeout(&self) -> bool {
        match self {
            CompletionError::Timeout => true,
            CompletionError::RequestError(e) => e.is_timeout(),
            _ => false,
        }
    }
}

// 503/502/504/429 and their textual forms are worth another attempt.
fn is_transient_status(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    msg.contains("503")
        || msg.contains("502")
        || msg.contains("504")
        || msg.contains("429")
        || lower.contains("unavailable")
        || lower.contains("too many requests")
}

/// Errors related to building or querying the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("chunk {chunk_id} has no vector")]
    MissingVector { chunk_id: u64 },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to the corpus session state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a corpus is already being built; retry later")]
    Busy,

    #[error("no corpus loaded; upload a file first")]
    NoCorpusLoaded,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Busy => ErrorKind::Busy,
            SessionError::NoCorpusLoaded => ErrorKind::NoCorpusLoaded,
        }
    }
}

/// Ingestion pipeline stage, reported with upload failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Load,
    Chunk,
    Embed,
    Index,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestStage::Load => write!(f, "load"),
            IngestStage::Chunk => write!(f, "chunk"),
            IngestStage::Embed => write!(f, "embed"),
            IngestStage::Index => write!(f, "index"),
        }
    }
}

/// Errors raised by an upload.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("chunk failed: {0}")]
    Chunk(#[from] ConfigError),

    #[error("embed failed: {0}")]
    Embed(#[from] EmbeddingError),

    #[error("index failed: {0}")]
    Index(#[from] IndexError),

    #[error("ingestion timed out after {secs}s during {stage}")]
    Timeout { secs: u64, stage: IngestStage },
}

impl IngestError {
    /// The pipeline stage that failed, if the failure happened inside the pipeline.
    pub fn stage(&self) -> Option<IngestStage> {
        match self {
            IngestError::Session(_) => None,
            IngestError::Load(_) => Some(IngestStage::Load),
            IngestError::Chunk(_) => Some(IngestStage::Chunk),
            IngestError::Embed(_) => Some(IngestStage::Embed),
            IngestError::Timeout { stage, .. } => Some(*stage),
            IngestError::Index(_) => Some(IngestStage::Index),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Session(e) => e.kind(),
            IngestError::Load(e) => e.kind(),
            IngestError::Chunk(_) => ErrorKind::InvalidConfig,
            IngestError::Embed(e) => e.kind(),
            IngestError::Index(_) => ErrorKind::IndexError,
            IngestError::Timeout { .. } => ErrorKind::UpstreamTimeout,
        }
    }
}

/// Errors raised by a question against the loaded corpus.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query cannot be empty")]
    EmptyQuery,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("query timed out after {0}s")]
    Timeout(u64),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::EmptyQuery => ErrorKind::EmptyQuery,
            QueryError::Session(e) => e.kind(),
            QueryError::Embedding(e) => e.kind(),
            QueryError::Index(_) => ErrorKind::IndexError,
            QueryError::Completion(e) => e.kind(),
            QueryError::Timeout(_) => ErrorKind::UpstreamTimeout,
        }
    }
}

/// Errors related to the daemon and its client.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("daemon not running")]
    NotRunning,

    #[error("failed to spawn daemon: {0}")]
    SpawnError(String),

    #[error("failed to connect to daemon: {0}")]
    ConnectionFailed(String),

    #[error("socket error: {0}")]
    SocketError(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("timed out waiting for daemon")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An error reported by the daemon while serving a request.
    #[error("{message}")]
    Remote {
        kind: ErrorKind,
        stage: Option<IngestStage>,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_stage() {
        let err = IngestError::from(LoadError::UnsupportedFormat(".pdf".to_string()));
        assert_eq!(err.stage(), Some(IngestStage::Load));
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

        let err = IngestError::from(EmbeddingError::Timeout);
        assert_eq!(err.stage(), Some(IngestStage::Embed));
        assert_eq!(err.kind(), ErrorKind::UpstreamTimeout);

        let err = IngestError::Timeout {
            secs: 30,
            stage: IngestStage::Load,
        };
        assert_eq!(err.stage(), Some(IngestStage::Load));
        assert_eq!(err.kind(), ErrorKind::UpstreamTimeout);
        assert_eq!(err.to_string(), "ingestion timed out after 30s during load");

        let err = IngestError::from(SessionError::Busy);
        assert_eq!(err.stage(), None);
        assert_eq!(err.kind(), ErrorKind::Busy);
    }

    #[test]
    fn test_query_error_kinds_are_distinct() {
        assert_eq!(QueryError::EmptyQuery.kind(), ErrorKind::EmptyQuery);
        assert_eq!(
            QueryError::from(SessionError::NoCorpusLoaded).kind(),
            ErrorKind::NoCorpusLoaded
        );
        assert_eq!(
            QueryError::from(CompletionError::ServerError("status 500".into())).kind(),
            ErrorKind::CompletionServiceError
        );
        assert_eq!(QueryError::Timeout(5).kind(), ErrorKind::UpstreamTimeout);
    }

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::ConnectionError("refused".into()).is_retryable());
        assert!(EmbeddingError::ServerError("status 503: busy".into()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 400: bad".into()).is_retryable());
        assert!(!EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::Timeout.is_timeout());
    }

    #[test]
    fn test_error_kind_retryable() {
        assert!(ErrorKind::Busy.is_retryable());
        assert!(ErrorKind::UpstreamTimeout.is_retryable());
        assert!(!ErrorKind::EmptyQuery.is_retryable());
        assert!(!ErrorKind::UnsupportedFormat.is_retryable());
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::NoCorpusLoaded).unwrap();
        assert_eq!(json, "\"no_corpus_loaded\"");
        assert_eq!(ErrorKind::NoCorpusLoaded.to_string(), "no_corpus_loaded");
    }
}
