mod config;
mod corpus;
mod document;
mod search;

pub use config::{
    ChunkingConfig, CompletionConfig, Config, DEFAULT_COMPLETION_MODEL, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_PERSONA, DEFAULT_PROMPT_TEMPLATE, DaemonConfig, EmbeddingConfig,
    IngestionConfig, MetricsConfig, OutputConfig, RetrievalConfig, RetrySettings,
};
pub use corpus::{CorpusInfo, SessionStatus};
pub use document::{Chunk, Document, Metadata};
pub use search::{Answer, ContextStats, OutputFormat, QueryOptions, RetrievedChunk, UploadReport};
