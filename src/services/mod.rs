pub mod chunker;
pub mod completion;
pub mod embedding;
pub mod ingest;
pub mod metrics;
pub mod rag;
pub mod retriever;
pub mod session;
pub mod synthesizer;
pub mod vector_index;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::Chunker;
pub use completion::{CompletionClient, CompletionModel};
pub use embedding::{Embedder, EmbeddingClient};
pub use ingest::{IngestOutput, IngestPipeline, StageTracker};
pub use metrics::{MetricsStore, MetricsSummary, Operation};
pub use rag::{RagService, ServiceHealth};
pub use retriever::Retriever;
pub use session::{BuildGuard, Corpus, CorpusBuild, CorpusSession};
pub use synthesizer::{AnswerSynthesizer, ContextBlock, NO_RESULT, PromptTemplate, Synthesis};
pub use vector_index::{SearchHit, VectorIndex};
