//! Query-side retrieval over a built index.

use std::sync::Arc;

use crate::error::QueryError;
use crate::models::RetrievedChunk;
use crate::services::embedding::Embedder;
use crate::services::vector_index::VectorIndex;
use crate::utils::retry::{RetryConfig, with_retry};

/// Embeds a question and looks up its nearest chunks.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    default_k: usize,
    retry: RetryConfig,
}

impl Retriever {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        default_k: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            default_k,
            retry,
        }
    }

    /// Retrieve the `k` (or the default number of) chunks closest to `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<RetrievedChunk>, QueryError> {
        let k = k.unwrap_or(self.default_k);
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = with_retry(&self.retry, || self.embedder.embed(query))
            .await?;

        let hits = self.index.search(&query_vector, k)?;
        tracing::debug!(k, hits = hits.len(), "retrieved chunks");

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk::from_chunk(hit.chunk, hit.score))
            .collect())
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }
}
