//! Upload ingestion: load, chunk, embed, index.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{EmbeddingError, IngestError, IngestStage, LoadError};
use crate::loaders::{self, FileKind};
use crate::models::{Chunk, ChunkingConfig};
use crate::services::chunker::Chunker;
use crate::services::embedding::Embedder;
use crate::services::vector_index::VectorIndex;
use crate::utils::retry::{RetryConfig, with_retry};

/// Result of a successful ingestion run.
#[derive(Debug)]
pub struct IngestOutput {
    pub documents: usize,
    pub index: VectorIndex,
}

/// Last stage an ingestion run entered, readable while the run is in flight.
#[derive(Debug, Default)]
pub struct StageTracker(AtomicU8);

impl StageTracker {
    fn enter(&self, stage: IngestStage) {
        self.0.store(stage as u8, Ordering::Relaxed);
    }

    pub fn current(&self) -> IngestStage {
        match self.0.load(Ordering::Relaxed) {
            s if s == IngestStage::Chunk as u8 => IngestStage::Chunk,
            s if s == IngestStage::Embed as u8 => IngestStage::Embed,
            s if s == IngestStage::Index as u8 => IngestStage::Index,
            _ => IngestStage::Load,
        }
    }
}

/// Builds a vector index from one stored upload.
#[derive(Clone)]
pub struct IngestPipeline {
    chunking: ChunkingConfig,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    retry: RetryConfig,
}

impl IngestPipeline {
    pub fn new(
        chunking: ChunkingConfig,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            chunking,
            embedder,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Run every stage. Any failure discards the partial work.
    pub async fn run(&self, path: PathBuf, kind: FileKind) -> Result<IngestOutput, IngestError> {
        self.run_tracked(path, kind, &StageTracker::default()).await
    }

    /// Like [`run`](Self::run), recording each stage in `tracker` as it starts.
    pub async fn run_tracked(
        &self,
        path: PathBuf,
        kind: FileKind,
        tracker: &StageTracker,
    ) -> Result<IngestOutput, IngestError> {
        tracker.enter(IngestStage::Load);
        let documents = tokio::task::spawn_blocking(move || loaders::load(&path, kind))
            .await
            .map_err(|e| LoadError::IoError(io::Error::other(e)))??;
        tracing::info!(documents = documents.len(), "documents loaded");

        tracker.enter(IngestStage::Chunk);
        let chunker = Chunker::from_config(&self.chunking)?;
        let mut chunks = chunker.split(&documents);
        tracing::info!(chunks = chunks.len(), "documents chunked");

        tracker.enter(IngestStage::Embed);
        self.embed_chunks(&mut chunks).await?;

        tracker.enter(IngestStage::Index);
        let index = VectorIndex::build(chunks)?;
        tracing::info!(
            vectors = index.len(),
            dimension = index.dimension(),
            "index built"
        );

        Ok(IngestOutput {
            documents: documents.len(),
            index,
        })
    }

    async fn embed_chunks(&self, chunks: &mut [Chunk]) -> Result<(), EmbeddingError> {
        let total = chunks.len();
        let mut done = 0;

        for batch in chunks.chunks_mut(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = with_retry(&self.retry, || self.embedder.embed_batch(texts.clone()))
                .await?;

            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.vector = embedding;
            }

            done += batch.len();
            tracing::debug!(done, total, "embedded batch");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestStage;
    use crate::services::testing::{FailingEmbedder, GatedEmbedder, KeywordEmbedder};

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_csv_rows_become_single_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "events.csv",
            "time,level,msg\n10:00,INFO,start\n10:01,WARN,slow\n10:02,ERROR,crash\n",
        );
        let pipeline = IngestPipeline::new(
            ChunkingConfig::default(),
            Arc::new(KeywordEmbedder::default()),
            16,
            RetryConfig::new(1),
        );

        let output = pipeline.run(path, FileKind::Csv).await.unwrap();
        assert_eq!(output.documents, 3);
        assert_eq!(output.index.len(), 3);
        assert_eq!(
            output.index.chunks()[0].text,
            "time: 10:00\nlevel: INFO\nmsg: start"
        );
        assert!(output.index.chunks().iter().all(|c| !c.vector.is_empty()));
    }

    #[tokio::test]
    async fn test_embeds_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let content = "word ".repeat(200);
        let path = write(&dir, "big.txt", &content);
        let embedder = Arc::new(KeywordEmbedder::default());
        let pipeline = IngestPipeline::new(
            ChunkingConfig {
                max_chunk_chars: 100,
                overlap_chars: 0,
            },
            embedder.clone(),
            3,
            RetryConfig::new(1),
        );

        let output = pipeline.run(path, FileKind::Text).await.unwrap();
        let chunks = output.index.len();
        assert!(chunks >= 10);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), chunks.div_ceil(3));
    }

    #[tokio::test]
    async fn test_failures_carry_stage() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "app.log", "sshd failed password for root");

        let pipeline = IngestPipeline::new(
            ChunkingConfig::default(),
            Arc::new(FailingEmbedder),
            16,
            RetryConfig::new(1),
        );
        let err = pipeline.run(path.clone(), FileKind::Log).await.unwrap_err();
        assert_eq!(err.stage(), Some(IngestStage::Embed));

        let pipeline = IngestPipeline::new(
            ChunkingConfig {
                max_chunk_chars: 10,
                overlap_chars: 10,
            },
            Arc::new(KeywordEmbedder::default()),
            16,
            RetryConfig::new(1),
        );
        let err = pipeline.run(path, FileKind::Log).await.unwrap_err();
        assert_eq!(err.stage(), Some(IngestStage::Chunk));

        let missing = dir.path().join("missing.log");
        let err = pipeline.run(missing, FileKind::Log).await.unwrap_err();
        assert_eq!(err.stage(), Some(IngestStage::Load));
    }

    #[tokio::test]
    async fn test_tracker_follows_stages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "app.log", "kernel panic");
        let gated = Arc::new(GatedEmbedder::new());
        let pipeline = IngestPipeline::new(
            ChunkingConfig::default(),
            gated.clone(),
            16,
            RetryConfig::new(1),
        );
        let tracker = Arc::new(StageTracker::default());
        assert_eq!(tracker.current(), IngestStage::Load);

        let task = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                pipeline
                    .run_tracked(path, FileKind::Log, &tracker)
                    .await
                    .map(|o| o.index.len())
            })
        };
        gated.entered.acquire().await.unwrap().forget();
        assert_eq!(tracker.current(), IngestStage::Embed);

        gated.release();
        assert_eq!(task.await.unwrap().unwrap(), 1);
        assert_eq!(tracker.current(), IngestStage::Index);
    }
}
