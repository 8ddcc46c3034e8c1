//! Upload, query and health operations over the single corpus session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::error::{ConfigError, IngestError, LoadError, QueryError};
use crate::loaders::FileKind;
use crate::models::{Answer, Config, QueryOptions, SessionStatus, UploadReport};
use crate::services::completion::CompletionModel;
use crate::services::embedding::Embedder;
use crate::services::ingest::{IngestPipeline, StageTracker};
use crate::services::retriever::Retriever;
use crate::services::session::{CorpusBuild, CorpusSession};
use crate::services::synthesizer::AnswerSynthesizer;
use crate::utils::file::{calculate_checksum, sanitize_filename, store_upload};
use crate::utils::retry::RetryConfig;

/// Readiness of the service and the corpus it is serving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub message: String,
    pub version: String,
    pub session: SessionStatus,
    pub embedding_model: String,
    pub completion_model: String,
}

/// Owns the corpus session and the collaborators needed to fill and query it.
pub struct RagService {
    config: Config,
    embedder: Arc<dyn Embedder>,
    synthesizer: AnswerSynthesizer,
    pipeline: IngestPipeline,
    session: CorpusSession,
    retry: RetryConfig,
}

impl RagService {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionModel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let retry = RetryConfig::from(&config.retry);
        let synthesizer = AnswerSynthesizer::from_config(
            completion,
            &config.completion,
            config.retrieval.max_context_chars,
            retry.clone(),
        )?;
        let pipeline = IngestPipeline::new(
            config.chunking.clone(),
            Arc::clone(&embedder),
            config.embedding.batch_size as usize,
            retry.clone(),
        );

        Ok(Self {
            config,
            embedder,
            synthesizer,
            pipeline,
            session: CorpusSession::new(),
            retry,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &CorpusSession {
        &self.session
    }

    /// Replace the corpus with the contents of an uploaded file.
    ///
    /// Unsupported or oversized uploads are rejected before the session is
    /// touched. Any later failure leaves the previous corpus serving.
    pub async fn upload(&self, file_name: &str, data: Vec<u8>) -> Result<UploadReport, IngestError> {
        let start = Instant::now();
        let result = self.upload_inner(file_name, data, start).await;
        if let Err(e) = &result {
            tracing::warn!(
                file = file_name,
                stage = ?e.stage(),
                kind = %e.kind(),
                "upload failed: {}",
                e
            );
        }
        result
    }

    async fn upload_inner(
        &self,
        file_name: &str,
        data: Vec<u8>,
        start: Instant,
    ) -> Result<UploadReport, IngestError> {
        let kind = FileKind::from_file_name(file_name)?;
        let max = self.config.ingestion.max_upload_bytes;
        if data.len() as u64 > max {
            return Err(LoadError::TooLarge {
                size: data.len() as u64,
                max,
            }
            .into());
        }
        let stored_name = sanitize_filename(file_name)?;

        let guard = self.session.begin_build()?;
        tracing::info!(file = %stored_name, kind = %kind, bytes = data.len(), "building corpus");

        let checksum = calculate_checksum(&data);
        let upload_dir = self.config.upload_dir();
        let name = stored_name.clone();
        let path: PathBuf =
            tokio::task::spawn_blocking(move || store_upload(&upload_dir, &name, &data))
                .await
                .map_err(|e| LoadError::IoError(std::io::Error::other(e)))??;

        let limit = self.config.ingestion.timeout_secs;
        let tracker = StageTracker::default();
        let run = self.pipeline.run_tracked(path, kind, &tracker);
        let output = timeout(Duration::from_secs(limit), run)
            .await
            .map_err(|_| IngestError::Timeout {
                secs: limit,
                stage: tracker.current(),
            })??;

        let documents = output.documents;
        let retriever = Retriever::new(
            Arc::new(output.index),
            Arc::clone(&self.embedder),
            self.config.retrieval.default_k,
            self.retry.clone(),
        );
        let corpus = guard.publish(CorpusBuild {
            file_name: stored_name,
            checksum,
            documents,
            retriever,
            synthesizer: self.synthesizer.clone(),
        });

        Ok(UploadReport {
            file_name: corpus.info.file_name.clone(),
            checksum: corpus.info.checksum.clone(),
            documents,
            chunks: corpus.info.chunks,
            vectors: corpus.retriever.index().len(),
            version: corpus.info.version,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Answer a question from the corpus that is ready when the call starts.
    pub async fn query(&self, question: &str, options: QueryOptions) -> Result<Answer, QueryError> {
        let start = Instant::now();
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let corpus = self.session.snapshot()?;

        let limit = self.config.retrieval.query_timeout_secs;
        let run = async {
            let hits = corpus.retriever.retrieve(question, options.k).await?;
            let synthesis = corpus.synthesizer.synthesize(question, &hits).await?;
            Ok::<_, QueryError>((hits, synthesis))
        };
        let (hits, synthesis) = timeout(Duration::from_secs(limit), run)
            .await
            .map_err(|_| QueryError::Timeout(limit))??;

        tracing::debug!(
            version = corpus.info.version,
            hits = hits.len(),
            "question answered"
        );

        Ok(Answer {
            question: question.to_string(),
            answer: synthesis.answer,
            sources: if options.include_sources { hits } else { Vec::new() },
            context: synthesis.context,
            corpus_version: corpus.info.version,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    pub fn health(&self) -> ServiceHealth {
        ServiceHealth {
            message: "Log analysis service is running".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            session: self.session.status(),
            embedding_model: self.embedder.model().to_string(),
            completion_model: self.synthesizer.model().to_string(),
        }
    }
}
