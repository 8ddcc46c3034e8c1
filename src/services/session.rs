//! The single active corpus and its build lifecycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::SessionError;
use crate::models::{CorpusInfo, SessionStatus};
use crate::services::retriever::Retriever;
use crate::services::synthesizer::AnswerSynthesizer;

/// A built, queryable corpus. Never mutated once published.
pub struct Corpus {
    pub info: CorpusInfo,
    pub retriever: Retriever,
    pub synthesizer: AnswerSynthesizer,
}

/// Everything an ingestion run produces, before it gets a version.
pub struct CorpusBuild {
    pub file_name: String,
    pub checksum: String,
    pub documents: usize,
    pub retriever: Retriever,
    pub synthesizer: AnswerSynthesizer,
}

/// Owns at most one ready corpus and admits one build at a time.
///
/// Queries take an `Arc` snapshot of the ready corpus, so a publish never
/// disturbs a query already in flight, and a build in progress keeps
/// serving the previous version.
#[derive(Default)]
pub struct CorpusSession {
    current: RwLock<Option<Arc<Corpus>>>,
    building: AtomicBool,
    last_version: AtomicU64,
}

impl CorpusSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the building state. Fails with `Busy` while another build runs.
    pub fn begin_build(&self) -> Result<BuildGuard<'_>, SessionError> {
        self.building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy)?;
        Ok(BuildGuard {
            session: self,
            published: false,
        })
    }

    /// The ready corpus, if one has been published.
    pub fn snapshot(&self) -> Result<Arc<Corpus>, SessionError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SessionError::NoCorpusLoaded)
    }

    pub fn status(&self) -> SessionStatus {
        let serving = self.snapshot().ok().map(|c| c.info.clone());
        if self.is_building() {
            return SessionStatus::Building { serving };
        }
        match serving {
            Some(corpus) => SessionStatus::Ready { corpus },
            None => SessionStatus::Empty,
        }
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }
}

/// Exclusive right to replace the session's corpus.
///
/// Dropping the guard without publishing leaves the previous corpus in
/// place.
pub struct BuildGuard<'a> {
    session: &'a CorpusSession,
    published: bool,
}

impl BuildGuard<'_> {
    /// Atomically install the build as the new ready corpus.
    pub fn publish(mut self, build: CorpusBuild) -> Arc<Corpus> {
        let version = self.session.last_version.fetch_add(1, Ordering::AcqRel) + 1;
        let index = build.retriever.index();
        let info = CorpusInfo {
            version,
            file_name: build.file_name,
            checksum: build.checksum,
            documents: build.documents,
            chunks: index.len(),
            dimension: index.dimension(),
            built_at: chrono::Utc::now().to_rfc3339(),
        };
        let corpus = Arc::new(Corpus {
            info,
            retriever: build.retriever,
            synthesizer: build.synthesizer,
        });

        *self
            .session
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&corpus));
        self.published = true;

        tracing::info!(
            version,
            file = %corpus.info.file_name,
            chunks = corpus.info.chunks,
            "corpus published"
        );
        corpus
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if !self.published {
            tracing::warn!("corpus build abandoned; previous corpus kept");
        }
        self.session.building.store(false, Ordering::Release);
    }
}
