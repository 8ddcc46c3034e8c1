//! Corpus and session status models.

use serde::{Deserialize, Serialize};

/// Description of a built corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusInfo {
    pub version: u64,
    pub file_name: String,
    pub checksum: String,
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub built_at: String,
}

/// Externally visible state of the corpus session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Empty,
    /// A build is running; `serving` is the version still answering queries.
    Building { serving: Option<CorpusInfo> },
    Ready { corpus: CorpusInfo },
}

impl SessionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SessionStatus::Empty => "empty",
            SessionStatus::Building { .. } => "building",
            SessionStatus::Ready { .. } => "ready",
        }
    }

    /// The corpus currently answering queries, if any.
    pub fn serving(&self) -> Option<&CorpusInfo> {
        match self {
            SessionStatus::Empty => None,
            SessionStatus::Building { serving } => serving.as_ref(),
            SessionStatus::Ready { corpus } => Some(corpus),
        }
    }
}
