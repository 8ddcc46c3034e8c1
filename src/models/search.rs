//! Query and answer models.

use serde::{Deserialize, Serialize};

use super::document::{Chunk, Metadata};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Per-request query options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Number of chunks to retrieve; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,

    /// Return the ranked supporting chunks with the answer.
    #[serde(default)]
    pub include_sources: bool,
}

/// A ranked search hit, detached from the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: u64,
    pub document_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity with the query (-1.0..=1.0)
    pub score: f32,
}

impl RetrievedChunk {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.id,
            document_id: chunk.source_document_id.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
            score,
        }
    }

    /// Human-readable location, e.g. `auth.log#3`.
    pub fn location(&self) -> String {
        let source = self
            .metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or(&self.document_id);
        match self.metadata.get("row") {
            Some(row) => format!("{} row {}", source, row),
            None => format!("{}#{}", source, self.chunk_index),
        }
    }
}

/// How the retrieved chunks fit into the context budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    /// Chunks that made it into the prompt (fully or truncated).
    pub included: usize,
    /// Lowest-ranked chunks left out for lack of budget.
    pub dropped: usize,
    /// Whether the last included chunk had its tail cut.
    pub truncated: bool,
}

/// Answer to a question against the loaded corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<RetrievedChunk>,
    pub context: ContextStats,
    pub corpus_version: u64,
    pub duration_ms: u64,
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub file_name: String,
    pub checksum: String,
    pub documents: usize,
    pub chunks: usize,
    pub vectors: usize,
    pub version: u64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_retrieved_chunk_location() {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), "auth.log".to_string());
        let hit = RetrievedChunk {
            chunk_id: 3,
            document_id: "abc".to_string(),
            chunk_index: 1,
            text: "failed password".to_string(),
            metadata: metadata.clone(),
            score: 0.5,
        };
        assert_eq!(hit.location(), "auth.log#1");

        metadata.insert("row".to_string(), "2".to_string());
        let row_hit = RetrievedChunk { metadata, ..hit };
        assert_eq!(row_hit.location(), "auth.log row 2");
    }

    #[test]
    fn test_query_options_defaults() {
        let options: QueryOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.k, None);
        assert!(!options.include_sources);
    }
}
