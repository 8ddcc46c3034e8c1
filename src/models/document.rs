use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// String metadata attached to documents and chunks.
pub type Metadata = BTreeMap<String, String>;

/// A loaded unit of text, such as a whole log file or one CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A bounded slice of a document; the unit of vector indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk in the corpus, assigned in split order.
    pub id: u64,
    pub source_document_id: String,
    pub text: String,
    /// Offset of the first character within the document, in chars.
    pub start_offset: usize,
    /// Position of the chunk within its document.
    pub chunk_index: u32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,
    pub metadata: Metadata,
}

impl Document {
    /// Stable id derived from the source name and the document's ordinal
    /// within that source.
    pub fn generate_id(source: &str, ordinal: usize) -> String {
        use sha2::{Digest, Sha256};
        let input = format!("{}:{}", source, ordinal);
        let hash = Sha256::digest(input.as_bytes());
        hex::encode(&hash[..16])
    }

    pub fn new(source: &str, ordinal: usize, text: String, metadata: Metadata) -> Self {
        Self {
            id: Self::generate_id(source, ordinal),
            text,
            metadata,
        }
    }
}

impl Chunk {
    pub fn from_document(
        document: &Document,
        id: u64,
        text: String,
        start_offset: usize,
        chunk_index: u32,
    ) -> Self {
        let mut metadata = document.metadata.clone();
        metadata.insert("chunk_index".to_string(), chunk_index.to_string());
        Self {
            id,
            source_document_id: document.id.clone(),
            text,
            start_offset,
            chunk_index,
            vector: Vec::new(),
            metadata,
        }
    }

    /// Source name recorded by the loader, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}
