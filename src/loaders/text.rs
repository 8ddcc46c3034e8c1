use std::path::Path;

use super::FileKind;
use crate::error::LoadError;
use crate::models::{Document, Metadata};

/// Load a whole text file as one document. Invalid UTF-8 is replaced.
pub(super) fn load_text(
    path: &Path,
    source: &str,
    kind: FileKind,
) -> Result<Vec<Document>, LoadError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), source.to_string());
    metadata.insert("kind".to_string(), kind.as_str().to_string());

    Ok(vec![Document::new(source, 0, text, metadata)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossy_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.txt");
        std::fs::write(&path, b"ok \xff done").unwrap();

        let docs = load_text(&path, "raw.txt", FileKind::Text).unwrap();
        assert_eq!(docs[0].text, "ok \u{fffd} done");
    }

    #[test]
    fn test_empty_file_is_one_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.md");
        std::fs::write(&path, "").unwrap();

        let docs = load_text(&path, "empty.md", FileKind::Markdown).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.is_empty());
    }
}
