//! Document loaders for uploaded files.
//!
//! A loader turns one stored upload into an ordered list of documents. The
//! file kind is decided from the extension before any bytes are read.

mod csv;
mod text;

use std::path::Path;

use crate::error::LoadError;
use crate::models::Document;
use crate::utils::file::file_extension;

/// Upload kinds understood by the loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Log,
    Markdown,
    Csv,
}

impl FileKind {
    /// Classify an upload by its extension.
    pub fn from_file_name(name: &str) -> Result<Self, LoadError> {
        match file_extension(name).as_deref() {
            Some("txt" | "text") => Ok(FileKind::Text),
            Some("log") => Ok(FileKind::Log),
            Some("md" | "markdown") => Ok(FileKind::Markdown),
            Some("csv") => Ok(FileKind::Csv),
            Some(other) => Err(LoadError::UnsupportedFormat(format!(".{other}"))),
            None => Err(LoadError::UnsupportedFormat(format!(
                "{name} (no file extension)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Text => "text",
            FileKind::Log => "log",
            FileKind::Markdown => "markdown",
            FileKind::Csv => "csv",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load the documents of a stored upload.
pub fn load(path: &Path, kind: FileKind) -> Result<Vec<Document>, LoadError> {
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| LoadError::InvalidFileName(path.display().to_string()))?;

    let documents = match kind {
        FileKind::Text | FileKind::Log | FileKind::Markdown => {
            text::load_text(path, &source, kind)?
        }
        FileKind::Csv => csv::load_csv(path, &source)?,
    };

    tracing::debug!(source, kind = %kind, documents = documents.len(), "loaded upload");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(FileKind::from_file_name("notes.txt").unwrap(), FileKind::Text);
        assert_eq!(FileKind::from_file_name("auth.LOG").unwrap(), FileKind::Log);
        assert_eq!(FileKind::from_file_name("README.md").unwrap(), FileKind::Markdown);
        assert_eq!(FileKind::from_file_name("events.csv").unwrap(), FileKind::Csv);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            FileKind::from_file_name("report.pdf"),
            Err(LoadError::UnsupportedFormat(ext)) if ext == ".pdf"
        ));
        assert!(FileKind::from_file_name("Makefile").is_err());
    }

    #[test]
    fn test_load_dispatches_on_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "line one\nline two\n").unwrap();

        let docs = load(&path, FileKind::Log).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["source"], "app.log");
        assert_eq!(docs[0].metadata["kind"], "log");
    }
}
