//! File utilities for uploads.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// Calculate SHA-256 checksum of raw bytes.
pub fn calculate_checksum(content: &[u8]) -> String {
    let hash = Sha256::digest(content);
    hex::encode(hash)
}

/// Read file bytes with a size limit.
pub fn read_file_bytes(path: &Path, max_size: u64) -> Result<Vec<u8>, LoadError> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(LoadError::TooLarge {
            size: metadata.len(),
            max: max_size,
        });
    }

    Ok(fs::read(path)?)
}

/// Lowercased extension of a file name, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Sanitize an uploaded file name into a single path component.
///
/// Directory parts are stripped and characters that are not allowed in
/// filenames on common operating systems are replaced with hyphens.
pub fn sanitize_filename(name: &str) -> Result<String, LoadError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let sanitized = base
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string();

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return Err(LoadError::InvalidFileName(name.to_string()));
    }
    Ok(sanitized)
}

/// Write an upload into `dir`, returning the stored path.
pub fn store_upload(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf, LoadError> {
    let name = sanitize_filename(file_name)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    fs::write(&path, data)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_checksum() {
        let checksum = calculate_checksum(b"hello world");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, calculate_checksum(b"hello world"));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("auth.LOG").as_deref(), Some("log"));
        assert_eq!(file_extension("data.csv").as_deref(), Some("csv"));
        assert_eq!(file_extension("README"), None);
    }

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("C:\\logs\\app.log").unwrap(), "app.log");
        assert_eq!(sanitize_filename("a:b?.txt").unwrap(), "a-b-.txt");
    }

    #[test]
    fn test_sanitize_filename_rejects_empty() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("logs/").is_err());
        assert!(sanitize_filename("..").is_err());
    }

    #[test]
    fn test_read_file_bytes_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_upload(dir.path(), "big.log", &[b'x'; 64]).unwrap();

        assert_eq!(read_file_bytes(&path, 64).unwrap().len(), 64);
        assert!(matches!(
            read_file_bytes(&path, 10),
            Err(LoadError::TooLarge { size: 64, max: 10 })
        ));
    }
}
