use std::path::Path;

use crate::error::LoadError;
use crate::models::{Document, Metadata};

/// Load a CSV file, one document per data row.
///
/// Row 1 holds the headers. Each row becomes newline-joined
/// `header: value` lines in column order. Short rows are padded with empty
/// values; values past the last header are kept under `column_<n>`
/// (1-based position).
pub(super) fn load_csv(path: &Path, source: &str) -> Result<Vec<Document>, LoadError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut records = reader.byte_records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record?
            .iter()
            .map(|field| String::from_utf8_lossy(field).trim().to_string())
            .collect(),
        None => return Ok(Vec::new()),
    };
    let header_list = headers.join(",");

    let mut documents = Vec::new();
    for record in records {
        let record = record?;
        let values: Vec<String> = record
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        if values.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let row = documents.len() + 1;
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), source.to_string());
        metadata.insert("kind".to_string(), "csv".to_string());
        metadata.insert("row".to_string(), row.to_string());
        metadata.insert("headers".to_string(), header_list.clone());

        documents.push(Document::new(
            source,
            row,
            row_text(&headers, &values),
            metadata,
        ));
    }

    Ok(documents)
}

fn row_text(headers: &[String], values: &[String]) -> String {
    let columns = headers.len().max(values.len());
    (0..columns)
        .map(|i| {
            let value = values.get(i).map(String::as_str).unwrap_or("");
            match headers.get(i) {
                Some(header) => format!("{header}: {value}"),
                None => format!("column_{}: {value}", i + 1),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(content: &str) -> Vec<Document> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        std::fs::write(&path, content).unwrap();
        load_csv(&path, "events.csv").unwrap()
    }

    #[test]
    fn test_rows_become_documents() {
        let docs = load_str(
            "time,level,msg\n\
             10:00,INFO,service started\n\
             10:01,WARN,disk at 91%\n\
             10:02,ERROR,\"connection reset, retrying\"\n",
        );

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].text, "time: 10:00\nlevel: INFO\nmsg: service started");
        assert_eq!(
            docs[2].text,
            "time: 10:02\nlevel: ERROR\nmsg: connection reset, retrying"
        );
        assert_eq!(docs[1].metadata["row"], "2");
        assert_eq!(docs[1].metadata["headers"], "time,level,msg");
        assert_eq!(docs[1].metadata["kind"], "csv");
        assert_ne!(docs[0].id, docs[1].id);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let docs = load_str("time,level,msg\n10:00,INFO\n");
        assert_eq!(docs[0].text, "time: 10:00\nlevel: INFO\nmsg: ");
    }

    #[test]
    fn test_extra_values_get_synthetic_headers() {
        let docs = load_str("time,level\n10:00,INFO,unexpected,more\n");
        assert_eq!(
            docs[0].text,
            "time: 10:00\nlevel: INFO\ncolumn_3: unexpected\ncolumn_4: more"
        );
    }

    #[test]
    fn test_header_only_and_empty_files() {
        assert!(load_str("time,level,msg\n").is_empty());
        assert!(load_str("").is_empty());
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let docs = load_str("a,b\n1,2\n,\n3,4\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].text, "a: 3\nb: 4");
        assert_eq!(docs[1].metadata["row"], "2");
    }
}
