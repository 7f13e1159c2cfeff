//! `file-info` extractor — size, MIME type and modification time

use super::traits::{ExtractError, Extractor};
use crate::job::JobRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

pub const FILE_SIZE: &str = "file_size";
pub const MIME_TYPE: &str = "mime_type";
pub const MODIFIED_AT: &str = "modified_at";

/// Records filesystem metadata; never reads file contents.
#[derive(Debug, Default)]
pub struct FileInfoExtractor;

impl FileInfoExtractor {
    pub const NAME: &'static str = "file-info";

    pub fn new() -> Self {
        Self
    }
}

/// Detect MIME type from file extension.
fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("md") | Some("markdown") => "text/markdown",
        Some("txt") | Some("log") => "text/plain",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("jsonl") | Some("ndjson") => "application/x-ndjson",
        Some("avro") => "application/avro",
        Some("parquet") => "application/vnd.apache.parquet",
        Some("yaml") | Some("yml") => "text/yaml",
        Some("toml") => "text/toml",
        Some("gz") => "application/gzip",
        Some("zip") => "application/zip",
        Some("tar") => "application/x-tar",
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl Extractor for FileInfoExtractor {
    async fn extract(
        &self,
        path: &Path,
        job: &mut JobRecord,
        _extractor: &str,
    ) -> Result<(), ExtractError> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(ExtractError::Content(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        job.set_field(FILE_SIZE, meta.len(), false);
        job.set_field(MIME_TYPE, detect_mime_type(path), false);
        if let Ok(modified) = meta.modified() {
            let modified: DateTime<Utc> = modified.into();
            job.set_field(MODIFIED_AT, modified.to_rfc3339(), false);
        }
        if meta.len() == 0 {
            job.warning(format!("{} is empty", path.display()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::INDEXING_WARNING;
    use serde_json::json;

    fn job() -> JobRecord {
        JobRecord::from_source(json!({"id": "1"})).unwrap()
    }

    #[test]
    fn mime_by_extension() {
        assert_eq!(detect_mime_type(Path::new("a/b.JSON")), "application/json");
        assert_eq!(detect_mime_type(Path::new("data.avro")), "application/avro");
        assert_eq!(detect_mime_type(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn records_size_type_and_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, b"a,b\n1,2\n").unwrap();

        let mut job = job();
        FileInfoExtractor::new()
            .extract(&path, &mut job, FileInfoExtractor::NAME)
            .await
            .unwrap();

        assert_eq!(job.get_field(FILE_SIZE), Some(&json!(8)));
        assert_eq!(job.get_field(MIME_TYPE), Some(&json!("text/csv")));
        assert!(job.get_field(MODIFIED_AT).is_some());
        assert!(job.get_field(INDEXING_WARNING).is_none());
    }

    #[tokio::test]
    async fn empty_file_gets_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, b"").unwrap();

        let mut job = job();
        FileInfoExtractor::new()
            .extract(&path, &mut job, FileInfoExtractor::NAME)
            .await
            .unwrap();

        let warning = job.get_field(INDEXING_WARNING).unwrap().as_str().unwrap();
        assert!(warning.ends_with("is empty"));
    }

    #[tokio::test]
    async fn directory_is_a_content_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job();
        let err = FileInfoExtractor::new()
            .extract(dir.path(), &mut job, FileInfoExtractor::NAME)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Content(_)));
    }
}
