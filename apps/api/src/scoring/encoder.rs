//! Content Encoder: reads a spooled file and returns its base64 encoding.
//!
//! Single attempt, no retry. The caller decides whether a read failure is fatal.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use thiserror::Error;

use crate::scoring::batch::SourceHandle;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Transportable file content: base64 text plus its media type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedContent {
    pub data: String,
    pub mime_type: String,
}

impl EncodedContent {
    /// Stand-in used when the file could not be read.
    pub fn empty(mime_type: &str) -> Self {
        Self {
            data: String::new(),
            mime_type: mime_type.to_string(),
        }
    }

    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: mime_type.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decodes back to raw bytes. Invalid base64 yields `None`.
    pub fn decode(&self) -> Option<Vec<u8>> {
        STANDARD.decode(&self.data).ok()
    }
}

pub async fn encode(source: &SourceHandle) -> Result<EncodedContent, ReadError> {
    let bytes = tokio::fs::read(&source.path)
        .await
        .map_err(|e| ReadError::Io {
            path: source.path.clone(),
            source: e,
        })?;
    Ok(EncodedContent::from_bytes(&bytes, &source.mime_type))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn handle_for(path: PathBuf, mime_type: &str) -> SourceHandle {
        SourceHandle {
            name: "resume.pdf".to_string(),
            size_bytes: 0,
            mime_type: mime_type.to_string(),
            path,
        }
    }

    #[tokio::test]
    async fn test_encode_reads_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.4 hello").unwrap();

        let content = encode(&handle_for(file.path().to_path_buf(), "application/pdf"))
            .await
            .unwrap();

        assert_eq!(content.mime_type, "application/pdf");
        assert_eq!(content.data, STANDARD.encode(b"%PDF-1.4 hello"));
        assert_eq!(content.decode().unwrap(), b"%PDF-1.4 hello");
    }

    #[tokio::test]
    async fn test_encode_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.pdf");

        let err = encode(&handle_for(missing.clone(), "application/pdf"))
            .await
            .unwrap_err();

        let ReadError::Io { path, .. } = err;
        assert_eq!(path, missing);
    }

    #[tokio::test]
    async fn test_encode_empty_file_is_empty_content() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let content = encode(&handle_for(file.path().to_path_buf(), "text/plain"))
            .await
            .unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_empty_keeps_mime_type() {
        let content = EncodedContent::empty("application/pdf");
        assert!(content.is_empty());
        assert_eq!(content.mime_type, "application/pdf");
    }
}
