//! File Intake: spools uploaded files to local disk and turns them into batch items.
//!
//! No size or type validation happens here. The media type is taken from the upload
//! when present, otherwise guessed from the file extension.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::scoring::batch::{BatchItem, SourceHandle};

const GENERIC_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("failed to spool {name} to {dir}: {source}")]
    Spool {
        name: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One file as received from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

/// Declared media type, or a guess from the extension when missing or generic.
pub fn resolve_mime(name: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(m) if !m.is_empty() && !m.eq_ignore_ascii_case(GENERIC_MIME) => m.to_ascii_lowercase(),
        _ => mime_guess::from_path(name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Writes each file under `dir` and returns handles in the same order.
pub async fn spool_files(
    dir: &Path,
    files: Vec<IncomingFile>,
) -> Result<Vec<SourceHandle>, IntakeError> {
    let mut handles = Vec::with_capacity(files.len());

    for file in files {
        let spool_err = |source: std::io::Error| IntakeError::Spool {
            name: file.name.clone(),
            dir: dir.to_path_buf(),
            source,
        };

        let suffix = Path::new(&file.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let path = tempfile::Builder::new()
            .prefix("resume-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(spool_err)?
            .into_temp_path()
            .keep()
            .map_err(|e| spool_err(e.error))?;

        tokio::fs::write(&path, &file.bytes)
            .await
            .map_err(spool_err)?;

        debug!("Spooled {} ({} bytes) to {}", file.name, file.bytes.len(), path.display());

        handles.push(SourceHandle {
            mime_type: resolve_mime(&file.name, file.mime_type.as_deref()),
            size_bytes: file.bytes.len() as u64,
            name: file.name,
            path,
        });
    }

    Ok(handles)
}

/// Wraps each handle in a fresh `Ready` item with its own id.
pub fn intake(handles: Vec<SourceHandle>) -> Vec<BatchItem> {
    handles.into_iter().map(BatchItem::new).collect()
}
