use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::error::{FileReadError, ValidationError};
use super::progress::{ProgressEvent, ProgressSink, ProgressStage};
use crate::config::IngestConfig;

// ---------------------------------------------------------------------------
// File handle + validation
// ---------------------------------------------------------------------------

/// What the caller knows about a file before reading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub name: String,
    pub size: u64,
    /// Declared MIME type, if the host supplied one.
    pub mime: Option<String>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        FileHandle {
            name: name.into(),
            size,
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Build a handle from file-system metadata.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let size = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(FileHandle::new(name, size))
    }

    /// Lower-cased extension without the dot, or `""`.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
    }
}

/// Outcome of pre-read validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileValidation {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FileValidation {
    pub fn into_result(self) -> Result<Vec<String>, ValidationError> {
        if self.ok {
            Ok(self.warnings)
        } else {
            Err(ValidationError {
                reasons: self.errors,
            })
        }
    }
}

/// MIME families that are plausible for each extension.
fn expected_mime_fragments(ext: &str) -> &'static [&'static str] {
    match ext {
        "csv" => &["csv", "text/plain", "excel"],
        "json" => &["json", "text/plain"],
        "parquet" | "pq" => &["parquet", "octet-stream"],
        "ods" => &["opendocument", "octet-stream"],
        _ => &["spreadsheet", "excel", "officedocument", "octet-stream", "zip"],
    }
}

/// Check extension, size and MIME type before any read.
pub fn validate_file(handle: &FileHandle, config: &IngestConfig) -> FileValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let ext = handle.extension();

    if ext.is_empty() {
        errors.push(format!("'{}' has no file extension", handle.name));
    } else if !config.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        errors.push(format!(
            "unsupported file type .{ext} (expected one of: {})",
            config.allowed_extensions.join(", ")
        ));
    }

    if handle.size == 0 {
        errors.push("file is empty".to_string());
    } else if handle.size > config.max_file_size {
        errors.push(format!(
            "file is {} bytes, above the {} byte limit",
            handle.size, config.max_file_size
        ));
    } else if handle.size > config.large_file_warning {
        warnings.push(format!(
            "large file ({} bytes); parsing may take a while",
            handle.size
        ));
    }

    if let Some(mime) = handle.mime.as_deref().filter(|m| !m.is_empty()) {
        let mime = mime.to_ascii_lowercase();
        if !ext.is_empty() && !expected_mime_fragments(&ext).iter().any(|f| mime.contains(f)) {
            warnings.push(format!("MIME type '{mime}' does not match extension .{ext}"));
        }
    }

    FileValidation {
        ok: errors.is_empty(),
        errors,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Cancellable read
// ---------------------------------------------------------------------------

/// Cloneable abort flag. Only honoured while bytes are being read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read every byte of `reader` in blocks, reporting `reading` progress
/// against `handle.size` and checking `cancel` before each block.
pub fn read_file<R: Read>(
    handle: &FileHandle,
    mut reader: R,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
    config: &IngestConfig,
) -> Result<Vec<u8>, FileReadError> {
    let expected = usize::try_from(handle.size).unwrap_or(usize::MAX);
    let mut bytes = Vec::with_capacity(expected.min(config.max_file_size as usize));
    let mut block = vec![0u8; config.read_block_size.max(1)];

    loop {
        if cancel.is_cancelled() {
            debug!("read of '{}' aborted after {} bytes", handle.name, bytes.len());
            return Err(FileReadError::Aborted);
        }
        let n = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FileReadError::Io(e)),
        };
        bytes.extend_from_slice(&block[..n]);
        progress.report(ProgressEvent::percent(
            ProgressStage::Reading,
            bytes.len(),
            expected.max(bytes.len()),
        ));
    }

    debug!("read {} bytes from '{}'", bytes.len(), handle.name);
    Ok(bytes)
}
