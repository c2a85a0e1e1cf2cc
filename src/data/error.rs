use thiserror::Error;

/// The file was rejected before any byte was read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("file rejected: {}", reasons.join("; "))]
pub struct ValidationError {
    pub reasons: Vec<String>,
}

/// Reading the file's bytes failed.
#[derive(Debug, Error)]
pub enum FileReadError {
    #[error("file read aborted before decoding started")]
    Aborted,
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl FileReadError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, FileReadError::Aborted)
    }
}

/// The bytes could not be decoded into a workbook. Terminal; no partial result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode {format} data: {message}")]
pub struct DecodeError {
    pub format: String,
    pub message: String,
}

impl DecodeError {
    /// Flatten an `anyhow` chain (`outer: inner: cause`) into a decode error.
    pub fn from_anyhow(format: impl Into<String>, err: &anyhow::Error) -> Self {
        DecodeError {
            format: format.into(),
            message: format!("{err:#}"),
        }
    }
}

/// Every terminal failure a parse can surface.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    FileRead(#[from] FileReadError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("row processing failed: {0}")]
    Processing(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_and_io_read_differently() {
        let aborted = FileReadError::Aborted.to_string();
        let io = FileReadError::from(std::io::Error::other("disk gone")).to_string();
        assert_ne!(aborted, io);
        assert!(aborted.contains("aborted"));
        assert!(io.contains("disk gone"));
    }

    #[test]
    fn validation_lists_reasons() {
        let err = ValidationError {
            reasons: vec!["too big".into(), "bad extension".into()],
        };
        assert_eq!(err.to_string(), "file rejected: too big; bad extension");
    }

    #[test]
    fn decode_keeps_context_chain() {
        let inner = anyhow::anyhow!("unexpected EOF").context("reading sheet 'Data'");
        let err = DecodeError::from_anyhow("xlsx", &inner);
        assert_eq!(err.message, "reading sheet 'Data': unexpected EOF");
    }
}
