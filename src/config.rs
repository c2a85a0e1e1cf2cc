use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tunables for ingestion and scheduling. Every field has a default, so a
/// config file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestConfig {
    /// Lower-case extensions accepted by `validate_file`.
    pub allowed_extensions: Vec<String>,
    /// Hard upper bound on file size in bytes.
    pub max_file_size: u64,
    /// Files above this size are accepted with a warning.
    pub large_file_warning: u64,
    /// Bytes per read call; cancellation is checked between blocks.
    pub read_block_size: usize,
    /// Row count above which the background worker is preferred.
    pub worker_threshold: usize,
    /// Rows per chunk on the main-thread strategy.
    pub chunk_size: usize,
    /// Set to false to never spawn the worker thread.
    pub enable_worker: bool,
    /// String columns with at most this many distinct values get a select filter.
    pub select_threshold: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: [
                "xlsx", "xlsm", "xls", "xlsb", "ods", "csv", "json", "parquet", "pq",
            ]
            .iter()
            .map(|e| e.to_string())
            .collect(),
            max_file_size: 50 * 1024 * 1024,
            large_file_warning: 10 * 1024 * 1024,
            read_block_size: 64 * 1024,
            worker_threshold: 10_000,
            chunk_size: 5_000,
            enable_worker: true,
            select_threshold: 20,
        }
    }
}

impl IngestConfig {
    /// Load overrides from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: IngestConfig = serde_json::from_str(&text).context("parsing config JSON")?;
        anyhow::ensure!(config.chunk_size > 0, "chunkSize must be positive");
        anyhow::ensure!(config.read_block_size > 0, "readBlockSize must be positive");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workerThreshold": 50, "enableWorker": false}}"#).unwrap();

        let config = IngestConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.worker_threshold, 50);
        assert!(!config.enable_worker);
        assert_eq!(config.chunk_size, IngestConfig::default().chunk_size);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunkSize": 0}}"#).unwrap();
        assert!(IngestConfig::from_json_file(file.path()).is_err());
    }
}
