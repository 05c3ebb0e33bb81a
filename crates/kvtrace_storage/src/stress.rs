//! Direct stress workload.
//!
//! Hammers a fresh store with large sequential autocommit writes, one write
//! transaction per key. Useful to check whether a store build survives heavy
//! page churn at all before bothering with a trace replay.

use crate::error::StoreError;
use crate::store::{KvStore, StoreConfig};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stress workload configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Number of keys written
    pub total: u64,
    /// Keys per logged chunk
    pub chunk: u64,
    /// Size of every value in bytes
    pub value_size: usize,
    /// Database file name inside the work directory
    pub file_name: String,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            total: 272,
            chunk: 16,
            value_size: 1 << 20, // 1 MiB
            file_name: "direct.redb".to_string(),
        }
    }
}

/// Result of a stress run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressReport {
    /// Database file written
    pub path: PathBuf,
    /// Keys written
    pub written: u64,
}

/// Run the direct workload in `workdir`, starting from an empty database
///
/// # Errors
///
/// Returns the first store failure
pub fn run_direct(workdir: &Path, config: &StressConfig) -> Result<StressReport, StoreError> {
    let path = workdir.join(&config.file_name);
    match std::fs::remove_file(&path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed previous database"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    tracing::info!(path = %path.display(), "opening");
    let store = KvStore::open(&path, &StoreConfig::default())?;
    let value = vec![0u8; config.value_size];
    let chunk = config.chunk.max(1);

    let mut written = 0u64;
    let mut start = 0u64;
    while start < config.total {
        let end = start.saturating_add(chunk).min(config.total);
        tracing::info!(start, end, "writing chunk");
        for i in start..end {
            tracing::debug!(i, "put");
            store.put(&i.to_be_bytes(), &value)?;
            written += 1;
        }
        start = end;
    }

    Ok(StressReport { path, written })
}
