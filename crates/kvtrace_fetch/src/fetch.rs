//! Download-if-absent for replay inputs.

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Acquisition configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// URL prefix artifacts are fetched from; file names are appended as-is
    pub base_url: Option<String>,
    /// Canonical session snapshot
    pub snapshot_name: String,
    /// Compressed operation trace
    pub trace_name: String,
    /// Throwaway copy of the snapshot the replay runs against
    pub working_name: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            snapshot_name: "session.redb".to_string(),
            trace_name: "wal.json.gz".to_string(),
            working_name: "crash.redb".to_string(),
        }
    }
}

/// Local paths of the replay inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// Canonical snapshot, never opened for writing
    pub snapshot: PathBuf,
    /// Compressed trace
    pub trace: PathBuf,
    /// Working copy location
    pub working: PathBuf,
}

impl Artifacts {
    /// Paths for `config` inside `workdir`
    #[must_use]
    pub fn locate(workdir: &Path, config: &FetchConfig) -> Self {
        Self {
            snapshot: workdir.join(&config.snapshot_name),
            trace: workdir.join(&config.trace_name),
            working: workdir.join(&config.working_name),
        }
    }
}

/// Ensure snapshot and trace exist in `workdir`, downloading missing ones
///
/// # Errors
///
/// Returns error if a missing artifact cannot be downloaded
pub async fn ensure_artifacts(workdir: &Path, config: &FetchConfig) -> Result<Artifacts, FetchError> {
    ensure_artifacts_with(&reqwest::Client::new(), workdir, config).await
}

/// [`ensure_artifacts`] over a caller-provided HTTP client
///
/// # Errors
///
/// Returns error if a missing artifact cannot be downloaded
pub async fn ensure_artifacts_with(
    client: &reqwest::Client,
    workdir: &Path,
    config: &FetchConfig,
) -> Result<Artifacts, FetchError> {
    tokio::fs::create_dir_all(workdir)
        .await
        .map_err(FetchError::io(workdir))?;

    let artifacts = Artifacts::locate(workdir, config);
    for (name, path) in [
        (&config.snapshot_name, &artifacts.snapshot),
        (&config.trace_name, &artifacts.trace),
    ] {
        ensure_file(client, config, name, path).await?;
    }
    Ok(artifacts)
}

async fn ensure_file(
    client: &reqwest::Client,
    config: &FetchConfig,
    name: &str,
    path: &Path,
) -> Result<(), FetchError> {
    if tokio::fs::try_exists(path).await.map_err(FetchError::io(path))? {
        tracing::info!(path = %path.display(), "file already exists");
        return Ok(());
    }
    let Some(base_url) = &config.base_url else {
        return Err(FetchError::MissingArtifact {
            path: path.to_path_buf(),
        });
    };

    let url = format!("{}{}", base_url, name);
    let part = part_path(path);
    match download(client, &url, &part).await {
        Ok(bytes) => {
            tokio::fs::rename(&part, path)
                .await
                .map_err(FetchError::io(path))?;
            tracing::info!(url = %url, bytes, "downloaded");
            Ok(())
        }
        Err(err) => {
            let _ = tokio::fs::remove_file(&part).await;
            tracing::error!(url = %url, error = %err, "download failed");
            Err(err)
        }
    }
}

async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64, FetchError> {
    tracing::info!(url, "downloading");
    let mut resp = client.get(url).send().await?;
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(FetchError::BadStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(FetchError::io(dest))?;
    let mut bytes = 0u64;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await.map_err(FetchError::io(dest))?;
        bytes += chunk.len() as u64;
    }
    file.sync_all().await.map_err(FetchError::io(dest))?;
    Ok(bytes)
}

/// `<path>.part`, where an in-flight download lands
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
