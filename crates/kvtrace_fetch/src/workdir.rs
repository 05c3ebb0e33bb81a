//! Working copy of the session snapshot.

use crate::error::FetchError;
use crate::fetch::Artifacts;
use std::path::PathBuf;

/// Replace the working copy with a fresh copy of the snapshot
///
/// # Errors
///
/// Returns error if the copy fails or both paths name the same file
pub async fn prepare_working_copy(artifacts: &Artifacts) -> Result<PathBuf, FetchError> {
    if artifacts.snapshot == artifacts.working {
        return Err(FetchError::SameFile {
            path: artifacts.working.clone(),
        });
    }
    let bytes = tokio::fs::copy(&artifacts.snapshot, &artifacts.working)
        .await
        .map_err(FetchError::io(&artifacts.working))?;
    tracing::debug!(
        from = %artifacts.snapshot.display(),
        to = %artifacts.working.display(),
        bytes,
        "working copy ready"
    );
    Ok(artifacts.working.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;

    #[tokio::test]
    async fn test_working_copy_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::locate(dir.path(), &FetchConfig::default());
        std::fs::write(&artifacts.snapshot, b"pristine").unwrap();

        let working = prepare_working_copy(&artifacts).await.unwrap();
        assert_eq!(std::fs::read(&working).unwrap(), b"pristine");

        std::fs::write(&working, b"mutated by replay").unwrap();
        prepare_working_copy(&artifacts).await.unwrap();
        assert_eq!(std::fs::read(&working).unwrap(), b"pristine");
        assert_eq!(std::fs::read(&artifacts.snapshot).unwrap(), b"pristine");
    }

    #[tokio::test]
    async fn test_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::locate(dir.path(), &FetchConfig::default());
        assert!(matches!(
            prepare_working_copy(&artifacts).await,
            Err(FetchError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_same_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = FetchConfig {
            working_name: "session.redb".to_string(),
            ..Default::default()
        };
        let artifacts = Artifacts::locate(dir.path(), &config);
        assert!(matches!(
            prepare_working_copy(&artifacts).await,
            Err(FetchError::SameFile { .. })
        ));
    }
}
