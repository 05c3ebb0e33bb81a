//! Acquisition errors.

use std::path::PathBuf;

/// Failure while acquiring or preparing replay inputs
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Artifact absent locally and no source configured
    #[error("{path} does not exist and no base URL is configured")]
    MissingArtifact {
        /// Expected local path
        path: PathBuf,
    },

    /// Server answered with an error status
    #[error("Bad response for {url:?}: {status}")]
    BadStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Snapshot and working copy resolve to the same file
    #[error("Working copy {path} would overwrite the snapshot")]
    SameFile {
        /// Shared path
        path: PathBuf,
    },
}

impl FetchError {
    pub(crate) fn io(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_status_display() {
        let err = FetchError::BadStatus {
            url: "http://example.invalid/wal.json.gz".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Bad response for \"http://example.invalid/wal.json.gz\": 404"
        );
    }
}
