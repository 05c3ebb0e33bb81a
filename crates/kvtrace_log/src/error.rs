//! Stream errors.

use std::path::PathBuf;

/// Errors raised while opening, decoding, or writing a trace
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Trace file could not be opened
    #[error("Cannot open trace {path}: {source}")]
    Open {
        /// Trace path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Trace file does not start with the gzip magic
    #[error("Trace {path} is not gzip-compressed")]
    NotGzip {
        /// Trace path
        path: PathBuf,
    },

    /// Malformed record; ends the stream
    #[error("Decode error after {record} records: {reason}")]
    Decode {
        /// Records decoded successfully before the failure
        record: u64,
        /// Decoder message
        reason: String,
    },

    /// Decoder thread could not be started
    #[error("Cannot spawn decoder thread: {0}")]
    Spawn(std::io::Error),

    /// Write failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization failure
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = StreamError::Decode {
            record: 3,
            reason: "EOF while parsing".to_string(),
        };
        assert_eq!(err.to_string(), "Decode error after 3 records: EOF while parsing");
    }

    #[test]
    fn test_not_gzip_display() {
        let err = StreamError::NotGzip {
            path: PathBuf::from("/tmp/wal.json.gz"),
        };
        assert!(err.to_string().contains("not gzip"));
    }
}
