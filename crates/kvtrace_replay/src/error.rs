//! Replay errors.
//!
//! Every variant is fatal: the engine stops at the record that raised it.

use crate::engine::ReplayState;
use kvtrace_core::{CoreError, HandleId, OpKind};
use kvtrace_storage::StoreError;
use std::fmt;

/// Kind of live handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Open write transaction
    Batch,
    /// Open read cursor
    Iterator,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => write!(f, "batch"),
            Self::Iterator => write!(f, "iter"),
        }
    }
}

/// Replay failure, tagged with the zero-based record number that raised it
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Record belongs to a different session than the first record
    #[error("Database mismatch at record {seq}: wanted prefix {expected:?}, got {actual:?}")]
    SessionMismatch {
        /// Record number
        seq: u64,
        /// Session id of the first record
        expected: String,
        /// Offending session id
        actual: String,
    },

    /// Record addresses a batch or iterator that is not open
    #[error("Cannot find {kind} {handle} at record {seq}")]
    HandleNotFound {
        /// Record number
        seq: u64,
        /// Kind of handle looked up
        kind: HandleKind,
        /// Handle suffix looked up
        handle: HandleId,
    },

    /// `dbClose` while batches or iterators are still open
    #[error("dbClose at record {seq} with {batches} opened batches and {iterators} opened iters")]
    LeakedResources {
        /// Record number
        seq: u64,
        /// Open batches
        batches: usize,
        /// Open iterators
        iterators: usize,
    },

    /// Write request while a batch holds the single writer; the store would block forever
    #[error("{op} at record {seq} needs the writer held by open batch {batch}")]
    WriterConflict {
        /// Record number
        seq: u64,
        /// Requested operation
        op: OpKind,
        /// Batch holding the writer
        batch: HandleId,
    },

    /// Session id whose handle suffix cannot be extracted
    #[error("Invalid handle at record {seq}: {source}")]
    InvalidHandle {
        /// Record number
        seq: u64,
        /// Extraction failure
        source: CoreError,
    },

    /// Store failure
    #[error("Store error at record {seq}: {source}")]
    Store {
        /// Record number
        seq: u64,
        /// Store error, unchanged
        source: StoreError,
    },

    /// Engine already ran
    #[error("Replay engine is {state}, not idle")]
    NotIdle {
        /// Current state
        state: ReplayState,
    },
}

impl ReplayError {
    /// Record number that raised the error, if any
    #[must_use]
    pub const fn seq(&self) -> Option<u64> {
        match self {
            Self::SessionMismatch { seq, .. }
            | Self::HandleNotFound { seq, .. }
            | Self::LeakedResources { seq, .. }
            | Self::WriterConflict { seq, .. }
            | Self::InvalidHandle { seq, .. }
            | Self::Store { seq, .. } => Some(*seq),
            Self::NotIdle { .. } => None,
        }
    }
}
