//! Store errors.

use std::path::PathBuf;

/// Failure reported by the underlying store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database file could not be opened or created
    #[error("Cannot open database {path}: {source}")]
    Open {
        /// Database path
        path: PathBuf,
        /// redb error
        source: redb::DatabaseError,
    },

    /// Database backend could not be created
    #[error("Cannot create database: {0}")]
    Create(#[from] redb::DatabaseError),

    /// Transaction could not begin
    #[error("Cannot begin transaction: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table could not be opened
    #[error("Cannot open table: {0}")]
    Table(#[from] redb::TableError),

    /// Read or write failed
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// Commit failed
    #[error("Commit failed: {0}")]
    Commit(#[from] redb::CommitError),

    /// Filesystem error outside the database
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
