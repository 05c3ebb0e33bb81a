//! kvtrace Storage
//!
//! Single-table transactional key-value store over redb, exposing exactly the
//! surface a replay needs: autocommit reads and writes, long-lived write
//! batches, and read cursors.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod store;
pub mod stress;

pub use error::StoreError;
pub use store::{KvStore, ReadCursor, StoreConfig, WriteBatch, BUCKET};
pub use stress::{run_direct, StressConfig, StressReport};
