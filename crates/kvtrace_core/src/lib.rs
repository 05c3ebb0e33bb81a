//! kvtrace Core Types
//!
//! Operation records as captured from an application session, and the
//! identifiers used to route them to live batches and iterators.
//! This crate performs no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod op;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use id::{HandleId, SESSION_PREFIX_LEN};
pub use op::{OpKind, Operation};
