//! kvtrace Acquisition
//!
//! Makes sure the session snapshot and the compressed trace are present in a
//! work directory, downloading what is missing, and prepares a throwaway
//! working copy of the snapshot so replay never mutates the original.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fetch;
pub mod workdir;

pub use error::FetchError;
pub use fetch::{ensure_artifacts, ensure_artifacts_with, Artifacts, FetchConfig};
pub use workdir::prepare_working_copy;
