//! kvtrace Replay Engine
//!
//! Re-executes a captured trace of key-value operations against a fresh
//! store, one record at a time and in capture order, so a failure seen in the
//! original session can be reproduced exactly. The engine is fail-fast: the
//! first fatal error ends the run and leaves the store as it was at that point.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod journal;
pub mod observer;
pub mod registry;
pub mod session;

pub use engine::{ReplayConfig, ReplayEngine, ReplayState, ReplaySummary};
pub use error::{HandleKind, ReplayError};
pub use journal::JournalObserver;
pub use observer::{Diagnostic, MemoryObserver, ReplayObserver, TracingObserver};
pub use registry::{HandleNotFound, ResourceRegistry};
pub use session::SessionValidator;
