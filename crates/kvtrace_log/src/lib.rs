//! kvtrace Operation Stream
//!
//! Decodes gzip-compressed, streamed JSON operation traces and hands the
//! records to a single consumer through a bounded queue, so decompression
//! overlaps with replay.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decode;
pub mod error;
pub mod stream;
pub mod writer;

pub use decode::{open_trace, TraceDecoder};
pub use error::StreamError;
pub use stream::{OperationStream, StreamConfig, StreamOutcome};
pub use writer::TraceWriter;
