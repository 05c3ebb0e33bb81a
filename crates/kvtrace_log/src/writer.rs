//! Trace writer.
//!
//! Writes records in the same gzip JSON-lines form the decoder reads. Used for
//! replay journals, so a journal can be compared against the capture with the
//! same tooling.

use crate::error::StreamError;
use flate2::write::GzEncoder;
use flate2::Compression;
use kvtrace_core::Operation;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Gzip JSON-lines trace writer
pub struct TraceWriter<W: Write> {
    encoder: GzEncoder<W>,
    records: u64,
}

impl<W: Write> TraceWriter<W> {
    /// Wrap a sink
    pub fn new(sink: W) -> Self {
        Self {
            encoder: GzEncoder::new(sink, Compression::default()),
            records: 0,
        }
    }

    /// Append one record
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the sink fails
    pub fn write(&mut self, op: &Operation) -> Result<(), StreamError> {
        serde_json::to_writer(&mut self.encoder, op)?;
        self.encoder.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush the gzip trailer and return the sink
    ///
    /// # Errors
    ///
    /// Returns error if the sink fails
    pub fn finish(self) -> Result<W, StreamError> {
        Ok(self.encoder.finish()?)
    }
}

impl TraceWriter<BufWriter<File>> {
    /// Create (or truncate) a trace file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created
    pub fn create(path: &Path) -> Result<Self, StreamError> {
        let file = File::create(path).map_err(|source| StreamError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}
