//! Bounded operation stream.
//!
//! A decoder thread pushes records into a bounded queue; the replay side pulls
//! them one at a time. The queue is finite and not restartable: it ends when
//! the source is exhausted, when a record fails to decode, or when the
//! consumer hangs up.

use crate::decode::open_trace;
use crate::error::StreamError;
use kvtrace_core::Operation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

/// Stream configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Queue capacity between decoder and consumer
    pub capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

/// How the producer side ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Source exhausted, every record queued
    Completed {
        /// Records queued
        records: u64,
    },
    /// A record failed to decode; everything before it was queued
    Truncated {
        /// Records queued
        records: u64,
        /// Decode failure
        error: String,
    },
    /// Consumer stopped pulling before the source was exhausted
    Abandoned {
        /// Records queued
        records: u64,
    },
}

impl StreamOutcome {
    /// Records the producer managed to queue
    #[must_use]
    pub const fn records(&self) -> u64 {
        match self {
            Self::Completed { records }
            | Self::Truncated { records, .. }
            | Self::Abandoned { records } => *records,
        }
    }
}

/// Consumer end of the decoder queue
pub struct OperationStream {
    rx: mpsc::Receiver<Operation>,
    producer: Option<JoinHandle<StreamOutcome>>,
    received: u64,
}

impl OperationStream {
    /// Run `source` on a decoder thread feeding a bounded queue
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned
    pub fn spawn<I>(source: I, config: &StreamConfig) -> Result<Self, StreamError>
    where
        I: IntoIterator<Item = Result<Operation, StreamError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let producer = thread::Builder::new()
            .name("kvtrace-decode".to_string())
            .spawn(move || produce(source, tx))
            .map_err(StreamError::Spawn)?;

        Ok(Self {
            rx,
            producer: Some(producer),
            received: 0,
        })
    }

    /// Open a gzip trace file and start decoding it
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, unreadable, or not gzip
    pub fn from_path(path: &Path, config: &StreamConfig) -> Result<Self, StreamError> {
        let decoder = open_trace(path)?;
        Self::spawn(decoder, config)
    }

    /// Records handed to the consumer so far
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Close the queue and wait for the decoder thread
    pub fn finish(mut self) -> StreamOutcome {
        self.shutdown()
    }

    fn shutdown(&mut self) -> StreamOutcome {
        self.rx.close();
        match self.producer.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| StreamOutcome::Truncated {
                records: self.received,
                error: "decoder thread panicked".to_string(),
            }),
            None => StreamOutcome::Abandoned {
                records: self.received,
            },
        }
    }
}

impl Iterator for OperationStream {
    type Item = Operation;

    fn next(&mut self) -> Option<Operation> {
        let op = self.rx.blocking_recv()?;
        self.received += 1;
        Some(op)
    }
}

impl Drop for OperationStream {
    fn drop(&mut self) {
        if self.producer.is_some() {
            let _ = self.shutdown();
        }
    }
}

fn produce<I>(source: I, tx: mpsc::Sender<Operation>) -> StreamOutcome
where
    I: IntoIterator<Item = Result<Operation, StreamError>>,
{
    let mut records = 0u64;
    for item in source {
        match item {
            Ok(op) => {
                if tx.blocking_send(op).is_err() {
                    tracing::debug!(records, "consumer hung up, stopping decoder");
                    return StreamOutcome::Abandoned { records };
                }
                records += 1;
            }
            Err(err) => {
                tracing::error!(records, error = %err, "trace decode failed, ending stream");
                return StreamOutcome::Truncated {
                    records,
                    error: err.to_string(),
                };
            }
        }
    }
    StreamOutcome::Completed { records }
}
