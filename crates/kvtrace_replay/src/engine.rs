//! Replay engine.
//!
//! Drains an ordered stream of captured operations and applies each one to the
//! store in arrival order, routing batch and iterator records to the handles
//! opened earlier in the same trace.
//!
//! ```text
//! Idle -> Running -> Closed      dbClose with nothing open
//!                 -> Exhausted   stream ended without dbClose
//!                 -> Failed      first fatal error
//! ```

use crate::error::ReplayError;
use crate::observer::{Diagnostic, ReplayObserver, TracingObserver};
use crate::registry::ResourceRegistry;
use crate::session::SessionValidator;
use kvtrace_core::{HandleId, OpKind, Operation, SESSION_PREFIX_LEN};
use kvtrace_storage::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Replay engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Byte offset in a session id where the handle suffix starts
    pub handle_offset: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            handle_offset: SESSION_PREFIX_LEN,
        }
    }
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplayState {
    /// Nothing consumed yet
    Idle,
    /// Consuming records
    Running,
    /// `dbClose` applied with no open handles
    Closed,
    /// Stream ended before `dbClose`
    Exhausted,
    /// Stopped at a fatal error
    Failed,
}

impl ReplayState {
    /// Whether the engine will accept no further records
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Exhausted | Self::Failed)
    }
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Closed => "closed",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Final state, `Closed` or `Exhausted`
    pub state: ReplayState,
    /// Session prefix taken from the first record
    pub session: Option<String>,
    /// Records applied
    pub applied: u64,
    /// Records of unknown kind skipped
    pub skipped: u64,
    /// Records followed `dbClose`; none of them were applied
    pub trailing: bool,
    /// Batches still open at the end
    pub open_batches: usize,
    /// Iterators still open at the end
    pub open_iterators: usize,
}

/// Single-threaded, fail-fast trace replayer
pub struct ReplayEngine<'s, O: ReplayObserver = TracingObserver> {
    store: &'s KvStore,
    config: ReplayConfig,
    validator: SessionValidator,
    registry: ResourceRegistry,
    state: ReplayState,
    seq: u64,
    applied: u64,
    skipped: u64,
    trailing: bool,
    observer: O,
}

impl<'s> ReplayEngine<'s, TracingObserver> {
    /// Create an engine reporting through `tracing`
    #[must_use]
    pub fn new(store: &'s KvStore) -> Self {
        Self::with_observer(store, TracingObserver)
    }
}

impl<'s, O: ReplayObserver> ReplayEngine<'s, O> {
    /// Create an engine reporting through `observer`
    #[must_use]
    pub fn with_observer(store: &'s KvStore, observer: O) -> Self {
        Self {
            store,
            config: ReplayConfig::default(),
            validator: SessionValidator::new(),
            registry: ResourceRegistry::new(),
            state: ReplayState::Idle,
            seq: 0,
            applied: 0,
            skipped: 0,
            trailing: false,
            observer,
        }
    }

    /// Create with custom config
    #[must_use]
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ReplayState {
        self.state
    }

    /// Live handles
    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// The observer
    #[must_use]
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Consume the engine, returning the observer
    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Replay `ops` to the end, to `dbClose`, or to the first fatal error.
    ///
    /// Nothing after `dbClose` is applied; the engine only checks whether
    /// more records follow. On error, everything applied so far stays applied.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, or [`ReplayError::NotIdle`] if the
    /// engine has already run
    pub fn replay<I>(&mut self, ops: I) -> Result<ReplaySummary, ReplayError>
    where
        I: IntoIterator<Item = Operation>,
    {
        if self.state != ReplayState::Idle {
            return Err(ReplayError::NotIdle { state: self.state });
        }
        self.state = ReplayState::Running;

        let mut ops = ops.into_iter();
        for op in ops.by_ref() {
            let seq = self.seq;
            self.seq += 1;
            if let Err(err) = self.apply(seq, &op) {
                self.state = ReplayState::Failed;
                self.observer.failed(seq, &op, &err);
                return Err(err);
            }
            if self.state == ReplayState::Closed {
                break;
            }
        }

        if self.state == ReplayState::Closed {
            // Only look one record ahead; the rest of the trace stays undecoded.
            self.trailing = ops.next().is_some();
            if self.trailing {
                self.observer
                    .diagnostic(self.seq, &Diagnostic::TrailingRecords);
            }
        } else {
            self.state = ReplayState::Exhausted;
            if !self.registry.is_empty() {
                self.observer.diagnostic(
                    self.seq,
                    &Diagnostic::UnclosedAtEnd {
                        batches: self.registry.open_batches(),
                        iterators: self.registry.open_iterators(),
                    },
                );
            }
        }

        let summary = self.summary();
        self.observer.finished(&summary);
        Ok(summary)
    }

    /// Counters as of now
    #[must_use]
    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            state: self.state,
            session: self.validator.prefix().map(str::to_string),
            applied: self.applied,
            skipped: self.skipped,
            trailing: self.trailing,
            open_batches: self.registry.open_batches(),
            open_iterators: self.registry.open_iterators(),
        }
    }

    fn apply(&mut self, seq: u64, op: &Operation) -> Result<(), ReplayError> {
        self.validator.check(seq, &op.id)?;

        let store_err = |source: StoreError| ReplayError::Store { seq, source };

        match &op.op {
            OpKind::DbOpen => {}
            OpKind::DbClose => {
                if !self.registry.is_empty() {
                    return Err(ReplayError::LeakedResources {
                        seq,
                        batches: self.registry.open_batches(),
                        iterators: self.registry.open_iterators(),
                    });
                }
                self.state = ReplayState::Closed;
            }

            OpKind::Get => {
                self.store.get(op.key_bytes()).map_err(store_err)?;
            }
            OpKind::Set => {
                self.ensure_writer_free(seq, &op.op)?;
                self.store
                    .put(op.key_bytes(), op.value_bytes())
                    .map_err(store_err)?;
            }
            OpKind::Delete => {
                self.ensure_writer_free(seq, &op.op)?;
                self.store.delete(op.key_bytes()).map_err(store_err)?;
            }

            OpKind::IterBegin => {
                let handle = self.handle(seq, op)?;
                let cursor = self.store.open_cursor().map_err(store_err)?;
                if self.registry.register_iterator(handle.clone(), cursor).is_some() {
                    self.observer
                        .diagnostic(seq, &Diagnostic::IteratorReplaced { handle });
                }
            }
            OpKind::IterNext => {
                let handle = self.handle(seq, op)?;
                self.registry
                    .lookup_iterator(&handle)
                    .map_err(|err| err.at(seq))?
                    .next_entry()
                    .map_err(store_err)?;
            }
            OpKind::IterClose => {
                let handle = self.handle(seq, op)?;
                self.registry
                    .release_iterator(&handle)
                    .map_err(|err| err.at(seq))?;
            }

            OpKind::BatchBegin => {
                let handle = self.handle(seq, op)?;
                if self.registry.has_batch(&handle) {
                    // The old transaction holds the writer; roll it back
                    // before asking for a new one.
                    let previous = self
                        .registry
                        .release_batch(&handle)
                        .map_err(|err| err.at(seq))?;
                    previous.abort().map_err(store_err)?;
                    self.observer.diagnostic(
                        seq,
                        &Diagnostic::BatchReplaced {
                            handle: handle.clone(),
                        },
                    );
                }
                self.ensure_writer_free(seq, &op.op)?;
                let batch = self.store.begin_batch().map_err(store_err)?;
                self.registry.register_batch(handle, batch);
            }
            OpKind::BatchCommit => {
                let handle = self.handle(seq, op)?;
                let batch = self
                    .registry
                    .release_batch(&handle)
                    .map_err(|err| err.at(seq))?;
                batch.commit().map_err(store_err)?;
            }
            OpKind::BatchSet => {
                let handle = self.handle(seq, op)?;
                self.registry
                    .lookup_batch(&handle)
                    .map_err(|err| err.at(seq))?
                    .put(op.key_bytes(), op.value_bytes())
                    .map_err(store_err)?;
            }
            OpKind::BatchDelete => {
                let handle = self.handle(seq, op)?;
                self.registry
                    .lookup_batch(&handle)
                    .map_err(|err| err.at(seq))?
                    .delete(op.key_bytes())
                    .map_err(store_err)?;
            }
            OpKind::BatchGet => {
                let handle = self.handle(seq, op)?;
                self.registry
                    .lookup_batch(&handle)
                    .map_err(|err| err.at(seq))?
                    .get(op.key_bytes())
                    .map_err(store_err)?;
            }

            OpKind::Unknown(_) => {
                self.skipped += 1;
                self.observer.skipped(seq, op);
                return Ok(());
            }
        }

        self.applied += 1;
        self.observer.applied(seq, op);
        Ok(())
    }

    /// Handle suffix of `op`. A session prefix shorter than the configured
    /// offset moves the suffix start back to the end of that prefix.
    fn handle(&self, seq: u64, op: &Operation) -> Result<HandleId, ReplayError> {
        let offset = match self.validator.prefix() {
            Some(prefix) => prefix.len().min(self.config.handle_offset),
            None => self.config.handle_offset,
        };
        HandleId::from_session(&op.id, offset)
            .map_err(|source| ReplayError::InvalidHandle { seq, source })
    }

    /// The store admits one writer; asking for a second from this thread
    /// would block forever.
    fn ensure_writer_free(&self, seq: u64, kind: &OpKind) -> Result<(), ReplayError> {
        match self.registry.first_batch() {
            Some(batch) => Err(ReplayError::WriterConflict {
                seq,
                op: kind.clone(),
                batch: batch.clone(),
            }),
            None => Ok(()),
        }
    }
}
