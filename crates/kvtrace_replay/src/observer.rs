//! Replay diagnostics port.
//!
//! The engine reports everything it does through a [`ReplayObserver`] handed
//! to it at construction, scoped to that one run.

use crate::engine::ReplaySummary;
use crate::error::ReplayError;
use kvtrace_core::{HandleId, Operation};
use std::fmt;

/// Non-fatal condition worth surfacing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// `batchBegin` on a live batch; the previous transaction was rolled back
    BatchReplaced {
        /// Reused handle
        handle: HandleId,
    },
    /// `iterBegin` on a live iterator; the previous cursor was dropped
    IteratorReplaced {
        /// Reused handle
        handle: HandleId,
    },
    /// Stream ended without `dbClose` while handles were still open
    UnclosedAtEnd {
        /// Open batches
        batches: usize,
        /// Open iterators
        iterators: usize,
    },
    /// Records follow `dbClose`; they are not applied
    TrailingRecords,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatchReplaced { handle } => {
                write!(f, "batch {} begun again while open, previous rolled back", handle)
            }
            Self::IteratorReplaced { handle } => {
                write!(f, "iter {} begun again while open, previous dropped", handle)
            }
            Self::UnclosedAtEnd { batches, iterators } => write!(
                f,
                "trace ended without dbClose, {} batches and {} iters still open",
                batches, iterators
            ),
            Self::TrailingRecords => f.write_str("records after dbClose were not applied"),
        }
    }
}

/// Receives replay events
pub trait ReplayObserver {
    /// A record was applied
    fn applied(&mut self, _seq: u64, _op: &Operation) {}

    /// A record of unknown kind was skipped
    fn skipped(&mut self, _seq: u64, _op: &Operation) {}

    /// A non-fatal condition was detected
    fn diagnostic(&mut self, _seq: u64, _diagnostic: &Diagnostic) {}

    /// The run failed at `op`
    fn failed(&mut self, _seq: u64, _op: &Operation, _error: &ReplayError) {}

    /// The run completed
    fn finished(&mut self, _summary: &ReplaySummary) {}
}

impl ReplayObserver for () {}

impl<O: ReplayObserver + ?Sized> ReplayObserver for &mut O {
    fn applied(&mut self, seq: u64, op: &Operation) {
        (**self).applied(seq, op);
    }

    fn skipped(&mut self, seq: u64, op: &Operation) {
        (**self).skipped(seq, op);
    }

    fn diagnostic(&mut self, seq: u64, diagnostic: &Diagnostic) {
        (**self).diagnostic(seq, diagnostic);
    }

    fn failed(&mut self, seq: u64, op: &Operation, error: &ReplayError) {
        (**self).failed(seq, op, error);
    }

    fn finished(&mut self, summary: &ReplaySummary) {
        (**self).finished(summary);
    }
}

impl<A: ReplayObserver, B: ReplayObserver> ReplayObserver for (A, B) {
    fn applied(&mut self, seq: u64, op: &Operation) {
        self.0.applied(seq, op);
        self.1.applied(seq, op);
    }

    fn skipped(&mut self, seq: u64, op: &Operation) {
        self.0.skipped(seq, op);
        self.1.skipped(seq, op);
    }

    fn diagnostic(&mut self, seq: u64, diagnostic: &Diagnostic) {
        self.0.diagnostic(seq, diagnostic);
        self.1.diagnostic(seq, diagnostic);
    }

    fn failed(&mut self, seq: u64, op: &Operation, error: &ReplayError) {
        self.0.failed(seq, op, error);
        self.1.failed(seq, op, error);
    }

    fn finished(&mut self, summary: &ReplaySummary) {
        self.0.finished(summary);
        self.1.finished(summary);
    }
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ReplayObserver for TracingObserver {
    fn applied(&mut self, seq: u64, op: &Operation) {
        tracing::debug!(seq, op = %op, "execute");
    }

    fn skipped(&mut self, seq: u64, op: &Operation) {
        tracing::warn!(seq, op = %op, "skip");
    }

    fn diagnostic(&mut self, seq: u64, diagnostic: &Diagnostic) {
        tracing::warn!(seq, "{}", diagnostic);
    }

    fn failed(&mut self, seq: u64, op: &Operation, error: &ReplayError) {
        tracing::error!(seq, op = %op, error = %error, "execute");
    }

    fn finished(&mut self, summary: &ReplaySummary) {
        tracing::info!(
            state = %summary.state,
            applied = summary.applied,
            skipped = summary.skipped,
            trailing = summary.trailing,
            "replay finished"
        );
    }
}

/// Keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryObserver {
    /// Applied records in order
    pub applied: Vec<Operation>,
    /// Skipped records in order
    pub skipped: Vec<Operation>,
    /// Diagnostics with their record numbers
    pub diagnostics: Vec<(u64, Diagnostic)>,
    /// Failure message and record number
    pub failure: Option<(u64, String)>,
    /// Summary of a completed run
    pub summary: Option<ReplaySummary>,
}

impl ReplayObserver for MemoryObserver {
    fn applied(&mut self, _seq: u64, op: &Operation) {
        self.applied.push(op.clone());
    }

    fn skipped(&mut self, _seq: u64, op: &Operation) {
        self.skipped.push(op.clone());
    }

    fn diagnostic(&mut self, seq: u64, diagnostic: &Diagnostic) {
        self.diagnostics.push((seq, diagnostic.clone()));
    }

    fn failed(&mut self, seq: u64, _op: &Operation, error: &ReplayError) {
        self.failure = Some((seq, error.to_string()));
    }

    fn finished(&mut self, summary: &ReplaySummary) {
        self.summary = Some(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtrace_core::OpKind;

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::BatchReplaced {
            handle: HandleId::new("b1"),
        };
        assert_eq!(diag.to_string(), "batch \"b1\" begun again while open, previous rolled back");

        let diag = Diagnostic::TrailingRecords;
        assert_eq!(diag.to_string(), "records after dbClose were not applied");
    }

    #[test]
    fn test_pair_forwards_to_both() {
        let mut pair = (MemoryObserver::default(), MemoryObserver::default());
        let op = Operation::new("S001", OpKind::Get).with_key("k");
        pair.applied(0, &op);
        pair.skipped(1, &op);

        assert_eq!(pair.0.applied.len(), 1);
        assert_eq!(pair.1.applied.len(), 1);
        assert_eq!(pair.1.skipped.len(), 1);
    }

    #[test]
    fn test_mut_ref_forwards() {
        fn feed<O: ReplayObserver>(mut observer: O) {
            observer.diagnostic(5, &Diagnostic::TrailingRecords);
        }

        let mut memory = MemoryObserver::default();
        feed(&mut memory);
        assert_eq!(memory.diagnostics, vec![(5, Diagnostic::TrailingRecords)]);
    }
}
