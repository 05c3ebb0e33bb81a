//! Replay journal.
//!
//! Writes each applied record back out in the capture's wire format, giving a
//! postmortem trace that can be diffed against the original capture.

use crate::observer::ReplayObserver;
use kvtrace_core::Operation;
use kvtrace_log::{StreamError, TraceWriter};
use std::io::Write;

/// Observer that journals applied records as gzip JSON
pub struct JournalObserver<W: Write> {
    writer: TraceWriter<W>,
    error: Option<StreamError>,
}

impl<W: Write> JournalObserver<W> {
    /// Journal into `writer`
    pub fn new(writer: TraceWriter<W>) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// Records journaled so far
    #[must_use]
    pub fn records(&self) -> u64 {
        self.writer.records()
    }

    /// Flush the journal and return the sink
    ///
    /// # Errors
    ///
    /// Returns the first write failure, or a failure while finishing
    pub fn finish(self) -> Result<W, StreamError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.writer.finish()
    }
}

impl<W: Write> ReplayObserver for JournalObserver<W> {
    fn applied(&mut self, seq: u64, op: &Operation) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.writer.write(op) {
            // Later records are not journaled; replay continues.
            tracing::warn!(seq, error = %err, "journal write failed, journaling stopped");
            self.error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtrace_core::OpKind;
    use kvtrace_log::TraceDecoder;
    use std::io::Cursor;

    #[test]
    fn test_journal_records_applied() {
        let mut journal = JournalObserver::new(TraceWriter::new(Vec::new()));
        let set = Operation::new("S001", OpKind::Set).with_key("a").with_value("1");
        journal.applied(0, &set);
        journal.skipped(1, &Operation::new("S001", OpKind::from("frobnicate")));
        assert_eq!(journal.records(), 1);

        let bytes = journal.finish().unwrap();
        let ops: Vec<Operation> = TraceDecoder::new(Cursor::new(bytes))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ops, vec![set]);
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("sink closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_journal_failure_is_reported_on_finish() {
        let mut journal = JournalObserver::new(TraceWriter::new(FailingSink));
        // Large enough to force the encoder to hit the sink.
        let big = "x".repeat(256 * 1024);
        let op = Operation::new("S001", OpKind::Set).with_key("a").with_value(big);
        for seq in 0..8 {
            journal.applied(seq, &op);
        }
        assert!(journal.finish().is_err());
    }
}
