//! The two run modes.

use crate::config::RunConfig;
use color_eyre::eyre::{Result, WrapErr};
use kvtrace_core::Operation;
use kvtrace_fetch::{ensure_artifacts, prepare_working_copy};
use kvtrace_log::{OperationStream, StreamError, StreamOutcome, TraceWriter};
use kvtrace_replay::{
    JournalObserver, ReplayConfig, ReplayEngine, ReplayError, ReplayObserver, ReplaySummary,
    TracingObserver,
};
use kvtrace_storage::{run_direct, KvStore, StressReport};
use std::io::Write;
use std::path::Path;

/// Outcome of a replay run
#[derive(Debug)]
pub struct ReplayReport {
    /// Engine summary
    pub summary: ReplaySummary,
    /// How the decoder ended
    pub stream: StreamOutcome,
    /// Journal records written, when journaling
    pub journaled: Option<u64>,
}

/// Direct stress run in the work directory
pub async fn direct(config: &RunConfig) -> Result<StressReport> {
    let workdir = config.workdir();
    let stress = config.stress.clone();
    let report = tokio::task::spawn_blocking(move || run_direct(&workdir, &stress))
        .await?
        .wrap_err("direct stress run failed")?;
    tracing::info!(path = %report.path.display(), written = report.written, "direct run complete");
    Ok(report)
}

/// Acquire the inputs, then replay the trace against a fresh working copy
pub async fn replay(config: &RunConfig) -> Result<ReplayReport> {
    let workdir = config.workdir();
    let artifacts = ensure_artifacts(&workdir, &config.fetch)
        .await
        .wrap_err_with(|| format!("acquiring replay inputs in {}", workdir.display()))?;
    let working = prepare_working_copy(&artifacts).await?;

    let trace = artifacts.trace.clone();
    let config = config.clone();
    tokio::task::spawn_blocking(move || replay_blocking(&working, &trace, &config)).await?
}

// The stream consumer blocks, so this must stay off the async workers.
fn replay_blocking(working: &Path, trace: &Path, config: &RunConfig) -> Result<ReplayReport> {
    let store = KvStore::open(working, &config.store)
        .wrap_err_with(|| format!("opening {}", working.display()))?;
    let mut stream = OperationStream::from_path(trace, &config.stream)
        .wrap_err_with(|| format!("opening trace {}", trace.display()))?;

    let (result, journaled) = match &config.journal {
        Some(path) => {
            let writer = TraceWriter::create(path)
                .wrap_err_with(|| format!("creating journal {}", path.display()))?;
            let journal = JournalObserver::new(writer);
            run_journaled(&store, &mut stream, &config.engine, journal, path)
        }
        None => {
            let (result, _) = run_engine(&store, &mut stream, &config.engine, TracingObserver);
            (result, None)
        }
    };

    let outcome = stream.finish();
    match &outcome {
        StreamOutcome::Completed { records } => tracing::debug!(records, "trace fully decoded"),
        StreamOutcome::Truncated { records, error } => {
            tracing::warn!(records, error = %error, "trace ended at an undecodable record")
        }
        StreamOutcome::Abandoned { records } => tracing::debug!(records, "trace not fully consumed"),
    }

    let summary = result.wrap_err("replay failed")?;
    Ok(ReplayReport {
        summary,
        stream: outcome,
        journaled,
    })
}

/// Replays with a journal attached. A journal that cannot be completed is
/// logged and reported as `None`; the replay result is returned either way.
fn run_journaled<W: Write>(
    store: &KvStore,
    ops: impl Iterator<Item = Operation>,
    config: &ReplayConfig,
    journal: JournalObserver<W>,
    path: &Path,
) -> (Result<ReplaySummary, ReplayError>, Option<u64>) {
    let (result, (_, journal)) = run_engine(store, ops, config, (TracingObserver, journal));

    let records = journal.records();
    let written = journal
        .finish()
        .and_then(|mut sink| sink.flush().map_err(StreamError::from));
    match written {
        Ok(()) => {
            tracing::info!(path = %path.display(), records, "journal written");
            (result, Some(records))
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "journal incomplete");
            (result, None)
        }
    }
}

fn run_engine<O: ReplayObserver>(
    store: &KvStore,
    ops: impl Iterator<Item = Operation>,
    config: &ReplayConfig,
    observer: O,
) -> (Result<ReplaySummary, ReplayError>, O) {
    let mut engine = ReplayEngine::with_observer(store, observer).with_config(config.clone());
    let result = engine.replay(ops);
    (result, engine.into_observer())
}
