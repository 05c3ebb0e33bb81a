//! Run configuration: defaults, then an optional JSON file, then flags.

use clap::Parser;
use kvtrace_fetch::FetchConfig;
use kvtrace_log::StreamConfig;
use kvtrace_replay::ReplayConfig;
use kvtrace_storage::{StoreConfig, StressConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Command-line flags
#[derive(Debug, Parser)]
#[command(name = "kvtrace")]
#[command(about = "kvtrace - Replay captured key-value operation traces", long_about = None)]
pub struct Args {
    /// Work directory for downloaded and generated files [default: system temp dir]
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Fetch and replay the captured session instead of the direct stress run
    #[arg(long)]
    pub replay: bool,

    /// URL prefix the snapshot and trace are downloaded from when absent
    #[arg(long, env = "KVTRACE_BASE_URL")]
    pub base_url: Option<String>,

    /// Write every applied operation to this gzip JSON file
    #[arg(long)]
    pub journal: Option<PathBuf>,

    /// Decoder queue capacity
    #[arg(long)]
    pub queue_depth: Option<usize>,

    /// Byte offset of the handle suffix inside session ids
    #[arg(long)]
    pub handle_offset: Option<usize>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("Cannot read config {path}: {source}")]
    Read {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not a valid config
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },
}

/// Everything a run needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Work directory
    pub workdir: Option<PathBuf>,
    /// Replay mode instead of direct stress
    pub replay: bool,
    /// Journal output path
    pub journal: Option<PathBuf>,
    /// Acquisition
    pub fetch: FetchConfig,
    /// Decoder queue
    pub stream: StreamConfig,
    /// Replay engine
    pub engine: ReplayConfig,
    /// Store options
    pub store: StoreConfig,
    /// Direct stress workload
    pub stress: StressConfig,
}

impl RunConfig {
    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, overlaid with `--config`, overlaid with the other flags
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(args);
        Ok(config)
    }

    fn apply(&mut self, args: &Args) {
        if let Some(workdir) = &args.workdir {
            self.workdir = Some(workdir.clone());
        }
        self.replay |= args.replay;
        if let Some(base_url) = &args.base_url {
            self.fetch.base_url = Some(base_url.clone());
        }
        if let Some(journal) = &args.journal {
            self.journal = Some(journal.clone());
        }
        if let Some(depth) = args.queue_depth {
            self.stream.capacity = depth;
        }
        if let Some(offset) = args.handle_offset {
            self.engine.handle_offset = offset;
        }
    }

    /// Work directory, falling back to the system temp dir (`TMPDIR`)
    #[must_use]
    pub fn workdir(&self) -> PathBuf {
        self.workdir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(flags: &[&str]) -> Args {
        let mut argv = vec!["kvtrace"];
        argv.extend_from_slice(flags);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::resolve(&args(&[])).unwrap();
        assert!(!config.replay);
        assert_eq!(config.engine.handle_offset, 12);
        assert_eq!(config.stream.capacity, 16);
        assert_eq!(config.stress.total, 272);
        assert_eq!(config.workdir(), std::env::temp_dir());
    }

    #[test]
    fn test_flags_override() {
        let config = RunConfig::resolve(&args(&[
            "--replay",
            "--workdir",
            "/var/tmp/kv",
            "--queue-depth",
            "4",
            "--handle-offset",
            "4",
            "--journal",
            "/var/tmp/kv/journal.json.gz",
        ]))
        .unwrap();
        assert!(config.replay);
        assert_eq!(config.workdir(), PathBuf::from("/var/tmp/kv"));
        assert_eq!(config.stream.capacity, 4);
        assert_eq!(config.engine.handle_offset, 4);
        assert_eq!(config.journal, Some(PathBuf::from("/var/tmp/kv/journal.json.gz")));
    }

    #[test]
    fn test_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kvtrace.json");
        std::fs::write(
            &path,
            r#"{
                "replay": true,
                "workdir": "/srv/capture",
                "stream": { "capacity": 64 },
                "engine": { "handle_offset": 8 },
                "stress": { "total": 32 }
            }"#,
        )
        .unwrap();
        let path = path.to_str().unwrap();

        let config = RunConfig::resolve(&args(&["--config", path, "--queue-depth", "2"])).unwrap();
        assert!(config.replay);
        assert_eq!(config.workdir(), PathBuf::from("/srv/capture"));
        assert_eq!(config.stream.capacity, 2);
        assert_eq!(config.engine.handle_offset, 8);
        assert_eq!(config.stress.total, 32);
        assert_eq!(config.stress.chunk, 16);
        assert_eq!(config.fetch.trace_name, "wal.json.gz");
    }

    #[test]
    fn test_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kvtrace.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            RunConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            RunConfig::from_file(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
