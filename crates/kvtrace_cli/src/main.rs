//! kvtrace CLI
//!
//! Replays a captured key-value operation trace against a copy of the
//! session snapshot, or runs the direct stress workload.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod run;

use clap::Parser;
use color_eyre::Result;
use config::{Args, RunConfig};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = RunConfig::resolve(&args)?;
    tracing::debug!(?config, "resolved configuration");

    if config.replay {
        match run::replay(&config).await {
            Ok(report) => {
                tracing::info!(
                    decoded = report.stream.records(),
                    journaled = ?report.journaled,
                    "replay complete"
                );
                println!("{}", serde_json::to_string_pretty(&report.summary)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(report) => {
                eprintln!("Error: {:?}", report);
                Ok(ExitCode::from(1))
            }
        }
    } else {
        match run::direct(&config).await {
            Ok(_) => Ok(ExitCode::SUCCESS),
            Err(report) => {
                eprintln!("Error: {:?}", report);
                Ok(ExitCode::from(2))
            }
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kvtrace=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
