use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use ingest_telemetry::init_tracing;
use tracing::{error, info};

use crate::config::{load_ingest_config, load_job_file};
use crate::core::start_ingestion_with_config;

mod collaborators;
mod config;
mod core;

/// Exit code used when the configuration or the job file cannot be loaded.
const CONFIG_ERROR_EXIT_CODE: u8 = 2;

/// Loads API data into warehouse tables through object storage staging.
#[derive(Debug, Parser)]
#[command(name = "api-ingest", version)]
struct Args {
    /// YAML file mapping table aliases to their job definitions.
    jobs: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (config, jobs) = match load_ingest_config()
        .and_then(|config| Ok((config, load_job_file(&args.jobs)?)))
    {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("failed to load configuration: {err:#}");
            return ExitCode::from(CONFIG_ERROR_EXIT_CODE);
        }
    };

    // Every log line of this invocation carries the same run id.
    let run_id = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
    let _log_flusher = match init_tracing(env!("CARGO_BIN_NAME"), Some(run_id)) {
        Ok(flusher) => flusher,
        Err(err) => {
            eprintln!("failed to initialize tracing: {err}");
            return ExitCode::from(CONFIG_ERROR_EXIT_CODE);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start the async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(start_ingestion_with_config(config, jobs)) {
        Ok(report) if report.all_succeeded() => {
            info!(tables = report.runs.len(), "all tables ingested");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!(
                tables = report.runs.len(),
                failed = report.failed(),
                "some tables failed to ingest"
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("an error occurred while setting up the ingestion: {err:#}");
            ExitCode::FAILURE
        }
    }
}
