//! CLI entry point for the GTFS map dataset builder.
//!
//! Runs each operator's feed through the conversion chain concurrently,
//! merges the results into one dataset, and writes GeoJSON partitions.

use std::ffi::OsStr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use gtfs_map_builder::config::{BuildConfig, OperatorConfig};
use gtfs_map_builder::emit::{Manifest, write_dataset};
use gtfs_map_builder::merge::merge;
use gtfs_map_builder::pipeline::build_operator;
use gtfs_map_builder::summary::{OperatorSummary, RunSummary};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_map_builder")]
#[command(about = "Convert GTFS feeds into GeoJSON map partitions", long_about = None)]
struct Cli {
    /// JSON config listing operator feeds and pipeline options
    #[arg(short, long, value_name = "FILE")]
    config: String,

    /// Directory the partitions and manifest are written to
    #[arg(short, long, default_value = "web/data", value_name = "DIR")]
    out: String,

    /// Build only the operator with this code
    #[arg(long, value_name = "CODE")]
    operator: Option<String>,

    /// Maximum number of operator chains processed concurrently
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_map_builder.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_map_builder.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = BuildConfig::load(&cli.config)?;

    let operators: Vec<OperatorConfig> = match &cli.operator {
        Some(code) => {
            let selected: Vec<_> = config
                .operators
                .iter()
                .filter(|op| &op.code == code)
                .cloned()
                .collect();
            if selected.is_empty() {
                bail!("operator {:?} not found in config", code);
            }
            selected
        }
        None => config.operators.clone(),
    };
    let options = config.options.clone();

    info!(operators = operators.len(), out = %cli.out, "Starting build");

    // Fan out: one chain per operator, bounded by the semaphore. Nothing is
    // shared until the merge stage, so the chains are fully independent.
    let semaphore = Arc::new(tokio::sync::Semaphore::new(cli.concurrency.max(1)));
    let mut tasks = Vec::new();
    for op in operators {
        let sem = semaphore.clone();
        let options = options.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            tokio::task::spawn_blocking(move || match build_operator(&op, &options) {
                Ok((build, summary)) => (Some(build), summary),
                Err(e) => {
                    error!(operator = %op.code, error = %e, "Feed unusable, operator skipped");
                    (None, OperatorSummary::from_error(&op.code, &e.to_string()))
                }
            })
            .await
        }));
    }

    let mut builds = Vec::new();
    let mut run = RunSummary::default();
    for task in tasks {
        let (build, summary) = task
            .await
            .context("operator task failed")?
            .context("operator chain panicked")?;
        if let Some(build) = build {
            builds.push(build);
        }
        run.operators.push(summary);
    }

    if run.all_failed() {
        bail!(
            "all {} operator feeds were unusable, no output written",
            run.operators.len()
        );
    }

    let dataset = merge(builds);
    let manifest = write_dataset(&dataset, Path::new(&cli.out), &options)?;

    report(&run, &manifest);

    if run.failed_operators() > 0 {
        warn!(
            failed = run.failed_operators(),
            "Build finished, but some operator feeds were unusable"
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn report(run: &RunSummary, manifest: &Manifest) {
    for op in &run.operators {
        match &op.error {
            Some(e) => warn!(operator = %op.operator, error = %e, "Operator failed"),
            None => info!(
                operator = %op.operator,
                routes = op.routes_emitted,
                dropped_no_shape = op.routes_dropped_no_shape,
                patterns = op.patterns_emitted,
                deduplicated = op.patterns_deduplicated,
                skipped_rows = op.total_skipped_rows(),
                "Operator summary"
            ),
        }
    }

    let unknown_codes = run.unknown_mode_codes();
    if !unknown_codes.is_empty() {
        warn!(codes = ?unknown_codes, "Unrecognized route_type codes were mapped to unknown mode");
    }

    info!(
        partitions = manifest.partitions.len(),
        modes = ?manifest.modes,
        operators = ?manifest.operators,
        "Build complete"
    );
}
