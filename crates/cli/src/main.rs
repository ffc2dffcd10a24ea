//! ktop
//!
//! A live, continuously refreshing top-K view of resource usage across the
//! nodes or pods of a Kubernetes cluster.

mod cluster;
mod config;
mod output;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use cluster::KubeSource;
use ktop_lib::collector::MetricsSource;
use ktop_lib::{snapshot, FetchMetrics, MetricKey, Session, TopConfig};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use terminal::{KeyWatcher, TerminalSink};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Live top-K resource usage for Kubernetes nodes and pods
#[derive(Parser, Debug)]
#[command(name = "ktop")]
#[command(author, version, about = "Live top-K resource usage for Kubernetes nodes and pods", long_about = None)]
pub struct Cli {
    /// Show pods instead of nodes
    #[arg(long)]
    pub pods: bool,

    /// Number of rows to show
    #[arg(long = "count", short = 'n', visible_alias = "countpods")]
    pub count: Option<usize>,

    /// Ranking metric (cpu or memory)
    #[arg(long)]
    pub sort: Option<MetricKey>,

    /// Redraw period in milliseconds
    #[arg(long)]
    pub refresh_ms: Option<u64>,

    /// Period between inventory polls in seconds
    #[arg(long)]
    pub poll_secs: Option<u64>,

    /// Upper bound of the random delay before each metric fetch, in milliseconds
    #[arg(long)]
    pub jitter_ms: Option<u64>,

    /// Width of the usage bars in characters
    #[arg(long)]
    pub bar_width: Option<usize>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Path to a JSON config file (default: ~/.config/ktop/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Collect one complete cycle, print it and exit
    #[arg(long)]
    pub once: bool,

    /// Output format for --once
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Write JSON logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Write fetch counters in Prometheus text format to this file on exit
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let file_config = config::FileConfig::load(cli.config.as_deref())?;
    let top = config::resolve(&file_config, &cli)?;
    info!(
        mode = %top.display_mode,
        metric_key = %top.metric_key,
        top_k = top.top_k,
        "Configuration loaded"
    );

    let kubeconfig = config::kubeconfig_path(cli.kubeconfig.as_deref());
    let source: Arc<dyn MetricsSource> =
        Arc::new(KubeSource::connect(kubeconfig.as_deref(), top.display_mode).await?);
    let metrics = FetchMetrics::new().context("Failed to register fetch metrics")?;

    let outcome = if cli.once {
        run_once(&top, source, &metrics, cli.format).await
    } else {
        run_live(&top, source, &metrics).await
    };

    if let Some(path) = &cli.metrics_out {
        write_metrics(&metrics, path)?;
    }
    outcome
}

async fn run_once(
    top: &TopConfig,
    source: Arc<dyn MetricsSource>,
    metrics: &FetchMetrics,
    format: output::OutputFormat,
) -> Result<()> {
    let view = snapshot(top, source, Some(metrics.clone())).await?;
    output::print_view(&view, top, format)
}

async fn run_live(
    top: &TopConfig,
    source: Arc<dyn MetricsSource>,
    metrics: &FetchMetrics,
) -> Result<()> {
    let sink = TerminalSink::enter().context("Failed to prepare terminal")?;
    let session = Session::builder()
        .config(top.clone())
        .source(source)
        .sink(sink)
        .metrics(metrics.clone())
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let watcher = KeyWatcher::spawn(shutdown_tx);

    // The sink is dropped with the session, so the terminal is restored here
    let result = session.run(shutdown_rx).await;
    watcher.stop().await;

    let summary = result?;
    info!(renders = summary.renders, "Session finished");
    Ok(())
}

/// Install the subscriber. Logs only go to `log_file`, since the
/// terminal view owns stdout.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().json().with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();
    Ok(())
}

fn write_metrics(metrics: &FetchMetrics, path: &Path) -> Result<()> {
    let text = metrics.encode().context("Failed to encode metrics")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}
