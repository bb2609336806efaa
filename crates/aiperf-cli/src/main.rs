//! aiperf CLI
//!
//! Entry point for the `run` command that drives a full benchmark, and for
//! the `worker`/`records-manager` subcommands the controller re-execs this
//! same binary with to start each subprocess (§4.7 step 2).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use aiperf_bus::{BusClient, BusTransport, TcpBus};
use aiperf_controller::{Controller, RunConfig, RunOutcome};
use aiperf_core::clock::Clock;
use aiperf_core::config::load_service_config;
use aiperf_dataset::DatasetClient;
use aiperf_http::create_client;
use aiperf_metrics::{types::builtin_classes, MetricRegistry};
use aiperf_records::config::RecordsManagerConfig;
use aiperf_records::RecordsManager;
use aiperf_worker::config::WorkerConfig;
use aiperf_worker::Worker;

#[derive(Parser)]
#[command(name = "aiperf", about = "Distributed load generator for LLM inference endpoints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full benchmark: binds the bus, spawns workers and the records
    /// manager, drives the run to completion, and prints a summary.
    Run {
        #[arg(long)]
        config: PathBuf,
    },
    /// Start a worker process. Spawned by the controller; not meant to be
    /// invoked directly.
    Worker {
        #[arg(long = "service-id")]
        service_id: String,
        #[arg(long)]
        config: PathBuf,
    },
    /// Start a records-manager process. Spawned by the controller; not
    /// meant to be invoked directly.
    #[command(name = "records-manager")]
    RecordsManager {
        #[arg(long = "service-id")]
        service_id: String,
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let json = !matches!(cli.command, Commands::Run { .. });
    let _log_guard = init_tracing(json);

    let exit_ok = match cli.command {
        Commands::Run { config } => run(config).await?,
        Commands::Worker { service_id, config } => {
            run_worker(service_id, config).await?;
            true
        }
        Commands::RecordsManager { service_id, config } => {
            run_records_manager(service_id, config).await?;
            true
        }
    };

    if !exit_ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Subprocesses log structured JSON so the controller's log passthrough can
/// decode each line; the `run` command logs plain text for a human watching
/// a terminal (§ AMBIENT Logging). Every process also mirrors its log lines
/// to a daily-rotating `aiperf.log` sidecar (§6 intermediate artifacts)
/// through a non-blocking writer; the returned guard must stay alive for the
/// process's lifetime or buffered lines get dropped on exit.
fn init_tracing(json: bool) -> WorkerGuard {
    let filter = EnvFilter::try_from_env("AIPERF_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::daily(".", "aiperf.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if json {
        let _ = registry.with(tracing_subscriber::fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(tracing_subscriber::fmt::layer()).try_init();
    }
    guard
}

async fn run(config_path: PathBuf) -> anyhow::Result<bool> {
    let config: RunConfig = load_service_config(&config_path)?;
    let (controller, broker_task) = Controller::bind(config).await?;

    info!("controller bound, starting run");
    let outcome = controller.run().await?;
    broker_task.abort();

    print_summary(&outcome);
    Ok(outcome.is_success())
}

async fn run_worker(service_id: String, config_path: PathBuf) -> anyhow::Result<()> {
    let mut config: WorkerConfig = load_service_config(&config_path)?;
    config.service_id = service_id;

    let transport: Arc<dyn BusTransport> = Arc::new(TcpBus::connect(&config.bus_addr).await?);
    let bus = BusClient::new(&config.service_id, transport);
    let http = create_client(&config.http)?;
    let endpoint = config.endpoint();
    let dataset = DatasetClient::remote(bus.clone());
    let registry = Arc::new(MetricRegistry::build(builtin_classes())?);

    let worker = Worker { config, bus, clock: Clock::new(), http, endpoint, dataset, registry };

    if let Err(e) = worker.run().await {
        error!(error = %e, "worker exited with an error");
        return Err(e.into());
    }
    Ok(())
}

async fn run_records_manager(service_id: String, config_path: PathBuf) -> anyhow::Result<()> {
    let mut config: RecordsManagerConfig = load_service_config(&config_path)?;
    config.service_id = service_id;

    let transport: Arc<dyn BusTransport> = Arc::new(TcpBus::connect(&config.bus_addr).await?);
    let bus = BusClient::new(&config.service_id, transport);
    let registry = Arc::new(MetricRegistry::build(builtin_classes())?);

    let manager = RecordsManager::new(bus, Clock::new(), config, registry).await?;
    if let Err(e) = manager.run().await {
        error!(error = %e, "records manager exited with an error");
        return Err(e.into());
    }
    Ok(())
}

/// The console summary table required by the Non-goals note that rules out
/// a CSV/TUI exporter: just enough to report what happened (§7 exit status).
fn print_summary(outcome: &RunOutcome) {
    println!();
    println!("{:<28} {:>10} {:>12} {:>12} {:>12}  {}", "metric", "count", "avg", "p50", "p99", "unit");
    println!("{}", "-".repeat(84));
    for result in &outcome.result.results {
        let fmt_opt = |v: Option<f64>| v.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<28} {:>10} {:>12.3} {:>12} {:>12}  {}",
            result.header,
            result.count,
            result.avg,
            fmt_opt(result.p50),
            fmt_opt(result.p99),
            result.unit
        );
    }
    println!();
    println!(
        "warmup: {} completed, {} errors | profiling: {} completed, {} errors",
        outcome.warmup_stats.completed, outcome.warmup_stats.errors, outcome.profiling_stats.completed, outcome.profiling_stats.errors
    );
    if outcome.was_cancelled {
        println!("run was cancelled before completion");
    }
    if !outcome.result.error_counts.is_empty() {
        println!("errors by kind:");
        for (kind, count) in &outcome.result.error_counts {
            println!("  {kind}: {count}");
        }
    }
    if !outcome.exit_errors.is_empty() {
        println!("service failures:");
        for failure in &outcome.exit_errors {
            println!("  {} ({}): {}", failure.service_id, if failure.fatal { "fatal" } else { "non-fatal" }, failure.message);
        }
    }
}
