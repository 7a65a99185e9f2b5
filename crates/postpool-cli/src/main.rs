#![doc = include_str!("../README.md")]

mod config;
mod settings;
mod telemetry;

use clap::Parser;
use config::{CliArgs, RunConfig};
use postpool::{Completion, Coordinator, WorkResult};
use telemetry::{
    increment_invocation_failures, increment_items_completed, increment_items_timed_out,
    init_telemetry, record_item_duration, record_run_duration, shutdown_telemetry,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let res = run(&config);
    shutdown_telemetry(providers);
    res
}

fn run(config: &RunConfig) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config.workers, config.processor())
        .with_poll_interval(config.poll_interval);
    let report = coordinator.run_with(&config.items, record_result)?;

    record_run_duration(report.elapsed.as_secs_f64() * 1000.0);
    tracing::info!(
        "Processed {} items with {} workers in {:.2?} ({} could not be run, {} timed out)",
        report.len(),
        config.workers,
        report.elapsed,
        report.failures().count(),
        report.timed_out().count()
    );
    Ok(())
}

fn record_result(result: &WorkResult) {
    increment_items_completed();
    record_item_duration(result.elapsed.as_secs_f64() * 1000.0);

    match &result.outcome {
        Ok(Completion::Exited { code: Some(0) }) | Ok(Completion::Done) => {}
        Ok(Completion::Exited { code }) => {
            tracing::debug!("{}: {} exited with {code:?}", result.worker, result.item);
        }
        Ok(Completion::TimedOut) => {
            increment_items_timed_out();
            tracing::warn!(
                "{}: {} killed after {:.2?}",
                result.worker,
                result.item,
                result.elapsed
            );
        }
        // The worker has already logged the cause.
        Err(_) => increment_invocation_failures(),
    }
}

fn log_startup_info(config: &RunConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting postpool with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting postpool with {} workers for {} items",
            config.workers,
            config.items.len()
        );
    }
}
