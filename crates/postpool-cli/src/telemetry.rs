//! # Telemetry Features
//!
//! Console logging through `tracing_subscriber::fmt` is always on and filtered
//! with `RUST_LOG` (default `info`). OpenTelemetry export is opt-in.
//!
//! ## Feature matrix
//!
//! - `tracing`: Exports spans (one per run, one per item) via OpenTelemetry.
//! - `metrics`: Exports item counters and duration histograms.
//! - `stdout`: Enables the stdout exporter for whichever of the above is on.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run -p postpool-cli --features tracing,metrics,stdout -- --threads 4
//! ```

// Disallow using `stdout` without `tracing` or `metrics`
#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer();

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder("postpool")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Thread names identify workers in the console output.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

/// Flushes and shuts down the exporters. Failures are printed, not returned,
/// so a broken exporter never changes the exit status of a finished run.
pub fn shutdown_telemetry(_providers: TelemetryProviders) {
    #[cfg(feature = "tracing")]
    {
        if let Err(err) = _providers.tracer_provider.force_flush() {
            eprintln!("Error flushing traces: {err:#?}");
        }
        if let Err(err) = _providers.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer: {err:#?}");
        }
    }

    #[cfg(feature = "metrics")]
    {
        if let Err(err) = _providers.meter_provider.force_flush() {
            eprintln!("Error flushing metrics: {err:#?}");
        }
        if let Err(err) = _providers.meter_provider.shutdown() {
            eprintln!("Error shutting down meter: {err:#?}");
        }
    }
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("postpool")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "tracing")]
fn init_tracer() -> sdktrace::SdkTracerProvider {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let exporter = SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    builder.build()
}

#[cfg(feature = "metrics")]
static ITEMS_COMPLETED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static INVOCATION_FAILURES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ITEMS_TIMED_OUT: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ITEM_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static RUN_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = ITEMS_COMPLETED.set(
        meter
            .u64_counter("items_completed")
            .with_description("Work items with a result, whatever the outcome")
            .build(),
    );

    let _ = INVOCATION_FAILURES.set(
        meter
            .u64_counter("invocation_failures")
            .with_description("Work items whose command could not be run")
            .build(),
    );

    let _ = ITEMS_TIMED_OUT.set(
        meter
            .u64_counter("items_timed_out")
            .with_description("Work items killed after the per-item timeout")
            .build(),
    );

    let _ = ITEM_DURATION_MS.set(
        meter
            .f64_histogram("item_duration")
            .with_unit("ms")
            .with_description("Time spent processing one item")
            .build(),
    );

    let _ = RUN_DURATION_MS.set(
        meter
            .f64_histogram("run_duration")
            .with_unit("ms")
            .with_description("Pool start to last worker joined")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_items_completed() {
    if let Some(counter) = ITEMS_COMPLETED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_items_completed() {}

#[cfg(feature = "metrics")]
pub fn increment_invocation_failures() {
    if let Some(counter) = INVOCATION_FAILURES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_invocation_failures() {}

#[cfg(feature = "metrics")]
pub fn increment_items_timed_out() {
    if let Some(counter) = ITEMS_TIMED_OUT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_items_timed_out() {}

#[cfg(feature = "metrics")]
pub fn record_item_duration(duration_ms: f64) {
    if let Some(histogram) = ITEM_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_item_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn record_run_duration(duration_ms: f64) {
    if let Some(histogram) = RUN_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_run_duration(_duration_ms: f64) {}
