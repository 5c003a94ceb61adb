//! Logging and OpenTelemetry initialization.
//!
//! Console logging is always on. When an OTLP endpoint is configured,
//! traces, logs and metrics are also exported over gRPC.

use std::time::Duration;

use anyhow::{Context, Result};
use dropconf::TelemetryConfig;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Timeout for OTLP exports - prevents blocking on unavailable endpoints
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Filter used when `RUST_LOG` is unset.
///
/// A bare level also turns on debug output for this crate at the default
/// level; anything else is taken as a full `EnvFilter` directive.
pub fn default_filter(log_level: &str) -> String {
    let level = log_level.trim();
    match level {
        "" | "info" => "info,qrdrop=debug".to_string(),
        other => other.to_string(),
    }
}

fn otlp_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

/// Install the global tracing subscriber.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(&config.log_level)))
        .context("Invalid log filter")?;

    let (telemetry_layer, log_appender) = match config.otlp_endpoint() {
        Some(otlp_endpoint) => {
            let resource = Resource::builder_empty()
                .with_service_name("qrdrop")
                .with_attributes(vec![KeyValue::new(
                    "service.version",
                    env!("CARGO_PKG_VERSION"),
                )])
                .build();

            let endpoint = otlp_url(otlp_endpoint);

            let trace_exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .with_timeout(EXPORT_TIMEOUT)
                .build()
                .context("Failed to create OTLP span exporter")?;

            let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                .with_span_processor(
                    opentelemetry_sdk::trace::BatchSpanProcessor::builder(trace_exporter).build(),
                )
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource.clone())
                .build();

            let tracer = tracer_provider.tracer("qrdrop");
            global::set_tracer_provider(tracer_provider);

            let log_exporter = opentelemetry_otlp::LogExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .with_timeout(EXPORT_TIMEOUT)
                .build()
                .context("Failed to create OTLP log exporter")?;

            let logger_provider = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
                .with_log_processor(
                    opentelemetry_sdk::logs::BatchLogProcessor::builder(log_exporter).build(),
                )
                .with_resource(resource.clone())
                .build();

            let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint)
                .with_timeout(EXPORT_TIMEOUT)
                .build()
                .context("Failed to create OTLP metric exporter")?;

            let meter_provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
                .with_reader(
                    opentelemetry_sdk::metrics::PeriodicReader::builder(metric_exporter).build(),
                )
                .with_resource(resource)
                .build();
            global::set_meter_provider(meter_provider);

            (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Some(
                    opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(
                        &logger_provider,
                    ),
                ),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .with(log_appender)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    match config.otlp_endpoint() {
        Some(endpoint) => {
            tracing::info!("🔭 OpenTelemetry initialized with OTLP endpoint: {}", endpoint);
            tracing::info!("📊 Exporting traces, logs, and metrics");
        }
        None => tracing::debug!("OTLP export disabled, logging to console only"),
    }

    Ok(())
}

/// Shutdown OpenTelemetry gracefully, flushing any pending data.
///
/// The providers flush on drop within the export timeout, so this only
/// marks the point in the logs.
pub fn shutdown() -> Result<()> {
    tracing::info!("🔭 Shutting down telemetry (providers flush on drop with 5s timeout)...");
    Ok(())
}
