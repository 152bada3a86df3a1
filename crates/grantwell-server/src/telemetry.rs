//! OTLP trace export for engine and REST spans.
//!
//! Export is compiled in only with the `telemetry` feature. Without it the
//! init and shutdown hooks are no-ops so `main` stays feature agnostic.

use crate::config::TracingConfig;

#[cfg(feature = "telemetry")]
use opentelemetry::trace::TracerProvider as _;
#[cfg(feature = "telemetry")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "telemetry")]
use opentelemetry_sdk::trace::TracerProvider;

const INSTRUMENTATION_SCOPE: &str = "grantwell";

#[derive(Debug, thiserror::Error)]
#[error("failed to install OpenTelemetry tracer: {0}")]
pub struct TelemetryError(String);

/// What gets exported, resolved from `[tracing]` before any exporter exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub endpoint: String,
    pub sample_ratio: f64,
    pub resource: Vec<(&'static str, String)>,
}

/// `None` when tracing is off or the ratio would drop every span.
pub fn export_settings(config: &TracingConfig) -> Option<ExportSettings> {
    if !config.enabled || config.sample_rate <= 0.0 {
        return None;
    }

    Some(ExportSettings {
        endpoint: config.otlp_endpoint.clone(),
        sample_ratio: config.sample_rate.min(1.0),
        resource: vec![
            ("service.name", config.service_name.clone()),
            ("service.version", env!("CARGO_PKG_VERSION").to_string()),
        ],
    })
}

#[cfg(feature = "telemetry")]
pub fn init_telemetry(config: &TracingConfig) -> Result<Option<TracerProvider>, TelemetryError> {
    let Some(settings) = export_settings(config) else {
        return Ok(None);
    };

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&settings.endpoint);

    let resource = settings
        .resource
        .into_iter()
        .map(|(key, value)| opentelemetry::KeyValue::new(key, value))
        .collect::<Vec<_>>();

    let provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(
                    settings.sample_ratio,
                ))
                .with_resource(opentelemetry_sdk::Resource::new(resource)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .map_err(|e| TelemetryError(e.to_string()))?;

    Ok(Some(provider))
}

#[cfg(feature = "telemetry")]
pub fn make_otel_layer(
    provider: &TracerProvider,
) -> tracing_opentelemetry::OpenTelemetryLayer<
    tracing_subscriber::Registry,
    opentelemetry_sdk::trace::Tracer,
> {
    tracing_opentelemetry::layer().with_tracer(provider.tracer(INSTRUMENTATION_SCOPE))
}

// Flushes batched spans; a failure here must not mask the command's result.
#[cfg(feature = "telemetry")]
pub fn shutdown_telemetry(provider: TracerProvider) {
    if let Err(e) = provider.shutdown() {
        tracing::warn!(error = %e, "failed to flush spans on shutdown");
    }
}

#[cfg(not(feature = "telemetry"))]
pub fn init_telemetry(_config: &TracingConfig) -> Result<Option<()>, TelemetryError> {
    Ok(None)
}

#[cfg(not(feature = "telemetry"))]
pub fn shutdown_telemetry(_provider: ()) {}
