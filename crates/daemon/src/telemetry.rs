//! OpenTelemetry export, compiled in with the `telemetry` feature
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name (default: ingest-worker)

use anyhow::Result;
use tracing_subscriber::{Layer, Registry};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Why telemetry is off, reported once logging is up
#[derive(Debug)]
pub enum TelemetryStatus {
    Enabled { endpoint: String },
    NotConfigured,
    FeatureDisabled,
}

/// Build the OTLP tracing layer when an endpoint is configured.
pub fn otel_layer() -> Result<(Option<BoxedLayer>, TelemetryStatus)> {
    let endpoint = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) if !endpoint.is_empty() => endpoint,
        _ => return Ok((None, TelemetryStatus::NotConfigured)),
    };

    #[cfg(feature = "telemetry")]
    {
        let layer = otel_layer_impl(&endpoint)?;
        Ok((Some(layer), TelemetryStatus::Enabled { endpoint }))
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = endpoint;
        Ok((None, TelemetryStatus::FeatureDisabled))
    }
}

pub fn report(status: &TelemetryStatus) {
    match status {
        TelemetryStatus::Enabled { endpoint } => {
            tracing::info!(endpoint = %endpoint, "OpenTelemetry export enabled")
        }
        TelemetryStatus::NotConfigured => {
            tracing::debug!("OpenTelemetry not configured (OTEL_EXPORTER_OTLP_ENDPOINT not set)")
        }
        TelemetryStatus::FeatureDisabled => {
            tracing::warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
            tracing::warn!("Rebuild with: cargo build --features telemetry");
        }
    }
}

#[cfg(feature = "telemetry")]
fn otel_layer_impl(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::TracerProvider;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "ingest-worker".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}
