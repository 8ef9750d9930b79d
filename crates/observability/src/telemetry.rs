//! Global subscriber: an `EnvFilter`, a stderr console layer and, when
//! configured, an OTLP/gRPC span exporter.

use once_cell::sync::OnceCell;
use opentelemetry::{global, trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{LogFormat, ObservabilityConfig, OtlpExport};
use crate::error::ObservabilityError;

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

/// Install the global subscriber. Fails on an invalid filter or when a
/// subscriber is already installed. An exporter that cannot be built only
/// costs the export; console logging still comes up and reports it.
pub fn init(config: ObservabilityConfig) -> Result<(), ObservabilityError> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|e| ObservabilityError::InvalidFilter {
            filter: config.filter.clone(),
            reason: e.to_string(),
        })?;

    let compact = (config.format == LogFormat::Compact).then(|| {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let full = (config.format == LogFormat::Full).then(|| {
        fmt::layer()
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
    });

    let (otel, export_error) = match &config.otlp {
        Some(export) => match otlp_layer(&config, export) {
            Ok(layer) => (Some(layer), None),
            Err(e) => (None, Some(e)),
        },
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(compact)
        .with(full)
        .with(otel)
        .try_init()
        .map_err(|e| ObservabilityError::AlreadyInstalled(e.to_string()))?;

    if let (Some(export), Some(e)) = (&config.otlp, export_error) {
        tracing::warn!(endpoint = %export.endpoint, error = %e, "span export disabled");
    } else if let Some(export) = &config.otlp {
        tracing::info!(
            service = %config.service_name,
            endpoint = %export.endpoint,
            "exporting spans over OTLP"
        );
    }
    Ok(())
}

fn otlp_layer<S>(
    config: &ObservabilityConfig,
    export: &OtlpExport,
) -> Result<OpenTelemetryLayer<S, SdkTracer>, ObservabilityError>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(export.endpoint.clone())
        .build()
        .map_err(|e| ObservabilityError::Exporter(e.to_string()))?;

    let attributes = [
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
    ]
    .into_iter()
    .chain(
        export
            .attributes
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
    );

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_attributes(attributes).build())
        .build();
    let tracer = provider.tracer(config.service_name.clone());

    global::set_tracer_provider(provider.clone());
    let _ = TRACER_PROVIDER.set(provider);
    Ok(OpenTelemetryLayer::new(tracer))
}

/// Flush pending spans. Safe to call when export was never set up.
pub fn shutdown() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "span exporter shutdown failed");
        }
    }
}

pub fn init_from_env() -> Result<(), ObservabilityError> {
    init(ObservabilityConfig::from_env())
}
