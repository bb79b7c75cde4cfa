//! OpenTelemetry integration
//!
//! [`tracer_layer`] builds the tracer provider and the `tracing` layer that
//! gives every span an OpenTelemetry context. It also installs the W3C
//! `TraceContextPropagator` globally, which is what turns a span into the
//! `traceparent`/`tracestate` pair script probes read.

use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{
    Resource,
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracer, SdkTracerProvider},
};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

use crate::config::TelemetryConfig;
use crate::core::LogResult;

/// Build the OpenTelemetry layer and the provider backing it.
///
/// The provider is also registered as the global tracer provider. Keep the
/// returned provider alive (the [`LoggerGuard`](crate::LoggerGuard) does this)
/// and shut it down to flush exported spans.
pub fn tracer_layer<S>(
    config: &TelemetryConfig,
) -> LogResult<(OpenTelemetryLayer<S, SdkTracer>, SdkTracerProvider)>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    global::set_text_map_propagator(TraceContextPropagator::new());

    let sampler = if config.sampling_rate >= 1.0 {
        Sampler::AlwaysOn
    } else if config.sampling_rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(config.sampling_rate)
    };

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();

    #[allow(unused_mut)]
    let mut builder = SdkTracerProvider::builder()
        .with_sampler(sampler)
        .with_resource(resource);

    #[cfg(feature = "otlp")]
    if let Some(endpoint) = config.otlp_endpoint.as_deref().filter(|e| !e.is_empty()) {
        builder = builder.with_batch_exporter(otlp_exporter(&config.service_name, endpoint)?);
    }

    let provider = builder.build();
    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider.clone());

    Ok((tracing_opentelemetry::layer().with_tracer(tracer), provider))
}

#[cfg(feature = "otlp")]
fn otlp_exporter(service: &str, endpoint: &str) -> LogResult<opentelemetry_otlp::SpanExporter> {
    use opentelemetry_otlp::WithExportConfig;

    opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| crate::core::LogError::telemetry(service, e.to_string()))
}
