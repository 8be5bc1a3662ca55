//! Logging setup, with optional span export over OTLP/gRPC.
//!
//! Environment:
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: enables export when set.
//! - `OTEL_EXPORTER_OTLP_HEADERS`: `k=v,k2=v2` sent as gRPC metadata.
//! - `OTEL_SERVICE_INSTANCE_ID`: defaults to a fresh ULID.
//! - `TOKENGATE_LOG_FORMAT`: `json` for one JSON object per line, otherwise pretty.

use anyhow::{anyhow, Result};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::SdkTracerProvider,
    Resource,
};
use std::{env::var, sync::OnceLock, time::Duration};
use tonic::{
    metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};
use ulid::Ulid;

pub const LOG_FORMAT_ENV: &str = "TOKENGATE_LOG_FORMAT";

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct TelemetryConfig {
    endpoint: Option<String>,
    headers: Vec<(String, String)>,
    instance_id: String,
    json_logs: bool,
}

impl TelemetryConfig {
    fn from_env() -> Self {
        Self {
            endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|ep| !ep.trim().is_empty())
                .map(|ep| normalize_endpoint(&ep)),
            headers: var("OTEL_EXPORTER_OTLP_HEADERS")
                .map(|raw| parse_headers(&raw))
                .unwrap_or_default(),
            instance_id: var("OTEL_SERVICE_INSTANCE_ID")
                .unwrap_or_else(|_| Ulid::new().to_string()),
            json_logs: var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json")),
        }
    }
}

fn parse_headers(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn metadata(headers: &[(String, String)]) -> Result<MetadataMap> {
    let mut map = MetadataMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = MetadataKey::<Ascii>::from_bytes(key.as_bytes())
            .map_err(|e| anyhow!("invalid OTLP header name {key}: {e}"))?;
        let value: MetadataValue<Ascii> = value
            .parse()
            .map_err(|e| anyhow!("invalid OTLP header value for {key}: {e}"))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Bare `host:port` endpoints are taken as TLS.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

fn tls_domain(endpoint: &str) -> Option<&str> {
    endpoint
        .strip_prefix("https://")
        .and_then(|rest| rest.split(['/', ':']).next())
        .filter(|host| !host.is_empty())
}

fn tracer_provider(config: &TelemetryConfig, endpoint: &str) -> Result<SdkTracerProvider> {
    let mut exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(Duration::from_secs(3));

    if let Some(domain) = tls_domain(endpoint) {
        exporter = exporter.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(domain.to_string())
                .with_native_roots(),
        );
    }
    if !config.headers.is_empty() {
        exporter = exporter.with_metadata(metadata(&config.headers)?);
    }

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter.build()?)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(vec![
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", config.instance_id.clone()),
                ])
                .build(),
        )
        .build())
}

fn env_filter(level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("tower_http=info".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?))
}

/// Install the global subscriber. Spans are exported only when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// # Errors
///
/// Returns an error if the exporter or the subscriber cannot be initialized.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let config = TelemetryConfig::from_env();
    let filter = env_filter(verbosity_level.unwrap_or(Level::ERROR))?;

    let fmt_layer = if config.json_logs {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(false).pretty().boxed()
    };

    let otel_layer = match &config.endpoint {
        Some(endpoint) => {
            let provider = tracer_provider(&config, endpoint)?;
            let _ = TRACER_PROVIDER.set(provider.clone());

            global::set_tracer_provider(provider.clone());
            global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
                Box::new(TraceContextPropagator::new()),
                Box::new(BaggagePropagator::new()),
            ]));

            Some(tracing_opentelemetry::layer().with_tracer(provider.tracer(env!("CARGO_PKG_NAME"))))
        }
        None => None,
    };

    let subscriber = Registry::default()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Flush pending spans; noop when export was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        if let Err(err) = provider.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}
