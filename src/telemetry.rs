use once_cell::sync::Lazy;
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{SERVICE_NAME, SERVICE_VERSION},
    resource::DEPLOYMENT_ENVIRONMENT_NAME,
};
use rocket::{
    Data, Request, Response,
    fairing::{Fairing, Info, Kind},
};
use std::sync::Mutex;
use std::time::Instant;
use tonic::metadata::MetadataMap;
use tracing::{field, info_span};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

pub struct TelemetryFairing;

#[rocket::async_trait]
impl Fairing for TelemetryFairing {
    fn info(&self) -> Info {
        Info {
            name: "OpenTelemetry",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let method = request.method().to_string();
        let uri = request.uri().to_string();

        let start_time = Instant::now();

        let span = info_span!(
            "http_request",
            otel.name = format!("{} {}", method, uri),
            http.method = method,
            http.uri = uri,
            http.status_code = field::Empty,
            http.duration_ms = field::Empty,
        );

        request.local_cache(|| (span, start_time));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let (span, start_time) = request.local_cache(|| {
            let span = info_span!("http_request");
            (span, Instant::now())
        });

        let duration = start_time.elapsed();

        span.record("http.status_code", response.status().code);
        span.record("http.duration_ms", duration.as_millis() as i64);

        let _entered = span.enter();
        tracing::info!(
            "Completed request in {}ms with status {}",
            duration.as_millis(),
            response.status().code
        );
    }
}

fn resource() -> Resource {
    let environment = std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());

    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, environment),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_tracer_provider(endpoint: &str) -> anyhow::Result<SdkTracerProvider> {
    let mut metadata = MetadataMap::new();
    if let Ok(api_key) = std::env::var("HONEYCOMB_API_KEY") {
        metadata.insert("x-honeycomb-team", api_key.parse()?);
    }

    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_protocol(Protocol::Grpc)
        .with_metadata(metadata);

    if endpoint.starts_with("https://") {
        builder =
            builder.with_tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots());
    }

    let exporter = builder.build()?;

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

pub struct OtelGuard {
    tracer_provider: SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {:?}", err);
        }
    }
}

/// Installs the global subscriber. Spans are exported over OTLP only when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .filter(|e| !e.is_empty());

    let Some(endpoint) = endpoint else {
        if let Err(e) = registry.try_init() {
            eprintln!("Tracing already initialised: {}", e);
        }
        return;
    };

    match init_tracer_provider(&endpoint) {
        Ok(tracer_provider) => {
            let tracer = tracer_provider.tracer("basariyolu");
            if let Err(e) = registry.with(OpenTelemetryLayer::new(tracer)).try_init() {
                eprintln!("Tracing already initialised: {}", e);
            }
            if let Ok(mut guard) = TELEMETRY_GUARD.lock() {
                *guard = Some(OtelGuard { tracer_provider });
            }
            tracing::info!(endpoint = %endpoint, "OpenTelemetry export enabled");
        }
        Err(e) => {
            if let Err(e) = registry.try_init() {
                eprintln!("Tracing already initialised: {}", e);
            }
            tracing::warn!(error = %e, "Failed to set up OpenTelemetry exporter, logging locally only");
        }
    }
}

pub fn shutdown_telemetry() {
    tracing::info!("Shutting down telemetry");

    let guard = TELEMETRY_GUARD.lock().ok().and_then(|mut guard| guard.take());
    drop(guard);
}
