//! Exporters and request metrics.
//!
//! Traces and logs go to an OTLP collector when one is configured.
//! Metrics are always recorded and rendered for Prometheus by `/metrics`.
use std::error::Error;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::IntoResponse;
use metrics::{Unit, counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::{Span, Tracer};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

type BoxError = Box<dyn Error + Send + Sync>;

const REQUESTS: &str = "http_requests_total";
const REQUEST_DURATION: &str = "http_requests_duration_seconds";
const PROCESS_CPU: &str = "process_cpu_usage";
const PROCESS_MEMORY: &str = "process_memory_used_bytes";

/// Upper bounds of the request latency buckets, in seconds.
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// How often process gauges are sampled.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

fn service() -> Resource {
    Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Create tracer for OTLP.
pub fn setup_tracer(endpoint: &str) -> Result<SdkTracerProvider, BoxError> {
    let exporter = SpanExporter::builder().with_tonic().with_endpoint(endpoint).build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(service())
        .with_batch_exporter(exporter)
        .build())
}

/// Bridge `tracing` events to an OTLP log collector.
pub fn setup_logging(
    endpoint: &str,
) -> Result<OpenTelemetryTracingBridge<SdkLoggerProvider, SdkLogger>, BoxError> {
    let exporter = LogExporter::builder().with_tonic().with_endpoint(endpoint).build()?;
    let provider = SdkLoggerProvider::builder()
        .with_resource(service())
        .with_batch_exporter(exporter)
        .build();

    Ok(OpenTelemetryTracingBridge::new(&provider))
}

/// Install the Prometheus recorder and start sampling process gauges.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_owned()), LATENCY_BUCKETS)?
        .install_recorder()?;

    describe_metrics();
    spawn_process_gauges();

    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!(REQUESTS, Unit::Count, "Handled requests.");
    metrics::describe_histogram!(REQUEST_DURATION, Unit::Seconds, "Time spent handling a request.");
    metrics::describe_counter!(
        "login_attempts_total",
        Unit::Count,
        "Login attempts, labelled by outcome."
    );
    metrics::describe_gauge!(PROCESS_CPU, Unit::Percent, "CPU used by the service.");
    metrics::describe_gauge!(PROCESS_MEMORY, Unit::Bytes, "Memory used by the service.");
}

fn spawn_process_gauges() {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new_with_specifics(RefreshKind::nothing());

    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(SAMPLE_INTERVAL);
        loop {
            ticks.tick().await;
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_memory().with_cpu(),
            );

            let Some(process) = system.process(pid) else {
                continue;
            };
            gauge!(PROCESS_CPU).set(f64::from(process.cpu_usage()));
            gauge!(PROCESS_MEMORY).set(process.memory() as f64);
        }
    });
}

/// Count and time every routed request, inside an OTLP span.
pub async fn track(req: Request, next: Next) -> impl IntoResponse {
    let mut span = global::tracer(env!("CARGO_PKG_NAME")).start("request");
    let started = Instant::now();

    // Route templates keep usernames out of labels.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path(), MatchedPath::as_str)
        .to_owned();
    let method = req.method().to_string();

    let response = next.run(req).await;
    let status = response.status().as_u16();

    span.set_attributes([
        KeyValue::new("http.request.method", method.clone()),
        KeyValue::new("http.route", route.clone()),
        KeyValue::new("http.response.status_code", i64::from(status)),
    ]);
    span.end();

    let labels = [
        ("method", method),
        ("path", route),
        ("status", status.to_string()),
    ];
    counter!(REQUESTS, &labels).increment(1);
    histogram!(REQUEST_DURATION, &labels).record(started.elapsed().as_secs_f64());

    response
}
