//! HTTP request instruments and the middleware recording them.

use axum::extract::{MatchedPath, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::time::Instant;
use tracing::{info_span, Instrument};

/// Request instruments, built once from a meter and handed to the router
#[derive(Clone)]
pub struct HttpMetrics {
    total_requests: Counter<u64>,
    request_duration_ms: Histogram<f64>,
}

impl HttpMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            total_requests: meter
                .u64_counter("http_total_requests")
                .with_description("Count of HTTP Requests")
                .init(),
            request_duration_ms: meter
                .f64_histogram("http_request_duration_ms")
                .with_description("Duration of HTTP request in milliseconds")
                .with_unit("ms")
                .init(),
        }
    }

    /// Record one handled request
    pub fn record(&self, method: &str, path: &str, status: u16, duration_ms: f64) {
        self.total_requests.add(
            1,
            &[
                KeyValue::new("method", method.to_string()),
                KeyValue::new("status", status as i64),
            ],
        );
        self.request_duration_ms
            .record(duration_ms, &[KeyValue::new("path", path.to_string())]);
    }
}

/// HTTP middleware that records request count and per-path duration.
pub async fn http_observability_middleware(
    State(metrics): State<HttpMetrics>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().as_str().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let span = info_span!(
        "http.request",
        otel.kind = "server",
        http.request.method = %method,
        http.route = %route
    );
    let response = next.run(req).instrument(span).await;
    let duration_ms = start.elapsed().as_secs_f64() * 1_000.0;

    metrics.record(&method, &route, response.status().as_u16(), duration_ms);

    response
}
