//! End-to-end tests for the remote-write endpoint
//!
//! Drives the axum router in-process against the in-memory sink:
//! - Successful write persists one record per point
//! - Undecodable payloads are rejected with 400 and persist nothing
//! - Sink failures surface as 500 while workers still commit
//! - Probe routes

use promsink::api::{build_http_router, ApiServerConfig, HttpMetrics};
use promsink::decoder::proto::{Label, Sample as ProtoSample, TimeSeries, WriteRequest};
use promsink::decoder::encode;
use promsink::sink::MemorySink;
use promsink::writer::{FanOutWriter, WriterConfig};

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

fn router_with(sink: &MemorySink, api_config: &ApiServerConfig) -> Router {
    let writer = Arc::new(FanOutWriter::with_config(
        Arc::new(sink.clone()),
        WriterConfig::default(),
    ));
    let metrics = HttpMetrics::new(&opentelemetry::global::meter("promsink.tests"));
    build_http_router(writer, metrics, api_config)
}

fn router(sink: &MemorySink) -> Router {
    router_with(sink, &ApiServerConfig::default())
}

fn cpu_request() -> WriteRequest {
    WriteRequest {
        timeseries: vec![TimeSeries {
            labels: vec![Label::new("__name__", "cpu")],
            samples: vec![ProtoSample::new(1000, 0.5), ProtoSample::new(2000, 0.7)],
        }],
    }
}

fn write_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/write")
        .header(header::CONTENT_TYPE, "application/x-protobuf")
        .header(header::CONTENT_ENCODING, "snappy")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_write_persists_every_point() {
    let sink = MemorySink::new();
    let payload = encode(&cpu_request()).unwrap();

    let response = router(&sink).oneshot(write_request(payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        "0"
    );
    assert!(body_text(response.into_body()).await.is_empty());

    let mut persisted = sink.samples();
    persisted.sort_by_key(|s| s.timestamp());
    assert_eq!(persisted.len(), 2);
    assert!(persisted.iter().all(|s| s.metric() == "cpu"));
    assert_eq!(persisted[0].value(), "0.5");
    assert_eq!(persisted[0].timestamp().timestamp_millis(), 1000);
    assert_eq!(persisted[1].value(), "0.7");
    assert_eq!(persisted[1].timestamp().timestamp_millis(), 2000);
}

#[tokio::test]
async fn test_write_many_series() {
    let sink = MemorySink::new();
    let request = WriteRequest {
        timeseries: (0..25)
            .map(|i| TimeSeries {
                labels: vec![
                    Label::new("__name__", "http_requests_total"),
                    Label::new("instance", format!("host-{i}")),
                ],
                samples: (0..8)
                    .map(|p| ProtoSample::new(1_700_000_000_000 + p * 15_000, p as f64))
                    .collect(),
            })
            .collect(),
    };

    let response = router(&sink)
        .oneshot(write_request(encode(&request).unwrap()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(sink.len(), 200);
    assert!(sink
        .samples()
        .iter()
        .any(|s| s.metric() == r#"http_requests_total{instance="host-7"}"#));
}

#[tokio::test]
async fn test_garbage_payload_is_bad_request() {
    let sink = MemorySink::new();
    let garbage = vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x13];

    let response = router(&sink).oneshot(write_request(garbage)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response.into_body()).await;
    assert!(!body.is_empty());
    assert!(body.contains("Decompression"), "body: {body}");
    assert!(sink.is_empty());
    assert_eq!(sink.begin_attempts(), 0);
}

#[tokio::test]
async fn test_malformed_protobuf_is_bad_request() {
    let sink = MemorySink::new();
    let payload = snap::raw::Encoder::new()
        .compress_vec(&[0x0a, 0x05, 0x01])
        .unwrap();

    let response = router(&sink).oneshot(write_request(payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response.into_body()).await;
    assert!(body.contains("Protocol"), "body: {body}");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_failing_sink_is_server_error() {
    let sink = MemorySink::new().failing_saves();
    let payload = encode(&cpu_request()).unwrap();

    let response = router(&sink).oneshot(write_request(payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response.into_body()).await;
    assert!(body.contains("Persist"), "body: {body}");
    assert!(sink.is_empty());
    // Every worker still reaches its commit.
    assert_eq!(sink.commit_attempts(), WriterConfig::default().workers as u64);
}

#[tokio::test]
async fn test_body_limit_is_enforced_when_configured() {
    let sink = MemorySink::new();
    let config = ApiServerConfig {
        max_body_size: Some(16),
        ..Default::default()
    };

    let response = router_with(&sink, &config)
        .oneshot(write_request(vec![0u8; 64]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_probes() {
    let sink = MemorySink::new();

    for (uri, expected) in [("/health", "OK"), ("/ready", "READY")] {
        let response = router(&sink)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response.into_body()).await, expected);
    }
}

#[tokio::test]
async fn test_write_requires_post() {
    let sink = MemorySink::new();
    let response = router(&sink)
        .oneshot(Request::builder().uri("/write").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_cors_headers_only_when_enabled() {
    let sink = MemorySink::new();
    let cross_origin = || {
        Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "https://dashboards.example.org")
            .body(Body::empty())
            .unwrap()
    };

    let response = router(&sink).oneshot(cross_origin()).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());

    let config = ApiServerConfig {
        enable_cors: true,
        ..Default::default()
    };
    let response = router_with(&sink, &config)
        .oneshot(cross_origin())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
