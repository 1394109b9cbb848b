//! Prometheus Remote Write receiver
//!
//! Decodes the snappy-compressed protobuf body and fans the samples out to
//! the sink.

use crate::api::ApiState;
use crate::decoder;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

/// Handle Prometheus Remote Write requests
///
/// POST /write
/// Content-Encoding: snappy
/// Content-Type: application/x-protobuf
///
/// - `200` with an empty body once every sample was written
/// - `400` with the error text when the payload cannot be decoded
/// - `500` with the error text when the sink reported a failure
pub async fn handle_remote_write(State(state): State<ApiState>, body: Bytes) -> Response {
    let samples = match decoder::decode(&body) {
        Ok(samples) => samples,
        Err(e) => {
            warn!(error = %e, body_bytes = body.len(), "Rejecting undecodable write request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let sample_count = samples.len();
    if let Err(e) = state.writer.write(samples).await {
        error!(error = %e, samples = sample_count, "Failed to persist write request");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    debug!(samples = sample_count, "Write request persisted");
    (StatusCode::OK, [(header::CONTENT_LENGTH, "0")]).into_response()
}
