//! Prometheus Remote Write decoder
//!
//! Turns a snappy-compressed protobuf payload into a flat sequence of
//! [`Sample`]s:
//!
//! 1. Decompress the snappy block
//! 2. Decode the `WriteRequest` protobuf
//! 3. Flatten every series into one sample per point
//!
//! Decoding stops at the first failing stage and never returns a partial
//! sequence. No semantic validation is performed: duplicate series,
//! out-of-order timestamps and odd label sets are passed through untouched.

pub mod proto;

use crate::sample::{render_metric, Sample};
use crate::Result;

use prost::Message;
use std::collections::BTreeMap;
use tracing::debug;

pub use proto::WriteRequest;

/// Decode a compressed remote-write payload into samples
pub fn decode(compressed: &[u8]) -> Result<Vec<Sample>> {
    let decompressed = decompress(compressed)?;
    let request = parse_write_request(&decompressed)?;
    let samples = flatten(request);

    debug!(
        compressed_bytes = compressed.len(),
        decompressed_bytes = decompressed.len(),
        samples = samples.len(),
        "Decoded remote write payload"
    );

    Ok(samples)
}

/// Decompress a raw snappy block
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    Ok(snap::raw::Decoder::new().decompress_vec(compressed)?)
}

/// Parse a write request from protobuf bytes
pub fn parse_write_request(data: &[u8]) -> Result<WriteRequest> {
    Ok(WriteRequest::decode(data)?)
}

/// Flatten a write request into one sample per point.
///
/// Every point of a series shares the metric identity rendered from that
/// series' labels. When a label name repeats, the last value wins.
pub fn flatten(request: WriteRequest) -> Vec<Sample> {
    let total_points: usize = request.timeseries.iter().map(|ts| ts.samples.len()).sum();
    let mut samples = Vec::with_capacity(total_points);

    for ts in request.timeseries {
        let labels: BTreeMap<String, String> = ts
            .labels
            .into_iter()
            .map(|label| (label.name, label.value))
            .collect();
        let metric = render_metric(&labels);

        samples.extend(
            ts.samples
                .iter()
                .map(|point| Sample::from_point(metric.as_str(), point.timestamp, point.value)),
        );
    }

    samples
}

/// Encode a write request the way remote-write clients send it:
/// protobuf, then a raw snappy block.
pub fn encode(request: &WriteRequest) -> Result<Vec<u8>> {
    let proto_bytes = request.encode_to_vec();
    Ok(snap::raw::Encoder::new().compress_vec(&proto_bytes)?)
}

#[cfg(test)]
mod tests {
    use super::proto::{Label, Sample as ProtoSample, TimeSeries};
    use super::*;
    use crate::Error;

    fn series(labels: &[(&str, &str)], points: &[(i64, f64)]) -> TimeSeries {
        TimeSeries {
            labels: labels.iter().map(|(k, v)| Label::new(*k, *v)).collect(),
            samples: points
                .iter()
                .map(|(ts, v)| ProtoSample::new(*ts, *v))
                .collect(),
        }
    }

    #[test]
    fn test_decode_single_series() {
        let request = WriteRequest {
            timeseries: vec![series(&[("__name__", "cpu")], &[(1000, 0.5), (2000, 0.7)])],
        };

        let samples = decode(&encode(&request).unwrap()).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].metric(), "cpu");
        assert_eq!(samples[0].value(), "0.5");
        assert_eq!(samples[0].timestamp().timestamp_millis(), 1000);
        assert_eq!(samples[1].value(), "0.7");
        assert_eq!(samples[1].timestamp().timestamp_millis(), 2000);
    }

    #[test]
    fn test_decode_counts_all_points() {
        let request = WriteRequest {
            timeseries: vec![
                series(&[("__name__", "a")], &[(1, 1.0), (2, 2.0), (3, 3.0)]),
                series(&[("__name__", "b")], &[]),
                series(&[("__name__", "c"), ("host", "h1")], &[(4, 4.0)]),
            ],
        };

        let samples = decode(&encode(&request).unwrap()).unwrap();
        assert_eq!(samples.len(), 4);

        let metrics: Vec<&str> = samples.iter().map(|s| s.metric()).collect();
        assert_eq!(metrics, vec!["a", "a", "a", r#"c{host="h1"}"#]);
    }

    #[test]
    fn test_identity_ignores_label_order() {
        let request = WriteRequest {
            timeseries: vec![
                series(&[("__name__", "up"), ("job", "node"), ("instance", "i1")], &[(1, 1.0)]),
                series(&[("instance", "i1"), ("job", "node"), ("__name__", "up")], &[(2, 1.0)]),
            ],
        };

        let samples = flatten(request);
        assert_eq!(samples[0].metric(), samples[1].metric());
        assert_eq!(samples[0].metric(), r#"up{instance="i1", job="node"}"#);
    }

    #[test]
    fn test_duplicate_label_last_write_wins() {
        let request = WriteRequest {
            timeseries: vec![series(
                &[("__name__", "m"), ("env", "dev"), ("env", "prod")],
                &[(1, 1.0)],
            )],
        };

        let samples = flatten(request);
        assert_eq!(samples[0].metric(), r#"m{env="prod"}"#);
    }

    #[test]
    fn test_empty_request_decodes_to_nothing() {
        let samples = decode(&encode(&WriteRequest::default()).unwrap()).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_malformed_snappy_is_decompression_error() {
        let garbage = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let err = decode(&garbage).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)), "got {err:?}");

        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, Error::Decompression(_)), "got {err:?}");
    }

    #[test]
    fn test_malformed_protobuf_is_protocol_error() {
        // Field 1, length-delimited, claims 5 bytes but carries one.
        let truncated = snap::raw::Encoder::new()
            .compress_vec(&[0x0a, 0x05, 0x01])
            .unwrap();
        let err = decode(&truncated).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut proto_bytes = WriteRequest {
            timeseries: vec![series(&[("__name__", "cpu")], &[(1, 0.5)])],
        }
        .encode_to_vec();
        // Field 3 (metadata), length-delimited, empty.
        proto_bytes.extend_from_slice(&[0x1a, 0x00]);
        let compressed = snap::raw::Encoder::new().compress_vec(&proto_bytes).unwrap();

        let samples = decode(&compressed).unwrap();
        assert_eq!(samples.len(), 1);
    }
}
