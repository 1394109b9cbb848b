//! # promsink
//!
//! A Prometheus remote-write adapter that persists samples to CockroachDB.
//!
//! A remote-write request is decoded into flat samples (one per point, with
//! the series labels rendered into a single metric identity) and fanned out
//! to a fixed pool of workers, each writing inside its own database
//! transaction.
//!
//! ## Architecture
//!
//! - **Decoder**: snappy + protobuf payload → [`Sample`]s
//! - **Fan-out writer**: bounded intake channel, worker pool, first-error
//!   aggregation with cooperative cancellation
//! - **Sink**: transactional storage contract with CockroachDB and in-memory
//!   implementations
//! - **API**: axum `POST /write` endpoint with request metrics

pub mod api;
pub mod config;
pub mod decoder;
pub mod sample;
pub mod sink;
pub mod telemetry;
pub mod writer;

mod error;

pub use error::{Error, Result};
pub use sample::Sample;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::api::{build_http_router, ApiServerConfig, HttpMetrics};
    pub use crate::config::{ComponentFactory, DatabaseConfig, StorageBackend};
    pub use crate::sink::{MemorySink, PostgresSink, SampleSink, SinkTransaction};
    pub use crate::writer::{FanOutWriter, WriterConfig};
    pub use crate::{Error, Result, Sample};
}
