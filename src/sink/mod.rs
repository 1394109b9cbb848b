//! Storage sinks for decoded samples
//!
//! A sink hands out independent transactions; the fan-out writer opens one
//! per worker and may use several concurrently.

mod memory;
mod postgres;

pub use memory::MemorySink;
pub use postgres::PostgresSink;

use crate::sample::Sample;
use crate::Result;
use async_trait::async_trait;

/// Table the samples are written to
pub const SAMPLES_TABLE: &str = "metrics";

/// Backing store for samples
#[async_trait]
pub trait SampleSink: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &'static str;

    /// Create the samples table if it does not exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Begin a new transaction
    async fn begin(&self) -> Result<Box<dyn SinkTransaction>>;

    /// Release backend resources; called once at shutdown
    async fn close(&self) {}
}

/// An open transaction against a sink.
///
/// A failed [`save`](SinkTransaction::save) leaves the transaction usable;
/// later saves and the final commit proceed as if the failed sample had never
/// been offered. Dropping a transaction without committing discards it.
#[async_trait]
pub trait SinkTransaction: Send {
    /// Stage one sample in the transaction
    async fn save(&mut self, sample: &Sample) -> Result<()>;

    /// Commit all staged samples
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard all staged samples
    async fn rollback(self: Box<Self>) -> Result<()>;
}
