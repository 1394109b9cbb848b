//! Fan-out writer
//!
//! Delivers a batch of samples to a [`SampleSink`] through a fixed pool of
//! worker tasks:
//!
//! ```text
//!              ┌──────────────┐  bounded intake  ┌──────────┐
//!   samples ──▶│    feeder    │─────────────────▶│ worker 0 │──┐
//!              └──────────────┘        │         └──────────┘  │
//!                                      ├────────▶│ worker 1 │──┤ outcomes
//!                                      └────────▶│ worker N │──┤
//!                                                └──────────┘  ▼
//!                                                           caller
//! ```
//!
//! Each worker owns one sink transaction for the whole batch. Per-sample
//! failures are reported and the worker keeps consuming; every worker commits
//! when the intake drains. The first error observed on the outcome channel is
//! the batch result. On that first error the batch is cancelled (feeder stops,
//! workers stop pulling and commit what they hold) and `write` joins every
//! task before returning. Work already committed is never rolled back, so a
//! failed batch may be partially persisted.

mod telemetry;
mod worker;

use worker::{feed, run_worker, Outcome, Slot};

use crate::sample::Sample;
use crate::sink::SampleSink;
use crate::{Error, Result};

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the fan-out writer
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Number of concurrent workers (one sink transaction each)
    pub workers: usize,
    /// Intake channel capacity per worker
    pub queue_depth_per_worker: usize,
    /// Stop feeding and pulling samples once the first error is observed
    pub cancel_on_first_error: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_depth_per_worker: 4,
            cancel_on_first_error: true,
        }
    }
}

impl WriterConfig {
    fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    fn intake_capacity(&self) -> usize {
        self.worker_count() * self.queue_depth_per_worker.max(1)
    }
}

/// Writes sample batches to a sink with bounded parallelism
pub struct FanOutWriter {
    sink: Arc<dyn SampleSink>,
    config: WriterConfig,
}

impl FanOutWriter {
    /// Create a writer with the default configuration
    pub fn new(sink: Arc<dyn SampleSink>) -> Self {
        Self::with_config(sink, WriterConfig::default())
    }

    pub fn with_config(sink: Arc<dyn SampleSink>, config: WriterConfig) -> Self {
        Self { sink, config }
    }

    /// Write a batch of samples, returning the first error observed
    pub async fn write(&self, samples: Vec<Sample>) -> Result<()> {
        self.write_slots(samples.into_iter().map(Some)).await
    }

    /// Write a batch in which some slots may be missing their sample.
    ///
    /// Missing slots are reported as [`Error::NullSample`] and skipped.
    pub async fn write_slots<I>(&self, slots: I) -> Result<()>
    where
        I: IntoIterator<Item = Slot>,
        I::IntoIter: Send + 'static,
    {
        let start = Instant::now();
        let workers = self.config.worker_count();
        let (intake_tx, intake_rx) = mpsc::channel::<Slot>(self.config.intake_capacity());
        let intake_rx = Arc::new(Mutex::new(intake_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcome>();
        let cancel = CancellationToken::new();

        // Workers first, so the pool exists before any slot is sent.
        let mut workers_set = JoinSet::new();
        for id in 0..workers {
            workers_set.spawn(run_worker(
                id,
                self.sink.clone(),
                intake_rx.clone(),
                outcome_tx.clone(),
                cancel.clone(),
            ));
        }
        drop(intake_rx);
        drop(outcome_tx);

        let feeder = tokio::spawn(feed(slots.into_iter(), intake_tx, cancel.clone()));

        let mut first_error: Option<Error> = None;
        let mut persisted = 0u64;
        let mut failures = 0u64;

        // The outcome channel closes once every worker has exited.
        while let Some(outcome) = outcome_rx.recv().await {
            let error = match outcome {
                Outcome::Committed { worker, persisted: n } => {
                    debug!(worker, persisted = n, "Worker committed");
                    telemetry::record_committed(n);
                    persisted += n;
                    continue;
                }
                Outcome::SampleFailed { worker, error } | Outcome::WorkerFailed { worker, error } => {
                    debug!(worker, error = %error, "Worker reported failure");
                    error
                }
            };

            failures += 1;
            telemetry::record_failure(error.kind());
            if first_error.is_none() {
                if self.config.cancel_on_first_error {
                    cancel.cancel();
                }
                first_error = Some(error);
            }
        }

        while let Some(joined) = workers_set.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Writer worker task failed");
                first_error.get_or_insert_with(|| Error::Internal(format!("writer worker failed: {e}")));
            }
        }

        let enqueued = match feeder.await {
            Ok(enqueued) => enqueued,
            Err(e) => {
                warn!(error = %e, "Writer feeder task failed");
                first_error.get_or_insert_with(|| Error::Internal(format!("writer feeder failed: {e}")));
                0
            }
        };

        let elapsed = start.elapsed();
        let outcome = if first_error.is_some() { "error" } else { "ok" };
        telemetry::record_batch(outcome, elapsed.as_secs_f64(), enqueued);

        match first_error {
            Some(error) => {
                warn!(
                    sink = self.sink.name(),
                    enqueued,
                    persisted,
                    failures,
                    error = %error,
                    "Write batch failed"
                );
                Err(error)
            }
            None => {
                info!(
                    sink = self.sink.name(),
                    enqueued,
                    persisted,
                    workers,
                    duration_ms = elapsed.as_millis() as u64,
                    "Write batch committed"
                );
                Ok(())
            }
        }
    }
}
