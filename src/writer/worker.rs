//! Worker and feeder tasks of the fan-out writer

use crate::sample::Sample;
use crate::sink::SampleSink;
use crate::Error;

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Intake channel item: a sample, or `None` when a sample is missing
pub(crate) type Slot = Option<Sample>;

/// Receiving half of the intake channel, shared by all workers
pub(crate) type SharedIntake = Arc<Mutex<mpsc::Receiver<Slot>>>;

/// Message a worker sends back to the caller
#[derive(Debug)]
pub(crate) enum Outcome {
    /// A single slot could not be persisted; the worker keeps going
    SampleFailed { worker: usize, error: Error },
    /// The worker committed its transaction
    Committed { worker: usize, persisted: u64 },
    /// The worker could not begin or commit its transaction
    WorkerFailed { worker: usize, error: Error },
}

/// Push slots into the intake channel, then close it by dropping the sender.
///
/// Returns the number of slots enqueued. Stops early on cancellation or when
/// every worker has gone away.
pub(crate) async fn feed<I>(slots: I, intake: mpsc::Sender<Slot>, cancel: CancellationToken) -> u64
where
    I: IntoIterator<Item = Slot>,
{
    let mut enqueued = 0u64;
    for slot in slots {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(enqueued, "Feeder cancelled");
                break;
            }
            sent = intake.send(slot) => {
                if sent.is_err() {
                    debug!(enqueued, "All workers exited, feeder stopping");
                    break;
                }
                enqueued += 1;
            }
        }
    }
    enqueued
}

/// Run one worker: begin a transaction, drain the intake channel into it,
/// then commit.
///
/// Per-slot failures are reported and do not stop the worker. Exactly one
/// terminal outcome is sent.
pub(crate) async fn run_worker(
    worker: usize,
    sink: Arc<dyn SampleSink>,
    intake: SharedIntake,
    outcomes: mpsc::UnboundedSender<Outcome>,
    cancel: CancellationToken,
) {
    let mut tx = match sink.begin().await {
        Ok(tx) => tx,
        Err(error) => {
            warn!(worker, error = %error, "Worker failed to begin transaction");
            let _ = outcomes.send(Outcome::WorkerFailed { worker, error });
            return;
        }
    };

    let mut persisted = 0u64;
    loop {
        let slot = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(worker, persisted, "Worker cancelled, committing what it has");
                break;
            }
            slot = next_slot(&intake) => slot,
        };

        // Closed and drained.
        let Some(slot) = slot else { break };

        let Some(sample) = slot else {
            let _ = outcomes.send(Outcome::SampleFailed {
                worker,
                error: Error::NullSample,
            });
            continue;
        };

        match tx.save(&sample).await {
            Ok(()) => persisted += 1,
            Err(error) => {
                debug!(worker, error = %error, "Sample rejected by sink");
                let _ = outcomes.send(Outcome::SampleFailed { worker, error });
            }
        }
    }

    let terminal = match tx.commit().await {
        Ok(()) => Outcome::Committed { worker, persisted },
        Err(error) => {
            warn!(worker, error = %error, "Worker failed to commit transaction");
            Outcome::WorkerFailed { worker, error }
        }
    };
    let _ = outcomes.send(terminal);
}

async fn next_slot(intake: &SharedIntake) -> Option<Slot> {
    intake.lock().await.recv().await
}
