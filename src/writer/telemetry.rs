//! Fan-out writer telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct WriterInstruments {
    batches: Counter<u64>,
    batch_duration_seconds: Histogram<f64>,
    batch_samples: Histogram<u64>,
    samples_persisted: Counter<u64>,
    failures: Counter<u64>,
}

fn instruments() -> &'static WriterInstruments {
    static INSTRUMENTS: OnceLock<WriterInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("promsink.writer");
        WriterInstruments {
            batches: meter
                .u64_counter("promsink.writer.batches")
                .with_description("Write batches by outcome")
                .init(),
            batch_duration_seconds: meter
                .f64_histogram("promsink.writer.batch.duration")
                .with_description("Time from first enqueue to last worker exit")
                .with_unit("s")
                .init(),
            batch_samples: meter
                .u64_histogram("promsink.writer.batch.samples")
                .with_description("Samples offered per write batch")
                .init(),
            samples_persisted: meter
                .u64_counter("promsink.writer.samples.persisted")
                .with_description("Samples committed by writer workers")
                .init(),
            failures: meter
                .u64_counter("promsink.writer.failures")
                .with_description("Worker failures by error kind")
                .init(),
        }
    })
}

pub fn record_batch(outcome: &'static str, duration_seconds: f64, samples: u64) {
    let i = instruments();
    i.batches.add(1, &[KeyValue::new("outcome", outcome)]);
    i.batch_duration_seconds.record(duration_seconds, &[]);
    i.batch_samples.record(samples, &[]);
}

pub fn record_committed(samples: u64) {
    instruments().samples_persisted.add(samples, &[]);
}

pub fn record_failure(kind: &'static str) {
    instruments()
        .failures
        .add(1, &[KeyValue::new("kind", kind)]);
}
