//! In-memory sink for development and testing

use super::{SampleSink, SinkTransaction};
use crate::sample::Sample;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

type SavePredicate = dyn Fn(&Sample) -> bool + Send + Sync;

/// In-memory sink
///
/// Committed samples are kept in a shared vector. Failures can be injected
/// for `begin`, `save` and `commit`, and every call is counted, which makes
/// this sink suitable for exercising the writer's error paths.
///
/// Clones share committed samples, counters and injected failures, so a
/// failure configured on any clone applies to all of them.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    committed: Mutex<Vec<Sample>>,
    fail_save: Mutex<Option<Arc<SavePredicate>>>,
    /// `begin` calls numbered below this value are rejected
    fail_begins_below: AtomicU64,
    fail_commit: AtomicBool,
    begins: AtomicU64,
    saves: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl MemorySink {
    /// Create a sink that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every `save` call
    pub fn failing_saves(self) -> Self {
        self.fail_save_when(|_| true)
    }

    /// Reject `save` for samples matching `predicate`
    pub fn fail_save_when(self, predicate: impl Fn(&Sample) -> bool + Send + Sync + 'static) -> Self {
        *self.inner.fail_save.lock() = Some(Arc::new(predicate));
        self
    }

    /// Reject every `begin` call
    pub fn failing_begins(self) -> Self {
        self.fail_first_begins(u64::MAX)
    }

    /// Reject the first `count` calls to `begin`, counted from sink creation
    pub fn fail_first_begins(self, count: u64) -> Self {
        self.inner.fail_begins_below.store(count, Ordering::Relaxed);
        self
    }

    /// Reject every `commit` call
    pub fn failing_commits(self) -> Self {
        self.inner.fail_commit.store(true, Ordering::Relaxed);
        self
    }

    /// Samples committed so far, in commit order
    pub fn samples(&self) -> Vec<Sample> {
        self.inner.committed.lock().clone()
    }

    /// Number of committed samples
    pub fn len(&self) -> usize {
        self.inner.committed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn begin_attempts(&self) -> u64 {
        self.inner.begins.load(Ordering::Relaxed)
    }

    pub fn save_attempts(&self) -> u64 {
        self.inner.saves.load(Ordering::Relaxed)
    }

    pub fn commit_attempts(&self) -> u64 {
        self.inner.commits.load(Ordering::Relaxed)
    }

    pub fn rollbacks(&self) -> u64 {
        self.inner.rollbacks.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySink")
            .field("committed", &self.len())
            .field("fail_save", &self.inner.fail_save.lock().is_some())
            .field(
                "fail_begins_below",
                &self.inner.fail_begins_below.load(Ordering::Relaxed),
            )
            .field("fail_commit", &self.inner.fail_commit.load(Ordering::Relaxed))
            .finish()
    }
}

#[async_trait]
impl SampleSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn SinkTransaction>> {
        let attempt = self.inner.begins.fetch_add(1, Ordering::Relaxed);
        if attempt < self.inner.fail_begins_below.load(Ordering::Relaxed) {
            return Err(Error::Internal("memory sink: begin rejected".to_string()));
        }
        Ok(Box::new(MemoryTransaction {
            inner: self.inner.clone(),
            staged: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    staged: Vec<Sample>,
}

#[async_trait]
impl SinkTransaction for MemoryTransaction {
    async fn save(&mut self, sample: &Sample) -> Result<()> {
        self.inner.saves.fetch_add(1, Ordering::Relaxed);
        let fail = self.inner.fail_save.lock().clone();
        if let Some(fail) = fail {
            if fail(sample) {
                return Err(Error::Persist(format!(
                    "memory sink: save rejected for {} at {}",
                    sample.metric(),
                    sample.timestamp()
                )));
            }
        }
        self.staged.push(sample.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.inner.commits.fetch_add(1, Ordering::Relaxed);
        if this.inner.fail_commit.load(Ordering::Relaxed) {
            return Err(Error::Commit("memory sink: commit rejected".to_string()));
        }
        this.inner.committed.lock().extend(this.staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollbacks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
