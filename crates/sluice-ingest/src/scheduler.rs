//! Write scheduler
//!
//! Bounds the number of concurrent store writes and propagates backpressure
//! upstream. Capacity is an owned semaphore, never ambient state; the only
//! ways in are `submit` and `active_count`.
//!
//! Backpressure is applied at admission time: when a submit arrives while
//! every permit is taken, the source is paused before the producer suspends
//! on the semaphore. The first completion that frees capacity resumes the
//! source. A write failure flips the scheduler into its halted state and
//! aborts the source for good; writes already in flight are left to drain so
//! their resources are released cleanly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error};

use crate::error::{IngestError, Result};
use crate::record::Batch;
use crate::source::FlowControl;
use crate::store::{RecordStore, StoreError};

/// Handle for one in-flight store write of exactly one batch.
///
/// Created on dispatch, resolved exactly once by [`WriteTask::settle`].
#[derive(Debug)]
pub struct WriteTask {
    batch: usize,
    records: usize,
    handle: JoinHandle<std::result::Result<(), StoreError>>,
}

impl WriteTask {
    /// Submission index of the batch this write carries (0-based).
    pub fn batch_index(&self) -> usize {
        self.batch
    }

    /// Number of records in the dispatched batch.
    pub fn record_count(&self) -> usize {
        self.records
    }

    pub(crate) fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }

    /// Wait for the write to settle, consuming the task.
    pub async fn settle(self) -> Result<()> {
        match self.handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(IngestError::Store {
                batch: self.batch,
                source,
            }),
            Err(_) => Err(IngestError::TaskCancelled { batch: self.batch }),
        }
    }
}

/// Bounded dispatcher of batches to the storage collaborator.
pub struct WriteScheduler {
    store: Arc<dyn RecordStore>,
    flow: Arc<dyn FlowControl>,
    limit: usize,
    permits: Arc<Semaphore>,
    paused: Arc<AtomicBool>,
    halted: Arc<AtomicBool>,
    submitted: AtomicUsize,
}

impl WriteScheduler {
    /// Create a scheduler allowing up to `limit` writes in flight.
    pub fn new(store: Arc<dyn RecordStore>, flow: Arc<dyn FlowControl>, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            store,
            flow,
            limit,
            permits: Arc::new(Semaphore::new(limit)),
            paused: Arc::new(AtomicBool::new(false)),
            halted: Arc::new(AtomicBool::new(false)),
            submitted: AtomicUsize::new(0),
        }
    }

    /// Number of writes currently unresolved. Never exceeds the limit.
    pub fn active_count(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    /// The configured concurrency limit.
    pub fn concurrency_limit(&self) -> usize {
        self.limit
    }

    /// Batches admitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Whether a write failure has stopped ingestion for good.
    pub fn halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Admit a batch and dispatch its write.
    ///
    /// Suspends the caller while the scheduler is at its concurrency limit;
    /// the source is paused before the wait begins. Once admitted, the batch
    /// is dispatched immediately on its own task, without waiting for prior
    /// writes.
    pub async fn submit(&self, batch: Batch) -> Result<WriteTask> {
        if self.permits.available_permits() == 0 {
            self.paused.store(true, Ordering::SeqCst);
            self.flow.pause();
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestError::SchedulerShutdown)?;

        // A failure may have landed while this submit was suspended; once
        // halted, nothing new is dispatched.
        if self.halted.load(Ordering::SeqCst) {
            return Err(IngestError::Halted);
        }

        let index = self.submitted.fetch_add(1, Ordering::SeqCst);
        let records = batch.len();
        debug!(
            batch = index,
            records,
            active = self.active_count(),
            "batch admitted"
        );

        let store = Arc::clone(&self.store);
        let flow = Arc::clone(&self.flow);
        let paused = Arc::clone(&self.paused);
        let halted = Arc::clone(&self.halted);

        let handle = tokio::spawn(async move {
            let result = store.insert_many(batch.records()).await;

            if let Err(ref err) = result {
                error!(batch = index, error = %err, "batch insert failed, halting ingestion");
                // First failure wins the halt; the source is aborted once.
                // No retry here: retry policy belongs to the store.
                if !halted.swap(true, Ordering::SeqCst) {
                    flow.abort();
                }
            }

            drop(permit);
            if paused.swap(false, Ordering::SeqCst) && !halted.load(Ordering::SeqCst) {
                flow.resume();
            }

            result
        });

        Ok(WriteTask {
            batch: index,
            records,
            handle,
        })
    }
}
