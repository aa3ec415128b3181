//! Outcome aggregation
//!
//! After the producer stops, every outstanding write is settled (a fan-in
//! join that never short-circuits) and the run collapses into one terminal
//! [`PipelineOutcome`]. The reported cause is the earliest failure by
//! submission order; completion order is never consulted.

use std::time::Duration;

use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::scheduler::WriteTask;

/// Terminal state of one ingestion run.
///
/// `batches`/`records` count what was submitted to the scheduler, whether or
/// not the individual writes succeeded.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every dispatched write succeeded and the source was fully consumed.
    Success { batches: usize, records: usize },
    /// At least one write or the source itself failed; `error` is the
    /// earliest-encountered cause.
    Failure {
        batches: usize,
        records: usize,
        error: IngestError,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success { .. })
    }

    /// Batches submitted during the run.
    pub fn batches(&self) -> usize {
        match self {
            PipelineOutcome::Success { batches, .. } => *batches,
            PipelineOutcome::Failure { batches, .. } => *batches,
        }
    }

    /// Records submitted during the run.
    pub fn records(&self) -> usize {
        match self {
            PipelineOutcome::Success { records, .. } => *records,
            PipelineOutcome::Failure { records, .. } => *records,
        }
    }

    /// The terminal cause, if the run failed.
    pub fn error(&self) -> Option<&IngestError> {
        match self {
            PipelineOutcome::Success { .. } => None,
            PipelineOutcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Collects per-batch results into one terminal outcome.
pub struct OutcomeAggregator {
    drain_timeout: Duration,
}

impl OutcomeAggregator {
    /// Create an aggregator with the given drain window for halted runs.
    pub fn new(drain_timeout: Duration) -> Self {
        Self { drain_timeout }
    }

    /// Settle every task in submission order, then classify the run.
    ///
    /// No short-circuiting: later tasks are awaited even after an earlier
    /// failure, so their resources drain cleanly. When the run was `halted`
    /// (or carries a stream error), each remaining settle is bounded by a
    /// shared drain deadline; a task that misses it is aborted and recorded
    /// as a drain timeout.
    ///
    /// Cause precedence: earliest real write failure by submission order,
    /// then the stream-level error, then a synthesized drain timeout. Drain
    /// timeouts are artifacts of tearing the run down and must not mask the
    /// failure that triggered it.
    pub async fn settle(
        &self,
        tasks: Vec<WriteTask>,
        stream_error: Option<IngestError>,
        halted: bool,
    ) -> PipelineOutcome {
        let batches = tasks.len();
        let bounded = halted || stream_error.is_some();
        let deadline = Instant::now() + self.drain_timeout;

        let mut records = 0;
        let mut first_error: Option<IngestError> = None;
        let mut drain_error: Option<IngestError> = None;

        for task in tasks {
            records += task.record_count();
            let index = task.batch_index();

            let settled = if bounded {
                let abort = task.abort_handle();
                match timeout_at(deadline, task.settle()).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            batch = index,
                            timeout = ?self.drain_timeout,
                            "write still in flight after drain window, aborting"
                        );
                        abort.abort();
                        Err(IngestError::DrainTimeout {
                            batch: index,
                            timeout: self.drain_timeout,
                        })
                    },
                }
            } else {
                task.settle().await
            };

            match settled {
                Ok(()) => {},
                Err(err @ IngestError::DrainTimeout { .. }) => {
                    if drain_error.is_none() {
                        drain_error = Some(err);
                    }
                },
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    } else {
                        debug!(batch = index, error = %err, "later write also failed");
                    }
                },
            }
        }

        match first_error.or(stream_error).or(drain_error) {
            None => PipelineOutcome::Success { batches, records },
            Some(error) => PipelineOutcome::Failure {
                batches,
                records,
                error,
            },
        }
    }
}
