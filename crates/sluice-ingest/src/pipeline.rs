//! Pipeline coordinator
//!
//! Wires parser, batcher, scheduler and aggregator into one cancellable run
//! and exposes the caller-facing contract: feed it a byte source, get back a
//! single terminal [`PipelineOutcome`]. The producer path (read, parse,
//! batch, submit) is strictly sequential; only the store writes run
//! concurrently, bounded by the scheduler.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::{error, info};

use crate::batcher::Batcher;
use crate::error::IngestError;
use crate::outcome::{OutcomeAggregator, PipelineOutcome};
use crate::parser::RecordParser;
use crate::scheduler::WriteScheduler;
use crate::source::{FlowControl, PassiveFlow};
use crate::store::RecordStore;

/// Configuration for one ingestion run.
///
/// These are inputs, not constants; the defaults match the documented
/// contract (batches of 1000, at most 5 writes in flight).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records per batch; the final batch may be smaller.
    pub batch_capacity: usize,
    /// Maximum store writes in flight at once.
    pub concurrency_limit: usize,
    /// How long a halted run waits for in-flight writes to settle before
    /// aborting them.
    pub drain_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_capacity: 1000,
            concurrency_limit: 5,
            drain_timeout: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity;
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

/// Lifecycle of a pipeline. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// One-shot ingestion pipeline over a storage collaborator.
pub struct IngestPipeline {
    config: PipelineConfig,
    store: Arc<dyn RecordStore>,
    state: PipelineState,
}

impl IngestPipeline {
    /// Create a pipeline with default configuration.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(store, PipelineConfig::default())
    }

    /// Create a pipeline with explicit configuration.
    pub fn with_config(store: Arc<dyn RecordStore>, config: PipelineConfig) -> Self {
        Self {
            config,
            store,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run ingestion over a pull-based byte source (file, buffer).
    ///
    /// Suspends the caller until every accepted write has settled. The
    /// source is consumed and dropped before this returns, regardless of
    /// outcome.
    pub async fn run<R>(&mut self, source: R) -> PipelineOutcome
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.run_with_flow(source, Arc::new(PassiveFlow)).await
    }

    /// Run ingestion over a source with real flow control.
    ///
    /// The scheduler pauses `flow` while at its concurrency limit, resumes
    /// it when capacity frees up, and aborts it on the first failure.
    pub async fn run_with_flow<R>(
        &mut self,
        source: R,
        flow: Arc<dyn FlowControl>,
    ) -> PipelineOutcome
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if self.state != PipelineState::Idle {
            return PipelineOutcome::Failure {
                batches: 0,
                records: 0,
                error: IngestError::AlreadyStarted,
            };
        }
        self.state = PipelineState::Running;
        info!(
            batch_capacity = self.config.batch_capacity,
            concurrency_limit = self.config.concurrency_limit,
            "ingestion run started"
        );

        let mut scheduler = WriteScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&flow),
            self.config.concurrency_limit,
        );
        let mut tasks = Vec::new();
        let mut stream_error: Option<IngestError> = None;

        match RecordParser::new(source).await {
            Ok(parser) => {
                let mut batcher =
                    Batcher::new(Box::pin(parser.into_stream()), self.config.batch_capacity);

                loop {
                    if scheduler.halted() {
                        break;
                    }
                    match batcher.next_batch().await {
                        Some(Ok(batch)) => match scheduler.submit(batch).await {
                            Ok(task) => tasks.push(task),
                            Err(IngestError::Halted) => break,
                            Err(err) => {
                                stream_error = Some(err);
                                break;
                            },
                        },
                        Some(Err(err)) => {
                            // Stream-level error: stop the source for good.
                            // Buffered records were already discarded by the
                            // batcher, never flushed as a partial batch.
                            flow.abort();
                            stream_error = Some(err);
                            break;
                        },
                        None => break,
                    }
                }
                // The batcher, and the source reader inside it, drop here:
                // the stream handle is released exactly once, before any
                // outstanding write settles.
            },
            Err(err) => {
                flow.abort();
                stream_error = Some(err);
            },
        }

        let halted = scheduler.halted();
        let outcome = OutcomeAggregator::new(self.config.drain_timeout)
            .settle(tasks, stream_error, halted)
            .await;

        match &outcome {
            PipelineOutcome::Success { batches, records } => {
                self.state = PipelineState::Succeeded;
                info!(batches, records, "ingestion run succeeded");
            },
            PipelineOutcome::Failure {
                batches,
                records,
                error,
            } => {
                self.state = PipelineState::Failed;
                error!(batches, records, error = %error, "ingestion run failed");
            },
        }

        outcome
    }
}
