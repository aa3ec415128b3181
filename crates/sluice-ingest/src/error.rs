//! Error types for the ingestion pipeline

use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Terminal error kinds for one ingestion run.
///
/// Both decode and store failures halt the run and become its terminal
/// cause; they are surfaced once, through the run's outcome, and are never
/// retried internally.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed input row (wrong column count, bad encoding) or a stream
    /// I/O failure while reading the source.
    #[error("source decode error: {0}")]
    Decode(#[from] csv_async::Error),

    /// One batch's `insert_many` call failed.
    #[error("store insert failed for batch {batch}: {source}")]
    Store {
        batch: usize,
        #[source]
        source: StoreError,
    },

    /// A write task was torn down before it could settle.
    #[error("write task for batch {batch} was cancelled before completion")]
    TaskCancelled { batch: usize },

    /// An in-flight write did not settle within the drain window after the
    /// run was halted.
    #[error("write task for batch {batch} still in flight after {timeout:?} drain window")]
    DrainTimeout { batch: usize, timeout: Duration },

    /// A submit arrived after the run was halted; the batch was refused
    /// rather than dispatched.
    #[error("ingestion halted after a write failure; batch was not dispatched")]
    Halted,

    /// The scheduler was torn down while a submit was waiting for capacity.
    #[error("write scheduler is shut down")]
    SchedulerShutdown,

    /// `run` was invoked on a pipeline that already left the idle state.
    #[error("ingestion run already started; a pipeline runs exactly once")]
    AlreadyStarted,
}

impl IngestError {
    /// Whether this error came from the storage collaborator.
    pub fn is_store_error(&self) -> bool {
        matches!(self, IngestError::Store { .. })
    }

    /// Whether this error came from decoding the source stream.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, IngestError::Decode(_))
    }
}
