//! Sluice Ingest Library
//!
//! Streaming record ingestion: decode a delimited-text byte stream into
//! records, group them into fixed-size batches, and persist each batch
//! through a bounded number of concurrent store writes, applying
//! backpressure to the source when the store cannot keep up.
//!
//! # Pipeline shape
//!
//! byte stream → [`parser::RecordParser`] → [`batcher::Batcher`] →
//! [`scheduler::WriteScheduler`] → [`outcome::OutcomeAggregator`] →
//! [`outcome::PipelineOutcome`], wired together by
//! [`pipeline::IngestPipeline`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sluice_ingest::{IngestPipeline, MemoryStore, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let mut pipeline = IngestPipeline::with_config(
//!         store,
//!         PipelineConfig::new().with_batch_capacity(500),
//!     );
//!
//!     let file = tokio::fs::File::open("users.csv").await?;
//!     let outcome = pipeline.run(file).await;
//!     println!("ingested {} records", outcome.records());
//!     Ok(())
//! }
//! ```

pub mod batcher;
pub mod error;
pub mod outcome;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod scheduler;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use error::{IngestError, Result};
pub use outcome::{OutcomeAggregator, PipelineOutcome};
pub use pipeline::{IngestPipeline, PipelineConfig, PipelineState};
pub use record::{Batch, Record};
pub use scheduler::{WriteScheduler, WriteTask};
pub use source::{FlowControl, PassiveFlow};
pub use store::{MemoryStore, RecordStore, StoreError};

#[cfg(feature = "database")]
pub use store::PostgresStore;
