//! Storage collaborator
//!
//! The pipeline only ever asks the store one thing: insert this batch of
//! records, all-or-nothing. Retry policy, if any, lives behind this trait;
//! the scheduler never re-submits a failed batch (at-least-once per batch is
//! the delivery contract).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::record::Record;

/// Error from a single `insert_many` call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the batch (constraint violation, closed target).
    #[error("storage rejected batch: {0}")]
    Rejected(String),

    /// The storage backend failed (connection loss, I/O, query failure).
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// A backing store that accepts batches of records.
///
/// `insert_many` is all-or-nothing per call and must be safe to call
/// concurrently with itself for distinct calls touching disjoint batches.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert every record of the batch, or none of them.
    async fn insert_many(&self, records: &[Record]) -> Result<(), StoreError>;
}

/// In-process store backed by a vector.
///
/// Used by the CLI's dry-run mode and by tests; every accepted record is
/// kept, in insertion order per batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Record>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records accepted so far.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    /// Whether nothing has been accepted yet.
    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Snapshot of the accepted records.
    pub async fn records(&self) -> Vec<Record> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_many(&self, records: &[Record]) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.extend_from_slice(records);
        Ok(())
    }
}

#[cfg(feature = "database")]
pub use self::postgres::PostgresStore;

#[cfg(feature = "database")]
mod postgres {
    use async_trait::async_trait;
    use sqlx::{PgPool, Postgres, QueryBuilder};

    use super::{RecordStore, StoreError};
    use crate::record::Record;

    const INSERT_PREFIX: &str = "INSERT INTO ingested_records (payload) ";

    /// Postgres-backed store: one multi-row INSERT per batch, records stored
    /// as JSONB payloads. A single statement keeps the batch atomic.
    pub struct PostgresStore {
        pool: PgPool,
    }

    impl PostgresStore {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl RecordStore for PostgresStore {
        async fn insert_many(&self, records: &[Record]) -> Result<(), StoreError> {
            let mut query = QueryBuilder::<Postgres>::new(INSERT_PREFIX);
            query.push_values(records, |mut row, record| {
                row.push_bind(record.to_json());
            });

            query
                .build()
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.into()))?;

            Ok(())
        }
    }
}
