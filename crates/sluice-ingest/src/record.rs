//! Core data model: records and batches
//!
//! A [`Record`] is one input row, kept verbatim as named string fields; a
//! [`Batch`] is the ordered, non-empty group of records handed to the store
//! as one write unit.

use std::sync::Arc;

/// One parsed input row: an ordered mapping of column name to field value.
///
/// Field contents are carried verbatim; nothing is validated or coerced.
/// The column list is shared across all records of a run, so cloning a
/// record is cheap. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl Record {
    /// Create a record from a shared column list and one row of values.
    ///
    /// The parser guarantees `values.len() == columns.len()`; rows with a
    /// different field count never make it this far.
    pub fn new(columns: Arc<[String]>, values: Vec<String>) -> Self {
        Self { columns, values }
    }

    /// Look up a field by column name.
    ///
    /// Returns `None` for a column that does not exist in this run's header.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    /// Column names, in input order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Field values, in input order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no fields (a header-less, empty row).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render the record as a JSON object for JSONB-style storage.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// An ordered, non-empty group of records submitted as one storage write.
///
/// Each batch is a fresh value produced by the batcher; no shared mutable
/// buffer crosses batch boundaries. From the moment a batch is dispatched it
/// is owned exclusively by its write task until the write completes.
#[derive(Debug, Clone)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    /// Wrap a non-empty run of records. Callers uphold non-emptiness; the
    /// batcher never flushes an empty buffer.
    pub fn new(records: Vec<Record>) -> Self {
        debug_assert!(!records.is_empty(), "batches are never empty");
        Self { records }
    }

    /// The records in this batch, in input order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records in this batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the batch, yielding its records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
