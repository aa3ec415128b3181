//! End-to-end pipeline tests: parse, batch, bounded concurrent writes, and
//! terminal outcome classification, driven through the public API.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sluice_ingest::{
    FlowControl, IngestError, IngestPipeline, PipelineConfig, PipelineState, Record, RecordStore,
    StoreError,
};

/// Store double that records every call and can fail one specific batch,
/// identified by the `id` of its first record.
#[derive(Default)]
struct ScriptedStore {
    calls: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
    stored_ids: Mutex<Vec<String>>,
    fail_when_first_id: Option<String>,
}

impl ScriptedStore {
    fn new() -> Self {
        Self::default()
    }

    fn failing_on(first_id: &str) -> Self {
        Self {
            fail_when_first_id: Some(first_id.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    fn stored_ids(&self) -> Vec<String> {
        self.stored_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn insert_many(&self, records: &[Record]) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(records.len());

        if let Some(marker) = &self.fail_when_first_id {
            if records[0].get("id") == Some(marker.as_str()) {
                return Err(StoreError::Rejected(format!(
                    "injected failure for batch starting at {marker}"
                )));
            }
        }

        let mut stored = self.stored_ids.lock().unwrap();
        stored.extend(records.iter().map(|r| r.get("id").unwrap().to_string()));
        Ok(())
    }
}

/// Flow control double visible to integration tests.
#[derive(Default)]
struct RecordingFlow {
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    aborts: AtomicUsize,
}

impl FlowControl for RecordingFlow {
    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

fn csv_rows(count: usize) -> Vec<u8> {
    let mut out = String::from("id,firstname,lastname,email,email2,profession\n");
    for i in 0..count {
        out.push_str(&format!(
            "{i},first{i},last{i},u{i}@example.com,alt{i}@example.com,engineer\n"
        ));
    }
    out.into_bytes()
}

#[tokio::test]
async fn test_2500_records_make_three_batches() {
    let store = Arc::new(ScriptedStore::new());
    let mut pipeline = IngestPipeline::with_config(
        store.clone(),
        PipelineConfig::new()
            .with_batch_capacity(1000)
            .with_concurrency_limit(5),
    );

    let outcome = pipeline.run(Cursor::new(csv_rows(2500))).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.batches(), 3);
    assert_eq!(outcome.records(), 2500);
    assert_eq!(store.calls(), 3);
    assert_eq!(store.batch_sizes(), vec![1000, 1000, 500]);

    // Round-trip law: concatenating the stored batches reproduces the
    // input sequence.
    let expected: Vec<String> = (0..2500).map(|i| i.to_string()).collect();
    assert_eq!(store.stored_ids(), expected);
}

#[tokio::test]
async fn test_failed_batch_wins_even_when_later_batches_succeed() {
    // Batch 1 (rows 1000..2000) fails; batches 0 and 2..4 succeed. The data
    // holds 8 batches, but production must stop once the failure lands.
    let store = Arc::new(ScriptedStore::failing_on("1000"));
    let flow = Arc::new(RecordingFlow::default());
    let mut pipeline = IngestPipeline::with_config(
        store.clone(),
        PipelineConfig::new()
            .with_batch_capacity(1000)
            .with_concurrency_limit(5),
    );

    let outcome = pipeline
        .run_with_flow(Cursor::new(csv_rows(8000)), flow.clone())
        .await;

    assert!(!outcome.is_success());
    match outcome.error() {
        Some(IngestError::Store { batch: 1, source }) => {
            assert!(source.to_string().contains("injected failure"));
        },
        other => panic!("expected batch 1's store error, got {:?}", other),
    }

    // The five batches admitted before the halt were each written exactly
    // once (no retry); nothing beyond them was ever dispatched.
    assert_eq!(store.calls(), 5);
    assert_eq!(store.batch_sizes(), vec![1000; 5]);
    assert_eq!(outcome.batches(), 5);
    assert_eq!(pipeline.state(), PipelineState::Failed);

    // The source was aborted exactly once, and never resumed after the halt.
    assert_eq!(flow.aborts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_decode_error_never_flushes_buffered_remainder() {
    // 1500 good rows, then a malformed row: one full batch is dispatched,
    // the 500 buffered records are dropped, and the run fails with the
    // decode error once the dispatched write settles.
    let mut input = csv_rows(1500);
    input.extend_from_slice(b"1500,first,last,a@example.com,b@example.com,engineer,EXTRA\n");

    let store = Arc::new(ScriptedStore::new());
    let flow = Arc::new(RecordingFlow::default());
    let mut pipeline = IngestPipeline::with_config(
        store.clone(),
        PipelineConfig::new()
            .with_batch_capacity(1000)
            .with_concurrency_limit(5),
    );

    let outcome = pipeline.run_with_flow(Cursor::new(input), flow.clone()).await;

    assert!(!outcome.is_success());
    assert!(outcome.error().unwrap().is_decode_error());
    assert_eq!(store.calls(), 1);
    assert_eq!(store.batch_sizes(), vec![1000]);
    assert_eq!(store.stored_ids().len(), 1000);
    assert_eq!(flow.aborts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_insert_is_called_exactly_once() {
    let store = Arc::new(ScriptedStore::failing_on("0"));
    let mut pipeline = IngestPipeline::with_config(
        store.clone(),
        PipelineConfig::new()
            .with_batch_capacity(100)
            .with_concurrency_limit(5),
    );

    let outcome = pipeline.run(Cursor::new(csv_rows(50))).await;

    assert!(!outcome.is_success());
    // At-least-once delivery, never more: the failed batch saw exactly one
    // insert call and was not silently retried.
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_backpressure_pauses_and_resumes_the_source() {
    // With a concurrency limit of 1 and several batches, admission has to
    // pause the source at least once and resume it when capacity frees up.
    let store = Arc::new(ScriptedStore::new());
    let flow = Arc::new(RecordingFlow::default());
    let mut pipeline = IngestPipeline::with_config(
        store.clone(),
        PipelineConfig::new()
            .with_batch_capacity(10)
            .with_concurrency_limit(1),
    );

    let outcome = pipeline
        .run_with_flow(Cursor::new(csv_rows(50)), flow.clone())
        .await;

    assert!(outcome.is_success());
    assert_eq!(store.calls(), 5);
    let pauses = flow.pauses.load(Ordering::SeqCst);
    let resumes = flow.resumes.load(Ordering::SeqCst);
    assert!(pauses >= 1, "expected at least one pause, saw {pauses}");
    assert_eq!(pauses, resumes);
    assert_eq!(flow.aborts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_source_succeeds_without_store_calls() {
    let store = Arc::new(ScriptedStore::new());
    let mut pipeline = IngestPipeline::new(store.clone());

    let outcome = pipeline.run(Cursor::new(csv_rows(0))).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.batches(), 0);
    assert_eq!(store.calls(), 0);
}
