//! Batcher
//!
//! Groups the record sequence into fixed-size batches in input order: full
//! batches of exactly `capacity` records, then at most one final partial
//! batch. Deterministic: the same input and capacity always produce the
//! same partition, and concatenating the batches reproduces the input.

use futures::stream::{Stream, StreamExt};

use crate::error::Result;
use crate::record::{Batch, Record};

/// Pull-based batcher over a record stream.
pub struct Batcher<S> {
    stream: S,
    capacity: usize,
    done: bool,
}

impl<S> Batcher<S>
where
    S: Stream<Item = Result<Record>> + Unpin,
{
    /// Create a batcher emitting batches of at most `capacity` records.
    pub fn new(stream: S, capacity: usize) -> Self {
        Self {
            stream,
            capacity: capacity.max(1),
            done: false,
        }
    }

    /// The configured batch capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Accumulate the next batch.
    ///
    /// Returns `None` once the stream is exhausted. A stream-level error is
    /// yielded once, in place of a batch; any records buffered before the
    /// error are dropped, never flushed as a partial batch, and the batcher
    /// is exhausted afterwards.
    pub async fn next_batch(&mut self) -> Option<Result<Batch>> {
        if self.done {
            return None;
        }

        let mut records = Vec::with_capacity(self.capacity);
        while records.len() < self.capacity {
            match self.stream.next().await {
                Some(Ok(record)) => records.push(record),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                },
                None => {
                    self.done = true;
                    break;
                },
            }
        }

        if records.is_empty() {
            None
        } else {
            Some(Ok(Batch::new(records)))
        }
    }
}
