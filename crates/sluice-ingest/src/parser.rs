//! Record parser
//!
//! Decodes a delimited-text byte stream into a lazy, forward-only sequence
//! of [`Record`]s, preserving input row order. The first row is the header;
//! every following row must carry the same number of fields. Malformed rows
//! and stream I/O failures surface as a single stream-level error, after
//! which the parser is exhausted.

use std::sync::Arc;

use futures::stream::Stream;
use tokio::io::AsyncRead;

use crate::error::{IngestError, Result};
use crate::record::Record;

/// Pull-based CSV parser over any byte source.
///
/// Non-restartable: records can only be read once, in order.
pub struct RecordParser<R> {
    reader: csv_async::AsyncReader<R>,
    columns: Arc<[String]>,
    rows_read: u64,
    fused: bool,
}

impl<R> RecordParser<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Open a parser over the byte source and read its header row.
    ///
    /// A header that cannot be decoded fails the run before anything is
    /// dispatched downstream.
    pub async fn new(source: R) -> Result<Self> {
        let mut reader = csv_async::AsyncReaderBuilder::new()
            .flexible(false)
            .create_reader(source);

        let columns: Arc<[String]> = reader
            .headers()
            .await?
            .iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            reader,
            columns,
            rows_read: 0,
            fused: false,
        })
    }

    /// Column names from the header row, in input order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows decoded so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Decode the next row.
    ///
    /// Returns `None` at end-of-stream and after the first error; the error
    /// itself is yielded exactly once.
    pub async fn next_record(&mut self) -> Option<Result<Record>> {
        if self.fused {
            return None;
        }

        let mut row = csv_async::StringRecord::new();
        match self.reader.read_record(&mut row).await {
            Ok(true) => {
                self.rows_read += 1;
                let values = row.iter().map(str::to_string).collect();
                Some(Ok(Record::new(self.columns.clone(), values)))
            },
            Ok(false) => {
                self.fused = true;
                None
            },
            Err(err) => {
                self.fused = true;
                Some(Err(IngestError::Decode(err)))
            },
        }
    }

    /// Adapt the parser into a `Stream` of records.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record>> + Send
    where
        R: 'static,
    {
        futures::stream::unfold(self, |mut parser| async move {
            parser.next_record().await.map(|item| (item, parser))
        })
    }
}
