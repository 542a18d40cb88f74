use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tonic::codec::Streaming;
use tracing::debug;

use super::error::ClientError;
use crate::error::check_stat;
use crate::proto::{self, Reply};

/// A streaming response frame that yields a batch of items.
pub trait ResponseFrame: Reply + Send + 'static {
    type Item: Send + 'static;

    /// Data version the frame was read at, if the operation reports one.
    fn version(&self) -> Option<u64> {
        None
    }

    fn into_items(self) -> Vec<Self::Item>;
}

impl ResponseFrame for proto::RawValuesResponse {
    type Item = proto::RawPoint;

    fn version(&self) -> Option<u64> {
        Some(self.version_major)
    }

    fn into_items(self) -> Vec<Self::Item> {
        self.values
    }
}

impl ResponseFrame for proto::AlignedWindowsResponse {
    type Item = proto::StatPoint;

    fn version(&self) -> Option<u64> {
        Some(self.version_major)
    }

    fn into_items(self) -> Vec<Self::Item> {
        self.values
    }
}

impl ResponseFrame for proto::WindowsResponse {
    type Item = proto::StatPoint;

    fn version(&self) -> Option<u64> {
        Some(self.version_major)
    }

    fn into_items(self) -> Vec<Self::Item> {
        self.values
    }
}

impl ResponseFrame for proto::ChangesResponse {
    type Item = proto::ChangedRange;

    fn version(&self) -> Option<u64> {
        Some(self.version_major)
    }

    fn into_items(self) -> Vec<Self::Item> {
        self.ranges
    }
}

impl ResponseFrame for proto::ListCollectionsResponse {
    type Item = String;

    fn into_items(self) -> Vec<Self::Item> {
        self.collections
    }
}

impl ResponseFrame for proto::LookupStreamsResponse {
    type Item = proto::StreamDescriptor;

    fn into_items(self) -> Vec<Self::Item> {
        self.results
    }
}

/// One exported CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub is_header: bool,
    pub cells: Vec<String>,
}

impl ResponseFrame for proto::GenerateCsvResponse {
    type Item = CsvRow;

    fn into_items(self) -> Vec<Self::Item> {
        vec![CsvRow {
            is_header: self.is_header,
            cells: self.row,
        }]
    }
}

impl ResponseFrame for proto::SqlQueryResponse {
    /// A JSON-encoded row.
    type Item = Vec<u8>;

    fn into_items(self) -> Vec<Self::Item> {
        self.sql_query_row
    }
}

/// Items of a streaming call plus its single terminal status.
///
/// A reader task pulls frames off the transport into a bounded buffer, so a slow consumer
/// applies backpressure to the server. Items and the terminal status are kept apart: iterate
/// with [`next`](Self::next), then call [`status`](Self::status). Dropping the cursor cancels the
/// call.
pub struct Cursor<T> {
    batches: mpsc::Receiver<(Option<u64>, Vec<T>)>,
    current: std::vec::IntoIter<T>,
    version: Option<u64>,
    status: oneshot::Receiver<Result<(), ClientError>>,
    reader: JoinHandle<()>,
}

impl<T: Send + 'static> Cursor<T> {
    pub(crate) fn spawn<F>(frames: Streaming<F>, deadline: Option<Instant>, buffer: usize) -> Self
    where
        F: ResponseFrame<Item = T>,
    {
        let (batch_tx, batches) = mpsc::channel(buffer.max(1));
        let (status_tx, status) = oneshot::channel();

        let reader = tokio::spawn(async move {
            let pump = pump(frames, batch_tx);
            let result = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, pump)
                    .await
                    .unwrap_or(Err(ClientError::DeadlineExceeded)),
                None => pump.await,
            };
            let _ = status_tx.send(result);
        });

        Self {
            batches,
            current: Vec::new().into_iter(),
            version: None,
            status,
            reader,
        }
    }

    /// The next item, or `None` once the stream has ended (successfully or not).
    pub async fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.current.next() {
                return Some(item);
            }
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Option<()> {
        let (version, batch) = self.batches.recv().await?;
        if self.version.is_none() {
            self.version = version;
        }
        self.current = batch.into_iter();
        Some(())
    }

    /// The data version the call was resolved at.
    ///
    /// Waits for the first frame if none has arrived. `None` when the stream ended without data
    /// frames (for example an empty `Changes`); the cause, if any, is reported by `status`.
    pub async fn version(&mut self) -> Option<u64> {
        if self.version.is_none() && self.current.len() == 0 {
            self.fill().await;
        }
        self.version
    }

    /// Discard any remaining items and return the terminal status.
    pub async fn status(mut self) -> Result<(), ClientError> {
        while self.batches.recv().await.is_some() {}
        (&mut self.status).await.unwrap_or(Err(ClientError::Closed))
    }

    /// Every remaining item, or the terminal error.
    pub async fn collect(mut self) -> Result<Vec<T>, ClientError> {
        let mut items: Vec<T> = self.current.by_ref().collect();
        while let Some((version, batch)) = self.batches.recv().await {
            if self.version.is_none() {
                self.version = version;
            }
            items.extend(batch);
        }
        (&mut self.status).await.unwrap_or(Err(ClientError::Closed))?;
        Ok(items)
    }
}

impl<T> Drop for Cursor<T> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn pump<F: ResponseFrame>(
    mut frames: Streaming<F>,
    batches: mpsc::Sender<(Option<u64>, Vec<F::Item>)>,
) -> Result<(), ClientError> {
    while let Some(frame) = frames.message().await? {
        check_stat(frame.stat())?;
        let version = frame.version();
        if batches.send((version, frame.into_items())).await.is_err() {
            debug!("Cursor dropped, abandoning stream");
            return Ok(());
        }
    }
    Ok(())
}
