//! Dedicated writer task for streaming encoded events.
//!
//! Producers encode events on their own thread of control and hand the bytes
//! to a writer task through an mpsc channel. The task batches whatever is
//! queued into a single vectored write.
//!
//! # Architecture
//!
//! ```text
//! EventSender ─► Encoder ─► mpsc::Sender<Bytes> ─► Writer Task ─► AsyncWrite
//! ```
//!
//! Backpressure is a semaphore of `max_pending_events` slots: each queued
//! event holds one until the writer task has flushed it.
//!
//! The protocol has one producer per stream, so [`EventSender`] owns the
//! [`Encoder`]; event order on the wire is send order.
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> general_writer::error::Result<()> {
//! use std::io::Cursor;
//!
//! use general_writer::codec::EncoderConfig;
//! use general_writer::protocol::Event;
//! use general_writer::writer::{EventSender, WriterConfig};
//!
//! let (mut sender, task) =
//!     EventSender::spawn(Cursor::new(Vec::new()), EncoderConfig::default(), WriterConfig::default())?;
//! sender.send(&Event::OpenStream).await?;
//! sender.send(&Event::NewTable { id: 1, name: "reads".into() }).await?;
//! sender.finish().await?;
//! task.await.unwrap()?;
//! # Ok(())
//! # }
//! ```

use std::io::IoSlice;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;

use crate::codec::{Encoder, EncoderConfig};
use crate::error::{GwError, Result};
use crate::protocol::Event;

/// Default maximum pending events before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_EVENTS: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum events to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum pending events before backpressure kicks in.
    pub max_pending_events: usize,
    /// Channel capacity for the event queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_events: DEFAULT_MAX_PENDING_EVENTS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

impl WriterConfig {
    pub fn max_pending_events(mut self, max: usize) -> Self {
        self.max_pending_events = max;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.backpressure_timeout = timeout;
        self
    }
}

/// Encoded event in flight. Its slot is released once the bytes are written.
struct Queued {
    bytes: Bytes,
    _slot: OwnedSemaphorePermit,
}

/// Handle for queueing encoded bytes to the writer task.
///
/// Every queued event holds one of `max_pending` slots until the writer task
/// has flushed it. Cloning shares the queue; callers are responsible for
/// keeping events of one stream in order.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Queued>,
    slots: Arc<Semaphore>,
    max_pending: usize,
    timeout: Duration,
}

impl WriterHandle {
    fn new(tx: mpsc::Sender<Queued>, max_pending: usize, timeout: Duration) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            tx,
            slots: Arc::new(Semaphore::new(max_pending)),
            max_pending,
            timeout,
        }
    }

    /// Queue encoded bytes.
    ///
    /// Waits for a free slot while backpressure is active, failing with
    /// `BackpressureTimeout` after the configured duration.
    pub async fn send(&self, bytes: Bytes) -> Result<()> {
        let slot = match self.slots.clone().try_acquire_owned() {
            Ok(slot) => slot,
            Err(TryAcquireError::Closed) => return Err(GwError::ConnectionClosed),
            Err(TryAcquireError::NoPermits) => {
                let acquire = self.slots.clone().acquire_owned();
                match tokio::time::timeout(self.timeout, acquire).await {
                    Ok(Ok(slot)) => slot,
                    Ok(Err(_)) => return Err(GwError::ConnectionClosed),
                    Err(_) => {
                        tracing::warn!(pending = self.pending_count(), "backpressure timeout");
                        return Err(GwError::BackpressureTimeout);
                    }
                }
            }
        };

        // A failed send drops the event and its slot with it.
        self.tx
            .send(Queued { bytes, _slot: slot })
            .await
            .map_err(|_| GwError::ConnectionClosed)
    }

    /// Queue encoded bytes without waiting.
    ///
    /// Returns `Err(BackpressureTimeout)` immediately if every slot is taken.
    pub fn try_send(&self, bytes: Bytes) -> Result<()> {
        let slot = self.slots.clone().try_acquire_owned().map_err(|e| match e {
            TryAcquireError::NoPermits => GwError::BackpressureTimeout,
            TryAcquireError::Closed => GwError::ConnectionClosed,
        })?;

        self.tx
            .try_send(Queued { bytes, _slot: slot })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => GwError::BackpressureTimeout,
                mpsc::error::TrySendError::Closed(_) => GwError::ConnectionClosed,
            })
    }

    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.slots.available_permits() == 0
    }

    /// Events queued but not yet written.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.max_pending - self.slots.available_permits()
    }
}

/// Spawn the writer task and return a handle for queueing bytes.
///
/// The task finishes with `Ok(())` once every handle is dropped and the
/// queue is drained.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let handle = WriterHandle::new(tx, config.max_pending_events, config.backpressure_timeout);
    let task = tokio::spawn(writer_loop(rx, writer));
    (handle, task)
}

/// Spawn the writer task with default configuration.
pub fn spawn_writer_task_default<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(writer, WriterConfig::default())
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<Queued>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
    let mut written: u64 = 0;

    while rx.recv_many(&mut batch, MAX_BATCH_SIZE).await > 0 {
        let mut slices: Vec<IoSlice<'_>> = batch
            .iter()
            .filter(|q| !q.bytes.is_empty())
            .map(|q| IoSlice::new(&q.bytes))
            .collect();
        let n = write_all_vectored(&mut writer, &mut slices).await?;
        written += n as u64;
        tracing::debug!(events = batch.len(), bytes = n, "wrote batch");

        // Frees the slots of everything just written.
        batch.clear();
    }

    writer.shutdown().await?;
    tracing::debug!(bytes = written, "writer task finished");
    Ok(())
}

/// Write every slice with scatter/gather I/O and flush, returning the bytes
/// written.
async fn write_all_vectored<W>(writer: &mut W, mut bufs: &mut [IoSlice<'_>]) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut total = 0;
    while !bufs.is_empty() {
        let n = writer.write_vectored(bufs).await?;
        if n == 0 {
            return Err(GwError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total += n;
        IoSlice::advance_slices(&mut bufs, n);
    }

    writer.flush().await?;
    Ok(total)
}

/// Producer side of one stream: encodes events and queues them.
pub struct EventSender {
    encoder: Encoder,
    handle: WriterHandle,
}

impl EventSender {
    pub fn new(encoder: Encoder, handle: WriterHandle) -> Self {
        Self { encoder, handle }
    }

    /// Spawn a writer task on `writer` and wrap it with a fresh encoder.
    pub fn spawn<W>(
        writer: W,
        encoder: EncoderConfig,
        config: WriterConfig,
    ) -> Result<(Self, JoinHandle<Result<()>>)>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let encoder = Encoder::new(encoder)?;
        let (handle, task) = spawn_writer_task(writer, config);
        Ok((Self::new(encoder, handle), task))
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Direct access for the typed `write_*` operations.
    pub fn encoder_mut(&mut self) -> &mut Encoder {
        &mut self.encoder
    }

    pub fn handle(&self) -> &WriterHandle {
        &self.handle
    }

    /// Encode and queue one event.
    pub async fn send(&mut self, event: &Event) -> Result<()> {
        let bytes = self.encoder.encode(event)?;
        self.handle.send(bytes).await
    }

    /// Queue bytes produced by [`Encoder`] methods on [`Self::encoder_mut`].
    pub async fn send_encoded(&self, bytes: Bytes) -> Result<()> {
        self.handle.send(bytes).await
    }

    /// Queue end-stream and release the writer.
    ///
    /// The writer task completes once the queue drains.
    pub async fn finish(mut self) -> Result<()> {
        if !self.encoder.is_closed() {
            let bytes = self.encoder.write_end_stream()?;
            self.handle.send(bytes).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Decoder;
    use crate::protocol::{Packing, HEADER_SIZE};
    use std::io::Cursor;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_writer_config_default() {
        let config = WriterConfig::default();
        assert_eq!(config.max_pending_events, DEFAULT_MAX_PENDING_EVENTS);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.backpressure_timeout, DEFAULT_BACKPRESSURE_TIMEOUT);
    }

    #[test]
    fn test_writer_config_builder() {
        let config = WriterConfig::default()
            .max_pending_events(8)
            .channel_capacity(4)
            .backpressure_timeout(Duration::from_millis(10));
        assert_eq!(config.max_pending_events, 8);
        assert_eq!(config.channel_capacity, 4);
        assert_eq!(config.backpressure_timeout, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task_default(client);

        handle.send(Bytes::from_static(b"hello")).await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn test_writer_handle_pending_count() {
        let (client, _server) = duplex(4096);
        let config = WriterConfig::default().max_pending_events(1000).channel_capacity(100);
        let (handle, _task) = spawn_writer_task(client, config);

        assert_eq!(handle.pending_count(), 0);
        assert!(!handle.is_backpressure_active());
    }

    #[tokio::test]
    async fn test_try_send_at_capacity() {
        let (tx, _rx) = mpsc::channel::<Queued>(10);
        let handle = WriterHandle::new(tx, 1, Duration::from_secs(1));

        handle.try_send(Bytes::from_static(b"a")).unwrap();
        assert!(handle.is_backpressure_active());
        assert_eq!(handle.pending_count(), 1);

        let result = handle.try_send(Bytes::from_static(b"b"));
        assert!(matches!(result, Err(GwError::BackpressureTimeout)));
        assert_eq!(handle.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_send_times_out_under_backpressure() {
        let (tx, _rx) = mpsc::channel::<Queued>(10);
        let handle = WriterHandle::new(tx, 1, Duration::from_millis(5));

        handle.send(Bytes::from_static(b"a")).await.unwrap();
        let result = handle.send(Bytes::from_static(b"b")).await;
        assert!(matches!(result, Err(GwError::BackpressureTimeout)));
        assert_eq!(handle.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_send_resumes_when_slot_frees() {
        let (tx, mut rx) = mpsc::channel::<Queued>(10);
        let handle = WriterHandle::new(tx, 1, Duration::from_secs(5));
        handle.send(Bytes::from_static(b"a")).await.unwrap();

        let drain = tokio::spawn(async move {
            let first = rx.recv().await.unwrap();
            assert_eq!(first.bytes, Bytes::from_static(b"a"));
            drop(first);
            rx.recv().await.unwrap().bytes
        });

        handle.send(Bytes::from_static(b"b")).await.unwrap();
        assert_eq!(drain.await.unwrap(), Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn test_send_after_task_gone() {
        let (tx, rx) = mpsc::channel::<Queued>(10);
        drop(rx);
        let handle = WriterHandle::new(tx, 10, Duration::from_secs(1));

        let result = handle.send(Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(GwError::ConnectionClosed)));
        assert_eq!(handle.pending_count(), 0);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let (tx, _rx) = mpsc::channel::<Queued>(1);
        let handle = WriterHandle::new(tx, 0, Duration::from_secs(1));
        assert_eq!(handle.pending_count(), 0);
        assert!(!handle.is_backpressure_active());
    }

    #[tokio::test]
    async fn test_write_all_vectored_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let parts: Vec<_> = (0..5).map(|_| Bytes::from_static(b"abc")).collect();
        let mut slices: Vec<_> = parts.iter().map(|b| IoSlice::new(b)).collect();

        let n = write_all_vectored(&mut buf, &mut slices).await.unwrap();

        assert_eq!(n, 15);
        assert_eq!(buf.into_inner(), b"abcabcabcabcabc");
    }

    #[tokio::test]
    async fn test_write_all_vectored_partial_writes() {
        // A 4-byte pipe forces short writes across slice boundaries.
        let (mut client, mut server) = duplex(4);
        let reader = tokio::spawn(async move {
            let mut out = Vec::new();
            server.read_to_end(&mut out).await.unwrap();
            out
        });

        let parts = [Bytes::from_static(b"hello "), Bytes::from_static(b"vectored world")];
        let mut slices: Vec<_> = parts.iter().map(|b| IoSlice::new(b)).collect();
        let n = write_all_vectored(&mut client, &mut slices).await.unwrap();
        drop(client);

        assert_eq!(n, 20);
        assert_eq!(reader.await.unwrap(), b"hello vectored world");
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task_default(client);

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_event_sender_stream() {
        let (client, mut server) = duplex(64 * 1024);
        let config = EncoderConfig::default().packing(Packing::Packed);
        let (mut sender, task) = EventSender::spawn(client, config, WriterConfig::default()).unwrap();

        sender.send(&Event::OpenStream).await.unwrap();
        sender
            .send(&Event::NewTable {
                id: 1,
                name: "reads".into(),
            })
            .await
            .unwrap();
        let row = sender.encoder_mut().write_next_row(1).unwrap();
        sender.send_encoded(row).await.unwrap();
        sender.finish().await.unwrap();
        task.await.unwrap().unwrap();

        let mut bytes = Vec::new();
        server.read_to_end(&mut bytes).await.unwrap();
        assert!(bytes.len() > HEADER_SIZE);

        let (summary, events) = Decoder::decode_all(&bytes).unwrap();
        assert!(summary.closed);
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], Event::NextRow { table_id: 1 });
    }
}
