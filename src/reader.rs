//! Consumer side: read a stream from any `AsyncRead` into an [`EventSink`].
//!
//! The read loop pulls chunks into an [`EventBuffer`] and dispatches each
//! complete event as soon as it is decoded, so memory stays bounded by the
//! largest single event rather than the stream.
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> general_writer::error::Result<()> {
//! use general_writer::codec::{Encoder, EncoderConfig};
//! use general_writer::handler::JsonDumper;
//! use general_writer::reader::{read_stream, ReaderConfig};
//!
//! let mut enc = Encoder::new(EncoderConfig::default())?;
//! let mut bytes = enc.write_open_stream()?.to_vec();
//! bytes.extend_from_slice(&enc.write_end_stream()?);
//!
//! let mut dumper = JsonDumper::new(Vec::new());
//! let summary = read_stream(&bytes[..], &mut dumper, &ReaderConfig::default()).await?;
//! assert!(summary.closed);
//! assert_eq!(dumper.lines(), 2);
//! # Ok(())
//! # }
//! ```

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::codec::{EventBuffer, StreamSummary, DEFAULT_MAX_EVENT_SIZE};
use crate::error::Result;
use crate::handler::{dispatch, EventSink};

/// Default read chunk size (64KB).
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Configuration for the read loop.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Bytes requested per read call.
    pub read_chunk_size: usize,
    /// Initial capacity of the event buffer.
    pub initial_capacity: usize,
    /// Largest single event accepted.
    pub max_event_size: usize,
    /// Keep reading after end-stream and reject any trailing byte. When
    /// false the loop returns as soon as end-stream is decoded.
    pub drain_after_end: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            initial_capacity: DEFAULT_READ_CHUNK_SIZE,
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
            drain_after_end: true,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn max_event_size(mut self, size: usize) -> Self {
        self.max_event_size = size;
        self
    }

    pub fn drain_after_end(mut self, drain: bool) -> Self {
        self.drain_after_end = drain;
        self
    }
}

/// Read a whole stream and dispatch every event to `sink`.
///
/// Returns when end-stream is seen (and, with `drain_after_end`, EOF
/// follows it) or when the input ends on an event boundary. A partial
/// header or event at EOF is `TruncatedInput`.
pub async fn read_stream<R, S>(
    mut reader: R,
    sink: &mut S,
    config: &ReaderConfig,
) -> Result<StreamSummary>
where
    R: AsyncRead + Unpin,
    S: EventSink + ?Sized,
{
    let mut buffer =
        EventBuffer::with_capacity_and_max_event(config.initial_capacity, config.max_event_size);
    let mut chunk = vec![0u8; config.read_chunk_size.max(1)];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }

        for event in buffer.push(&chunk[..n])? {
            dispatch(&event, sink)?;
        }

        if buffer.is_closed() && !config.drain_after_end {
            break;
        }
    }

    let summary = buffer.finish()?;
    if !summary.closed {
        tracing::warn!(
            events = summary.events,
            bytes = summary.bytes,
            "input ended without end-stream"
        );
    }
    Ok(summary)
}

/// Run [`read_stream`] on its own task.
///
/// The task hands the sink back together with the summary. Errors are
/// logged before being returned.
pub fn spawn_reader_task<R, S>(
    reader: R,
    mut sink: S,
    config: ReaderConfig,
) -> JoinHandle<Result<(S, StreamSummary)>>
where
    R: AsyncRead + Unpin + Send + 'static,
    S: EventSink + Send + 'static,
{
    tokio::spawn(async move {
        match read_stream(reader, &mut sink, &config).await {
            Ok(summary) => Ok((sink, summary)),
            Err(e) => {
                tracing::error!("Read loop error: {}", e);
                Err(e)
            }
        }
    })
}
