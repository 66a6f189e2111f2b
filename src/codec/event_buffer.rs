//! Event buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for buffer management.
//! Implements the stream state machine:
//! - `AwaitingHeader`: need the 24-byte stream header
//! - `StreamOpen`: header accepted, decoding events
//! - `StreamClosed`: end-stream seen, any further byte is an error
//!
//! # Example
//!
//! ```
//! use general_writer::codec::{Encoder, EncoderConfig, EventBuffer};
//!
//! let mut enc = Encoder::new(EncoderConfig::default()).unwrap();
//! let mut stream = enc.write_open_stream().unwrap().to_vec();
//! stream.extend_from_slice(&enc.write_end_stream().unwrap());
//!
//! let mut buffer = EventBuffer::new();
//! let mut events = Vec::new();
//! for chunk in stream.chunks(5) {
//!     events.extend(buffer.push(chunk).unwrap());
//! }
//! assert_eq!(events.len(), 2);
//! assert!(buffer.finish().unwrap().closed);
//! ```

use bytes::BytesMut;

use super::decoder::{Decoder, StreamSummary};
use crate::error::{GwError, Result};
use crate::protocol::{Event, HeaderInfo, HEADER_SIZE, SIGNATURE};

/// Default largest single event the buffer will wait for (1 GB).
pub const DEFAULT_MAX_EVENT_SIZE: usize = 1_073_741_824;

const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Stream state.
enum State {
    /// Waiting for the complete stream header.
    AwaitingHeader,
    /// Header parsed; `need` is the buffered length required before the next
    /// decode attempt is worthwhile.
    StreamOpen { decoder: Decoder, need: usize },
    /// End-stream decoded.
    StreamClosed { decoder: Decoder },
}

/// Buffer for accumulating incoming bytes and extracting complete events.
pub struct EventBuffer {
    /// Bytes not yet decoded.
    buffer: BytesMut,
    state: State,
    max_event_size: usize,
}

impl EventBuffer {
    /// Create a new event buffer with default settings.
    ///
    /// Default capacity: 64KB, max event: 1GB.
    pub fn new() -> Self {
        Self::with_capacity_and_max_event(DEFAULT_CAPACITY, DEFAULT_MAX_EVENT_SIZE)
    }

    /// Create a new event buffer with a custom event size limit.
    pub fn with_max_event(max_event_size: usize) -> Self {
        Self::with_capacity_and_max_event(DEFAULT_CAPACITY, max_event_size)
    }

    pub fn with_capacity_and_max_event(capacity: usize, max_event_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::AwaitingHeader,
            max_event_size,
        }
    }

    /// Push data into the buffer and extract all complete events.
    ///
    /// Partial events stay buffered for the next push. Errors are fatal for
    /// the stream.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Event>> {
        self.buffer.extend_from_slice(data);

        let mut events = Vec::new();
        while let Some(event) = self.try_extract_one()? {
            events.push(event);
        }
        Ok(events)
    }

    /// Parse the stream header once enough bytes are buffered.
    fn try_accept_header(&mut self) -> Result<bool> {
        let seen = self.buffer.len().min(SIGNATURE.len());
        if self.buffer[..seen] != SIGNATURE[..seen] {
            let mut found = [0u8; 8];
            found[..seen].copy_from_slice(&self.buffer[..seen]);
            return Err(GwError::BadSignature { found });
        }
        if self.buffer.len() < HEADER_SIZE {
            return Ok(false);
        }

        let (decoder, consumed) = Decoder::from_header(&self.buffer)?;
        let _ = self.buffer.split_to(consumed);
        self.state = State::StreamOpen { decoder, need: 1 };
        Ok(true)
    }

    fn try_extract_one(&mut self) -> Result<Option<Event>> {
        if matches!(self.state, State::AwaitingHeader) && !self.try_accept_header()? {
            return Ok(None);
        }

        match &mut self.state {
            State::AwaitingHeader => Ok(None),

            State::StreamOpen { decoder, need } => {
                if self.buffer.is_empty() || self.buffer.len() < *need {
                    return Ok(None);
                }

                match decoder.next_event(&self.buffer) {
                    Ok((event, used)) => {
                        let _ = self.buffer.split_to(used);
                        *need = 1;
                        if event.is_end_stream() {
                            self.close();
                        }
                        Ok(Some(event))
                    }
                    Err(GwError::TruncatedInput {
                        offset,
                        needed,
                        available,
                    }) => {
                        // Bytes of the event before the failing field, plus the field.
                        let before = (offset - decoder.position()) as usize;
                        let total = before + needed;
                        if total > self.max_event_size {
                            return Err(GwError::PayloadTooLarge {
                                len: total,
                                max: self.max_event_size,
                            });
                        }
                        debug_assert!(before + available == self.buffer.len());
                        *need = total;
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }

            State::StreamClosed { decoder } => {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                Err(GwError::UnexpectedDataAfterEndStream {
                    offset: decoder.position(),
                })
            }
        }
    }

    fn close(&mut self) {
        if let State::StreamOpen { decoder, .. } =
            std::mem::replace(&mut self.state, State::AwaitingHeader)
        {
            self.state = State::StreamClosed { decoder };
        }
    }

    /// Signal end of input.
    ///
    /// Fails with `TruncatedInput` if the header or an event is incomplete.
    /// A stream that stops on an event boundary without end-stream is
    /// accepted; the summary reports `closed: false`.
    pub fn finish(&mut self) -> Result<StreamSummary> {
        match &mut self.state {
            State::AwaitingHeader => Err(GwError::TruncatedInput {
                offset: 0,
                needed: HEADER_SIZE,
                available: self.buffer.len(),
            }),
            State::StreamOpen { decoder, .. } => {
                if !self.buffer.is_empty() {
                    // Re-run to surface the precise truncation point.
                    decoder.next_event(&self.buffer)?;
                    return Err(GwError::TruncatedInput {
                        offset: decoder.position(),
                        needed: 1,
                        available: 0,
                    });
                }
                Ok(decoder.summary())
            }
            State::StreamClosed { decoder } => Ok(decoder.summary()),
        }
    }

    /// Negotiated header, once received.
    pub fn header(&self) -> Option<&HeaderInfo> {
        match &self.state {
            State::AwaitingHeader => None,
            State::StreamOpen { decoder, .. } | State::StreamClosed { decoder } => {
                Some(decoder.info())
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::StreamClosed { .. })
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::AwaitingHeader => "AwaitingHeader",
            State::StreamOpen { .. } => "StreamOpen",
            State::StreamClosed { .. } => "StreamClosed",
        }
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}
