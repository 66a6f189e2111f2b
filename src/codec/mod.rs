//! Codec module - turning events into bytes and back.
//!
//! - [`Encoder`] - one method per logical event, returns the encoded bytes
//! - [`Decoder`] - reads one event at a time from a byte slice
//! - [`EventBuffer`] - accumulates partial reads and yields complete events
//!
//! # Example
//!
//! ```
//! use general_writer::codec::{Decoder, Encoder, EncoderConfig};
//! use general_writer::protocol::Event;
//!
//! let mut enc = Encoder::new(EncoderConfig::default()).unwrap();
//! let mut bytes = Vec::new();
//! bytes.extend_from_slice(&enc.write_new_table(1, "reads").unwrap());
//! bytes.extend_from_slice(&enc.write_end_stream().unwrap());
//!
//! let (summary, events) = Decoder::decode_all(&bytes).unwrap();
//! assert!(summary.closed);
//! assert_eq!(events[0], Event::NewTable { id: 1, name: "reads".into() });
//! ```

mod decoder;
mod encoder;
mod event_buffer;
mod wire;

pub use decoder::{Decoder, StreamSummary};
pub use encoder::{Encoder, EncoderConfig};
pub use event_buffer::{EventBuffer, DEFAULT_MAX_EVENT_SIZE};
pub use wire::{WireReader, WireWriter};
