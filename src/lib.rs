//! # general-writer
//!
//! Streaming, event-based binary protocol for loading columnar databases.
//!
//! A producer emits a stream header followed by events (declare a table,
//! declare a column, append cell data, advance the row cursor, ...). A
//! consumer decodes the events one at a time and hands them to a storage
//! engine.
//!
//! ## Architecture
//!
//! - **Protocol**: stream header, event code table, size/id bias rules
//! - **Codec**: [`Encoder`] and [`Decoder`], plus [`EventBuffer`] for partial reads
//! - **Handler**: the [`EventSink`] a storage engine implements
//! - **Writer / Reader**: tokio tasks moving encoded bytes over `AsyncWrite` / `AsyncRead`
//!
//! Two encodings exist. Full mode uses 32-bit fields and 4-byte alignment;
//! packed mode uses biased 8-bit and 16-bit fields and never pads. Both can
//! be written in either byte order.
//!
//! ## Example
//!
//! ```
//! use general_writer::{Decoder, Encoder, EncoderConfig, Event};
//! use general_writer::protocol::Packing;
//!
//! let mut enc = Encoder::new(EncoderConfig::default().packing(Packing::Packed)).unwrap();
//! let mut bytes = Vec::new();
//! bytes.extend_from_slice(&enc.write_open_stream().unwrap());
//! bytes.extend_from_slice(&enc.write_new_table(1, "reads").unwrap());
//! bytes.extend_from_slice(&enc.write_new_column(1, 1, 8, 0, "name:ascii").unwrap());
//! bytes.extend_from_slice(&enc.write_cell_data(1, 4, b"ACGT").unwrap());
//! bytes.extend_from_slice(&enc.write_next_row(1).unwrap());
//! bytes.extend_from_slice(&enc.write_end_stream().unwrap());
//!
//! let (summary, events) = Decoder::decode_all(&bytes).unwrap();
//! assert!(summary.closed);
//! assert_eq!(events.len(), 6);
//! assert_eq!(events[4], Event::NextRow { table_id: 1 });
//! ```

pub mod codec;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod reader;
pub mod writer;

pub use codec::{Decoder, Encoder, EncoderConfig, EventBuffer, StreamSummary};
pub use error::{GwError, Result};
pub use handler::{dispatch, EventSink, JsonDumper};
pub use protocol::Event;
pub use reader::{read_stream, ReaderConfig};
pub use writer::{EventSender, WriterConfig};
