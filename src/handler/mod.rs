//! Handler module - delivering decoded events to a storage engine.
//!
//! Provides:
//! - [`EventSink`] - the operations a storage engine implements
//! - [`dispatch`] - one decoded event becomes one sink call
//! - [`replay`] - decode an in-memory stream into a sink
//! - [`JsonDumper`] - a sink that writes JSON lines
//!
//! # Example
//!
//! ```
//! use general_writer::codec::{Encoder, EncoderConfig};
//! use general_writer::handler::{replay, JsonDumper};
//!
//! let mut enc = Encoder::new(EncoderConfig::default()).unwrap();
//! let mut bytes = enc.write_new_table(1, "reads").unwrap().to_vec();
//! bytes.extend_from_slice(&enc.write_end_stream().unwrap());
//!
//! let mut dumper = JsonDumper::new(Vec::new());
//! replay(&bytes, &mut dumper).unwrap();
//! let text = String::from_utf8(dumper.into_inner()).unwrap();
//! assert!(text.starts_with(r#"{"event":"new-table","id":1,"name":"reads"}"#));
//! ```

mod dump;
mod sink;

pub use dump::JsonDumper;
pub use sink::{dispatch, replay, EventSink};
