//! Error types for general-writer.

use thiserror::Error;

/// A logical value that cannot be represented by the chosen wire field.
///
/// Produced by the size/id codec. The encoder treats it as a signal to try a
/// wider event variant; the decoder wraps it with the offending offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{field} {value} outside {min}..={max}")]
pub struct RangeError {
    /// Which field was being encoded ("string size", "packed id", ...).
    pub field: &'static str,
    /// The rejected value.
    pub value: u64,
    /// Smallest representable value.
    pub min: u64,
    /// Largest representable value.
    pub max: u64,
}

impl RangeError {
    pub(crate) fn new(field: &'static str, value: u64, min: u64, max: u64) -> Self {
        Self {
            field,
            value,
            min,
            max,
        }
    }
}

/// Main error type for all general-writer operations.
#[derive(Debug, Error)]
pub enum GwError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while dumping events.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stream does not start with the protocol signature.
    #[error("bad signature {found:?}")]
    BadSignature { found: [u8; 8] },

    /// Endian marker is neither the native nor the byte-swapped form of 1.
    #[error("bad endian marker {0:#010x}")]
    BadEndianMarker(u32),

    /// Version is 0 or newer than this implementation understands.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u32),

    /// Declared header size does not match the header layout for the version.
    #[error("header size mismatch: declared {declared}, expected {expected}")]
    HeaderSizeMismatch { declared: u32, expected: u32 },

    /// Packing field is not 0 or 1.
    #[error("bad packing spec {0}")]
    BadPacking(u32),

    /// A value does not fit any variant the encoder could choose.
    #[error("value out of range: {0}")]
    Range(#[from] RangeError),

    /// A decoded field holds a value the protocol forbids.
    #[error("value out of range at offset {offset}: {source}")]
    FieldOutOfRange {
        offset: u64,
        #[source]
        source: RangeError,
    },

    /// Payload exceeds the widest size class the event has.
    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Event code is a sentinel, out of range, or not valid for the stream version.
    #[error("unknown event code {code} at offset {offset}")]
    UnknownEventCode { code: u8, offset: u64 },

    /// Fewer bytes available than the event requires.
    #[error("truncated input at offset {offset}: needed {needed} bytes, have {available}")]
    TruncatedInput {
        offset: u64,
        needed: usize,
        available: usize,
    },

    /// Bytes follow the end-stream event.
    #[error("excess data after end-stream at offset {offset}")]
    UnexpectedDataAfterEndStream { offset: u64 },

    /// Structurally invalid event.
    #[error("malformed event at offset {offset}: {reason}")]
    MalformedEvent { offset: u64, reason: String },

    /// Cell data for a column whose element size is unknown.
    #[error("unknown column id {column_id} at offset {offset}")]
    UnknownColumn { column_id: u32, offset: u64 },

    /// Cell byte length disagrees with element count and element size.
    #[error("column {column_id}: {elem_count} elements need {expected} bytes, got {actual}")]
    DataSizeMismatch {
        column_id: u32,
        elem_count: u32,
        expected: u64,
        actual: usize,
    },

    /// Event code newer than the protocol version the encoder writes.
    #[error("{event} requires protocol version {required}, stream is version {version}")]
    EventNotInVersion {
        event: &'static str,
        required: u32,
        version: u32,
    },

    /// The stream header was already emitted.
    #[error("stream header already written")]
    HeaderAlreadyWritten,

    /// The encoder already emitted end-stream.
    #[error("stream already closed")]
    StreamClosed,

    /// Writer task is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write queue full.
    #[error("backpressure timeout")]
    BackpressureTimeout,
}

impl GwError {
    /// Byte offset in the stream where a decode error occurred, if known.
    pub fn offset(&self) -> Option<u64> {
        match self {
            GwError::FieldOutOfRange { offset, .. }
            | GwError::UnknownEventCode { offset, .. }
            | GwError::TruncatedInput { offset, .. }
            | GwError::UnexpectedDataAfterEndStream { offset }
            | GwError::MalformedEvent { offset, .. }
            | GwError::UnknownColumn { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        GwError::MalformedEvent {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type alias using GwError.
pub type Result<T> = std::result::Result<T, GwError>;
