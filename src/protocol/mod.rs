//! Protocol module - stream header, event codes, and field codecs.
//!
//! This module describes the wire format independent of any I/O:
//! - 24-byte stream header encoding/decoding
//! - Event code table with per-code shape and version
//! - Size and id bias rules for full and packed modes
//! - Logical event types

mod event;
mod event_id;
mod sizes;
mod wire_format;

pub use event::{
    ColumnDecl, CreateMode, Event, MemberDecl, MemberKind, MetadataTarget, Progress,
    COLUMN_FLAG_INT_PACKING,
};
pub use event_id::{EventId, PayloadShape, SizeClass, BAD_EVENT, MAX_EVENT_ID};
pub use sizes::{
    check_id_full, decode_id_packed, decode_len_u16, decode_len_u32, decode_len_u8,
    encode_elem_bits_packed, encode_id_packed, encode_len_u16, encode_len_u32, encode_len_u8,
    pack_header, pad_len, select_size_class, unpack_header, MAX_FULL_ID, MAX_PACKED_ID,
    STRING_LIMIT_16, STRING_LIMIT_8,
};
pub use wire_format::{
    parse_header, ByteOrder, HeaderInfo, Packing, StreamHeader, CURRENT_VERSION,
    FULL_ALIGNMENT, FULL_EVENT_HEADER_SIZE, GOOD_ENDIAN, HEADER_SIZE, PACKED_EVENT_HEADER_SIZE,
    REVERSE_ENDIAN, SIGNATURE,
};
