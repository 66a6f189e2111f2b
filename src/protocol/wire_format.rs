//! Stream header layout and negotiation.
//!
//! Every stream starts with a 24-byte header:
//! ```text
//! ┌───────────┬──────────┬──────────┬──────────┬──────────┐
//! │ Signature │ Endian   │ Version  │ Hdr size │ Packing  │
//! │ 8 bytes   │ uint32   │ uint32   │ uint32   │ uint32   │
//! │"NCBIgnld" │ 1        │ 1..=2    │ 24       │ 0 or 1   │
//! └───────────┴──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! Integers are in the producer's byte order. The endian field is always 1
//! in that order, which lets the reader tell the order apart.

use crate::error::{GwError, Result};

/// Stream signature.
pub const SIGNATURE: [u8; 8] = *b"NCBIgnld";

/// Endian marker as read in the reader's own order.
pub const GOOD_ENDIAN: u32 = 1;

/// Endian marker as read when the producer used the other order.
pub const REVERSE_ENDIAN: u32 = 1 << 24;

/// Newest protocol version understood here.
pub const CURRENT_VERSION: u32 = 2;

/// Size of the stream header for every supported version.
pub const HEADER_SIZE: usize = 24;

/// Size of a full-mode event header.
pub const FULL_EVENT_HEADER_SIZE: usize = 4;

/// Size of a packed-mode event header.
pub const PACKED_EVENT_HEADER_SIZE: usize = 2;

/// Alignment of full-mode events.
pub const FULL_ALIGNMENT: usize = 4;

/// Byte order of integers in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Order of the running host.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// The order that is not this one.
    pub fn swapped(self) -> Self {
        match self {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }

    #[inline]
    pub fn u16_from(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn u32_from(self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn u64_from(self, b: [u8; 8]) -> u64 {
        match self {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        }
    }

    #[inline]
    pub fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u64_bytes(self, v: u64) -> [u8; 8] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

/// Encoding used for every event after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Packing {
    /// Word-sized, unbiased fields; events 4-byte aligned.
    #[default]
    Full,
    /// Byte-sized, biased fields; no padding.
    Packed,
}

impl Packing {
    #[inline]
    pub fn is_packed(self) -> bool {
        self == Packing::Packed
    }

    fn wire_value(self) -> u32 {
        match self {
            Packing::Full => 0,
            Packing::Packed => 1,
        }
    }

    fn from_wire(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Packing::Full),
            1 => Ok(Packing::Packed),
            other => Err(GwError::BadPacking(other)),
        }
    }
}

/// Stream header as written by a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub byte_order: ByteOrder,
    pub version: u32,
    pub packing: Packing,
}

impl StreamHeader {
    /// Header for the current version in native byte order.
    pub fn new(packing: Packing) -> Self {
        Self {
            byte_order: ByteOrder::native(),
            version: CURRENT_VERSION,
            packing,
        }
    }

    /// Encode the header in its own byte order.
    ///
    /// # Example
    ///
    /// ```
    /// use general_writer::protocol::{Packing, StreamHeader, HEADER_SIZE};
    ///
    /// let bytes = StreamHeader::new(Packing::Packed).encode();
    /// assert_eq!(bytes.len(), HEADER_SIZE);
    /// assert_eq!(&bytes[..8], b"NCBIgnld");
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode the header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (24 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        let order = self.byte_order;
        buf[0..8].copy_from_slice(&SIGNATURE);
        buf[8..12].copy_from_slice(&order.u32_bytes(GOOD_ENDIAN));
        buf[12..16].copy_from_slice(&order.u32_bytes(self.version));
        buf[16..20].copy_from_slice(&order.u32_bytes(HEADER_SIZE as u32));
        buf[20..24].copy_from_slice(&order.u32_bytes(self.packing.wire_value()));
    }
}

/// Validated stream parameters returned by [`parse_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    /// Order of every integer in the stream.
    pub byte_order: ByteOrder,
    /// True when the stream order differs from the host order.
    pub reversed: bool,
    pub version: u32,
    pub packing: Packing,
    /// Bytes consumed by the header.
    pub header_size: usize,
}

/// Validate the stream header at the start of `buf`.
///
/// Returns the negotiated parameters and the offset of the first event.
/// Checks run in wire order: signature, endian marker, version, header size,
/// packing.
///
/// # Example
///
/// ```
/// use general_writer::protocol::{parse_header, Packing, StreamHeader};
///
/// let bytes = StreamHeader::new(Packing::Full).encode();
/// let (info, offset) = parse_header(&bytes).unwrap();
/// assert_eq!(info.packing, Packing::Full);
/// assert!(!info.reversed);
/// assert_eq!(offset, 24);
/// ```
pub fn parse_header(buf: &[u8]) -> Result<(HeaderInfo, usize)> {
    if buf.len() < HEADER_SIZE {
        return Err(GwError::TruncatedInput {
            offset: 0,
            needed: HEADER_SIZE,
            available: buf.len(),
        });
    }

    let mut signature = [0u8; 8];
    signature.copy_from_slice(&buf[0..8]);
    if signature != SIGNATURE {
        return Err(GwError::BadSignature { found: signature });
    }

    let word = |at: usize| [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]];

    let byte_order = match u32::from_le_bytes(word(8)) {
        GOOD_ENDIAN => ByteOrder::Little,
        REVERSE_ENDIAN => ByteOrder::Big,
        other => return Err(GwError::BadEndianMarker(other)),
    };

    let version = byte_order.u32_from(word(12));
    if version == 0 || version > CURRENT_VERSION {
        return Err(GwError::UnsupportedVersion(version));
    }

    let declared = byte_order.u32_from(word(16));
    if declared as usize != HEADER_SIZE {
        return Err(GwError::HeaderSizeMismatch {
            declared,
            expected: HEADER_SIZE as u32,
        });
    }

    let packing = Packing::from_wire(byte_order.u32_from(word(20)))?;

    let info = HeaderInfo {
        byte_order,
        reversed: byte_order != ByteOrder::native(),
        version,
        packing,
        header_size: HEADER_SIZE,
    };
    Ok((info, HEADER_SIZE))
}
