//! Byte-order-aware field reader and writer.
//!
//! Events are serialized field by field; nothing relies on in-memory struct
//! layout. Opaque payload bytes pass through untouched in either order.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{GwError, Result};
use crate::protocol::{pad_len, ByteOrder};

/// Appends fields to an event buffer in a fixed byte order.
pub struct WireWriter {
    buf: BytesMut,
    order: ByteOrder,
}

impl WireWriter {
    pub fn with_capacity(order: ByteOrder, capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            order,
        }
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    #[inline]
    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_slice(&self.order.u16_bytes(v));
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_slice(&self.order.u32_bytes(v));
    }

    #[inline]
    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_slice(&self.order.u64_bytes(v));
    }

    #[inline]
    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Zero-fill up to the next 4-byte boundary of this buffer.
    pub fn pad(&mut self) {
        let pad = pad_len(self.buf.len());
        self.buf.put_bytes(0, pad);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads fields from a byte slice, tracking the absolute stream offset.
///
/// Short reads fail with [`GwError::TruncatedInput`]; nothing is consumed
/// from the caller's buffer until the whole event has been read.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
    order: ByteOrder,
}

impl<'a> WireReader<'a> {
    /// `base` is the stream offset of `buf[0]`.
    pub fn new(buf: &'a [u8], base: u64, order: ByteOrder) -> Self {
        Self {
            buf,
            pos: 0,
            base,
            order,
        }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Absolute stream offset of the next byte.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(GwError::TruncatedInput {
                offset: self.offset(),
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.array::<2>()?;
        Ok(self.order.u16_from(b))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.array::<4>()?;
        Ok(self.order.u32_from(b))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.array::<8>()?;
        Ok(self.order.u64_from(b))
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Read `n` bytes of UTF-8 text. `what` names the field in errors.
    pub fn string(&mut self, n: usize, what: &str) -> Result<String> {
        let at = self.offset();
        let raw = self.take(n)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| GwError::malformed(at, format!("{} is not valid UTF-8", what)))
    }

    /// Skip padding up to the next 4-byte boundary of the stream.
    pub fn align(&mut self) -> Result<()> {
        let pad = pad_len((self.offset() % 4) as usize);
        self.skip(pad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_byte_orders() {
        let mut le = WireWriter::with_capacity(ByteOrder::Little, 16);
        le.put_u32(0x0102_0304);
        le.put_u16(0x0506);
        assert_eq!(&le.freeze()[..], &[4, 3, 2, 1, 6, 5]);

        let mut be = WireWriter::with_capacity(ByteOrder::Big, 16);
        be.put_u32(0x0102_0304);
        be.put_u16(0x0506);
        assert_eq!(&be.freeze()[..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_writer_pad() {
        let mut w = WireWriter::with_capacity(ByteOrder::Little, 16);
        w.put_slice(b"hello");
        w.pad();
        assert_eq!(w.len(), 8);
        assert_eq!(&w.freeze()[5..], &[0, 0, 0]);
    }

    #[test]
    fn test_reader_fields_and_offset() {
        let data = [1u8, 0, 0, 0, 0xAA, b'h', b'i', 0];
        let mut r = WireReader::new(&data, 100, ByteOrder::Little);
        assert_eq!(r.u32().unwrap(), 1);
        assert_eq!(r.u8().unwrap(), 0xAA);
        assert_eq!(r.offset(), 105);
        assert_eq!(r.string(2, "name").unwrap(), "hi");
        r.align().unwrap();
        assert_eq!(r.consumed(), 8);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_reader_truncated() {
        let data = [1u8, 2];
        let mut r = WireReader::new(&data, 40, ByteOrder::Big);
        let err = r.u32().unwrap_err();
        assert!(matches!(
            err,
            GwError::TruncatedInput {
                offset: 40,
                needed: 4,
                available: 2
            }
        ));
    }

    #[test]
    fn test_reader_rejects_invalid_utf8() {
        let data = [0xFFu8, 0xFE];
        let mut r = WireReader::new(&data, 0, ByteOrder::Little);
        let err = r.string(2, "table name").unwrap_err();
        assert!(err.to_string().contains("table name"));
    }

    #[test]
    fn test_reader_u64_big_endian() {
        let data = 0x0102_0304_0506_0708u64.to_be_bytes();
        let mut r = WireReader::new(&data, 0, ByteOrder::Big);
        assert_eq!(r.u64().unwrap(), 0x0102_0304_0506_0708);
    }
}
