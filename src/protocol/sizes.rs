//! Size and id codec.
//!
//! Lengths and ids are never zero on the wire. Packed fields exploit that by
//! storing `value - 1`, so a `u8` covers 1..=256 and a `u16` covers
//! 1..=65536. Full fields store the true value in a `u32`.

use super::event_id::{EventId, SizeClass};
use crate::error::{GwError, RangeError};

/// Largest size carried by an 8-bit packed size field.
pub const STRING_LIMIT_8: usize = 0x100;

/// Largest size carried by a 16-bit packed size field.
pub const STRING_LIMIT_16: usize = 0x10000;

/// Largest id a full event header can hold (24 bits).
pub const MAX_FULL_ID: u32 = 0x00FF_FFFF;

/// Largest id a packed event header can hold.
pub const MAX_PACKED_ID: u32 = 256;

const ID_MASK: u32 = 0x00FF_FFFF;
const CODE_SHIFT: u32 = 24;

#[inline]
fn biased_u8(field: &'static str, n: usize) -> Result<u8, RangeError> {
    if n == 0 || n > STRING_LIMIT_8 {
        return Err(RangeError::new(field, n as u64, 1, STRING_LIMIT_8 as u64));
    }
    Ok((n - 1) as u8)
}

/// Encode a length into an 8-bit packed field.
pub fn encode_len_u8(n: usize) -> Result<u8, RangeError> {
    biased_u8("size", n)
}

#[inline]
pub fn decode_len_u8(w: u8) -> usize {
    w as usize + 1
}

/// Encode a length into a 16-bit packed field.
pub fn encode_len_u16(n: usize) -> Result<u16, RangeError> {
    if n == 0 || n > STRING_LIMIT_16 {
        return Err(RangeError::new(
            "size",
            n as u64,
            1,
            STRING_LIMIT_16 as u64,
        ));
    }
    Ok((n - 1) as u16)
}

#[inline]
pub fn decode_len_u16(w: u16) -> usize {
    w as usize + 1
}

/// Encode a length into a full-mode field. No bias, zero still forbidden.
pub fn encode_len_u32(n: usize) -> Result<u32, RangeError> {
    match u32::try_from(n) {
        Ok(w) if w != 0 => Ok(w),
        _ => Err(RangeError::new("size", n as u64, 1, u32::MAX as u64)),
    }
}

/// Decode a full-mode length. A zero length is malformed.
pub fn decode_len_u32(w: u32) -> Result<usize, RangeError> {
    if w == 0 {
        return Err(RangeError::new("size", 0, 1, u32::MAX as u64));
    }
    Ok(w as usize)
}

/// Encode an id (table, column, element size) into a packed byte.
pub fn encode_id_packed(id: u32) -> Result<u8, RangeError> {
    if id == 0 || id > MAX_PACKED_ID {
        return Err(RangeError::new("packed id", id as u64, 1, MAX_PACKED_ID as u64));
    }
    Ok((id - 1) as u8)
}

#[inline]
pub fn decode_id_packed(w: u8) -> u32 {
    w as u32 + 1
}

/// Check an id destined for a full event header or payload field.
pub fn check_id_full(id: u32) -> Result<u32, RangeError> {
    if id == 0 || id > MAX_FULL_ID {
        return Err(RangeError::new("id", id as u64, 1, MAX_FULL_ID as u64));
    }
    Ok(id)
}

/// Encode a packed element size (bits per element, 1..=256).
pub fn encode_elem_bits_packed(bits: u32) -> Result<u8, RangeError> {
    biased_u8("element bits", bits as usize)
}

/// Combine id and event code into a full event header word.
///
/// Id 0 is accepted here; it is how events without an object id are sent.
pub fn pack_header(id: u32, code: EventId) -> Result<u32, RangeError> {
    if id > MAX_FULL_ID {
        return Err(RangeError::new("id", id as u64, 0, MAX_FULL_ID as u64));
    }
    Ok((id & ID_MASK) | ((code.code() as u32) << CODE_SHIFT))
}

/// Split a full event header word into `(id, raw event code)`.
///
/// The code is returned raw so the caller can report unknown values.
#[inline]
pub fn unpack_header(word: u32) -> (u32, u8) {
    (word & ID_MASK, (word >> CODE_SHIFT) as u8)
}

/// Zero bytes needed after `len` payload bytes to reach a 4-byte boundary.
#[inline]
pub fn pad_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Pick the narrowest packed size class able to carry every length in `lens`.
///
/// Fails with `Range` when any length is zero and `PayloadTooLarge` when a
/// length exceeds the 16-bit ceiling.
pub fn select_size_class(lens: &[usize]) -> Result<SizeClass, GwError> {
    let mut class = SizeClass::U8;
    for &len in lens {
        if encode_len_u8(len).is_ok() {
            continue;
        }
        match encode_len_u16(len) {
            Ok(_) => class = SizeClass::U16,
            Err(e) if len == 0 => return Err(GwError::Range(e)),
            Err(_) => {
                return Err(GwError::PayloadTooLarge {
                    len,
                    max: STRING_LIMIT_16,
                })
            }
        }
    }
    Ok(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_u8_bounds() {
        assert_eq!(encode_len_u8(1).unwrap(), 0);
        assert_eq!(encode_len_u8(256).unwrap(), 255);
        assert!(encode_len_u8(0).is_err());
        assert!(encode_len_u8(257).is_err());
        assert_eq!(decode_len_u8(0), 1);
        assert_eq!(decode_len_u8(255), 256);
    }

    #[test]
    fn test_len_u16_bounds() {
        assert_eq!(encode_len_u16(1).unwrap(), 0);
        assert_eq!(encode_len_u16(300).unwrap(), 299);
        assert_eq!(encode_len_u16(65536).unwrap(), 0xFFFF);
        assert!(encode_len_u16(0).is_err());
        assert!(encode_len_u16(65537).is_err());
        assert_eq!(decode_len_u16(0xFFFF), 65536);
    }

    #[test]
    fn test_len_u32_is_unbiased() {
        assert_eq!(encode_len_u32(5).unwrap(), 5);
        assert_eq!(encode_len_u32(u32::MAX as usize).unwrap(), u32::MAX);
        assert!(encode_len_u32(0).is_err());
        assert_eq!(decode_len_u32(5).unwrap(), 5);
        assert!(decode_len_u32(0).is_err());
    }

    #[test]
    fn test_packed_id_bounds() {
        assert_eq!(encode_id_packed(1).unwrap(), 0);
        assert_eq!(encode_id_packed(256).unwrap(), 0xFF);
        assert!(encode_id_packed(0).is_err());
        assert!(encode_id_packed(257).is_err());
        for id in 1..=256u32 {
            assert_eq!(decode_id_packed(encode_id_packed(id).unwrap()), id);
        }
    }

    #[test]
    fn test_full_id_bounds() {
        assert!(check_id_full(0).is_err());
        assert_eq!(check_id_full(MAX_FULL_ID).unwrap(), MAX_FULL_ID);
        assert!(check_id_full(MAX_FULL_ID + 1).is_err());
    }

    #[test]
    fn test_pack_unpack_header() {
        let word = pack_header(0x12_3456, EventId::NewTable).unwrap();
        assert_eq!(word, 0x0512_3456);
        assert_eq!(unpack_header(word), (0x12_3456, 5));

        assert_eq!(pack_header(0, EventId::OpenStream).unwrap(), 0x0700_0000);
        assert!(pack_header(1 << 24, EventId::NextRow).is_err());
    }

    #[test]
    fn test_pad_len() {
        assert_eq!(pad_len(4), 0);
        assert_eq!(pad_len(5), 3);
        assert_eq!(pad_len(6), 2);
        assert_eq!(pad_len(7), 1);
        assert_eq!(pad_len(0), 0);
    }

    #[test]
    fn test_select_size_class() {
        assert_eq!(select_size_class(&[1, 256]).unwrap(), SizeClass::U8);
        assert_eq!(select_size_class(&[3, 257]).unwrap(), SizeClass::U16);
        assert_eq!(select_size_class(&[300]).unwrap(), SizeClass::U16);
        assert!(matches!(
            select_size_class(&[65537]),
            Err(GwError::PayloadTooLarge { len: 65537, .. })
        ));
        assert!(matches!(select_size_class(&[4, 0]), Err(GwError::Range(_))));
    }
}
