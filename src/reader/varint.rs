//! Shared varint encoding and decoding utilities.
//!
//! Avro encodes `int` and `long` as variable-length zigzag integers:
//! - Each byte has 7 bits of data and 1 continuation bit (MSB)
//! - The continuation bit indicates if more bytes follow
//! - Bytes are in little-endian order
//!
//! Zigzag maps signed values to unsigned ones so small magnitudes stay short:
//! - 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
//! - Encoding formula: (n << 1) ^ (n >> 63)
//! - Decoding formula: (n >> 1) ^ -(n & 1)

use crate::error::DecodeError;

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode an unsigned variable-length integer.
///
/// The cursor is advanced past the varint.
///
/// # Errors
/// - `DecodeError::UnexpectedEof` if the input is truncated
/// - `DecodeError::InvalidVarint` if the varint exceeds 10 bytes
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let (&byte, rest) = data.split_first().ok_or(DecodeError::UnexpectedEof)?;
        *data = rest;

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;

        // max 10 bytes for a 64-bit varint
        if shift >= 64 {
            return Err(DecodeError::InvalidVarint);
        }
    }
}

/// Decode a zigzag-encoded signed integer.
#[inline]
pub fn decode_zigzag(data: &mut &[u8]) -> Result<i64, DecodeError> {
    let n = decode_varint(data)?;
    Ok(((n >> 1) as i64) ^ -((n & 1) as i64))
}

/// Decode a zigzag-encoded `int`, rejecting values outside the 32-bit range.
#[inline]
pub fn decode_zigzag_i32(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let n = decode_zigzag(data)?;
    i32::try_from(n)
        .map_err(|_| DecodeError::InvalidData(format!("Int value {} out of range", n)))
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Append an unsigned variable-length integer to `buf`.
#[inline]
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Append a zigzag-encoded signed integer to `buf`.
#[inline]
pub fn write_zigzag(buf: &mut Vec<u8>, value: i64) {
    write_varint(buf, ((value << 1) ^ (value >> 63)) as u64);
}

/// Encode an unsigned varint into a fresh buffer.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    write_varint(&mut buf, value);
    buf
}

/// Encode a zigzag signed integer into a fresh buffer.
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    write_zigzag(&mut buf, value);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_byte_varint() {
        let data: &[u8] = &[0x00, 0x01, 0x7F];
        let mut cursor = data;
        assert_eq!(decode_varint(&mut cursor).unwrap(), 0);
        assert_eq!(decode_varint(&mut cursor).unwrap(), 1);
        assert_eq!(decode_varint(&mut cursor).unwrap(), 127);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_decode_multi_byte_varint() {
        let data: &[u8] = &[0xAC, 0x02];
        let mut cursor = data;
        assert_eq!(decode_varint(&mut cursor).unwrap(), 300);
    }

    #[test]
    fn test_decode_truncated_varint() {
        let data: &[u8] = &[0x80, 0x80];
        let mut cursor = data;
        assert!(matches!(
            decode_varint(&mut cursor),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_decode_overlong_varint() {
        let data: &[u8] = &[0xFF; 11];
        let mut cursor = data;
        assert!(matches!(
            decode_varint(&mut cursor),
            Err(DecodeError::InvalidVarint)
        ));
    }

    #[test]
    fn test_zigzag_mapping() {
        assert_eq!(encode_zigzag(0), vec![0x00]);
        assert_eq!(encode_zigzag(-1), vec![0x01]);
        assert_eq!(encode_zigzag(1), vec![0x02]);
        assert_eq!(encode_zigzag(-2), vec![0x03]);
        assert_eq!(encode_zigzag(42), vec![0x54]);
    }

    #[test]
    fn test_zigzag_extremes() {
        for value in [i64::MIN, i64::MAX, i32::MIN as i64, i32::MAX as i64] {
            let encoded = encode_zigzag(value);
            let mut cursor = encoded.as_slice();
            assert_eq!(decode_zigzag(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn test_decode_i32_out_of_range() {
        let encoded = encode_zigzag(i32::MAX as i64 + 1);
        let mut cursor = encoded.as_slice();
        assert!(matches!(
            decode_zigzag_i32(&mut cursor),
            Err(DecodeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_encode_varint_boundaries() {
        assert_eq!(encode_varint(127), vec![0x7F]);
        assert_eq!(encode_varint(128), vec![0x80, 0x01]);
        assert_eq!(encode_varint(u64::MAX).len(), 10);
    }
}
