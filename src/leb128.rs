//! LEB128 variable-length integer encoding and the zig-zag mapping.
//!
//! Every integer on the wire except the fixed-width kinds goes through this
//! module: field keys, length prefixes, and varint-typed payloads.

use bytes::{Buf, BufMut};

use crate::error::WireError;

/// Integer widths that can travel as LEB128 varints.
pub trait Leb128: Sized + Copy {
    /// Maximum number of bytes an encoded value of this width may occupy.
    const MAX_BYTES: usize;

    /// Encode `self` into `buf`, returning the number of bytes written.
    fn write_leb128<B: BufMut>(self, buf: &mut B) -> usize;

    /// Decode a value from the front of `buf`, advancing past it.
    fn read_leb128<B: Buf>(buf: &mut B) -> Result<Self, WireError>;

    /// The number of bytes `self` occupies when encoded.
    fn leb128_len(self) -> usize;
}

impl Leb128 for u64 {
    const MAX_BYTES: usize = 10;

    #[inline]
    fn write_leb128<B: BufMut>(self, buf: &mut B) -> usize {
        let mut value = self;
        let mut written = 1;
        while value >= 0x80 {
            buf.put_u8((value & 0x7f) as u8 | 0x80);
            value >>= 7;
            written += 1;
        }
        buf.put_u8(value as u8);
        written
    }

    #[inline]
    fn read_leb128<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        let mut value = 0u64;
        for i in 0..Self::MAX_BYTES {
            if !buf.has_remaining() {
                return Err(WireError::Truncated);
            }
            let byte = buf.get_u8();
            if i == Self::MAX_BYTES - 1 {
                // Tenth byte carries only bit 63; anything else overflows
                // u64 or keeps the continuation bit set past the limit.
                if byte >= 0x02 {
                    return Err(WireError::InvalidVarint);
                }
                return Ok(value | u64::from(byte) << 63);
            }
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte < 0x80 {
                return Ok(value);
            }
        }
        Err(WireError::InvalidVarint)
    }

    #[inline]
    fn leb128_len(self) -> usize {
        // ceil(significant_bits / 7), minimum one byte for zero.
        let bits = 64 - (self | 1).leading_zeros() as usize;
        bits.div_ceil(7)
    }
}

impl Leb128 for u32 {
    const MAX_BYTES: usize = 5;

    #[inline]
    fn write_leb128<B: BufMut>(self, buf: &mut B) -> usize {
        u64::from(self).write_leb128(buf)
    }

    #[inline]
    fn read_leb128<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        // Accept over-wide (sign-extended) encodings; the value must still
        // fit in 32 bits.
        let wide = u64::read_leb128(buf)?;
        u32::try_from(wide).map_err(|_| WireError::InvalidVarint)
    }

    #[inline]
    fn leb128_len(self) -> usize {
        u64::from(self).leb128_len()
    }
}

/// Map a signed 32-bit value onto the zig-zag unsigned space.
#[inline]
pub const fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Inverse of [`zigzag32`].
#[inline]
pub const fn unzigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Map a signed 64-bit value onto the zig-zag unsigned space.
#[inline]
pub const fn zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag64`].
#[inline]
pub const fn unzigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}
