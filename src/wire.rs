//! Field keys and value framing for the protobuf wire format.
//!
//! An encoded message is a sequence of key/value records. The key is a
//! varint of `(field id << 3) | wire type`; the wire type tells a reader how
//! to frame the payload that follows, which is what makes unknown fields
//! skippable.

use bytes::Buf;

use crate::error::WireError;
use crate::leb128::Leb128;

/// Minimum value of a protobuf field id.
pub const MIN_FIELD_ID: u32 = 1;
/// Maximum value of a protobuf field id.
pub const MAX_FIELD_ID: u32 = (1 << 29) - 1;

/// Payload framing codes, per the protobuf encoding spec.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WireType {
    /// Variable length integer: `int32/64`, `uint32/64`, `sint32/64`,
    /// `bool`, `enum`.
    Varint = 0,
    /// Eight little-endian bytes: `fixed64`, `sfixed64`, `double`.
    Bits64 = 1,
    /// Varint length prefix then that many bytes: `string`, `bytes`,
    /// embedded messages, packed repeated fields.
    LenDelim = 2,
    /// Start of a legacy group.
    StartGroup = 3,
    /// End of a legacy group.
    EndGroup = 4,
    /// Four little-endian bytes: `fixed32`, `sfixed32`, `float`.
    Bits32 = 5,
}

impl WireType {
    /// Decode a wire type from the low three bits of a key.
    #[inline]
    pub fn from_raw(value: u8) -> Result<Self, WireError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Bits64),
            2 => Ok(WireType::LenDelim),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::Bits32),
            other => Err(WireError::invalid_wire_type(other)),
        }
    }

    /// The raw three-bit code for this wire type.
    #[inline]
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

/// A decoded field key: the field id plus the payload framing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldKey {
    pub id: u32,
    pub wire_type: WireType,
}

impl FieldKey {
    #[inline]
    pub fn new(id: u32, wire_type: WireType) -> Self {
        FieldKey { id, wire_type }
    }

    /// Encode this key as its varint form.
    #[inline]
    pub fn write<B: bytes::BufMut>(self, buf: &mut B) {
        let raw = (self.id << 3) | u32::from(self.wire_type.raw());
        raw.write_leb128(buf);
    }

    /// Number of bytes [`FieldKey::write`] will produce.
    ///
    /// The wire type only occupies the low three bits and never changes the
    /// length.
    #[inline]
    pub fn written_len(self) -> usize {
        (self.id << 3).leb128_len()
    }

    /// Decode a key from the front of `buf`.
    #[inline]
    pub fn read<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        if !buf.has_remaining() {
            return Err(WireError::invalid_key("empty buffer"));
        }
        let raw = u32::read_leb128(buf)?;
        let wire_type = WireType::from_raw((raw & 0b111) as u8)?;
        let id = raw >> 3;
        if id < MIN_FIELD_ID {
            return Err(WireError::invalid_key("field id out of range"));
        }
        Ok(FieldKey { id, wire_type })
    }
}

/// Decode the length prefix of a length-delimited value.
#[inline]
pub fn read_len<B: Buf>(buf: &mut B) -> Result<usize, WireError> {
    let len = u64::read_leb128(buf)?;
    usize::try_from(len).map_err(|_| WireError::length_overflow(len))
}

/// Skip one value of the given wire type, advancing `buf` past it.
///
/// This is how unknown fields are handled on decode; a start-group record
/// recurses through [`skip_group`] so nested unknown groups are consumed
/// whole. An end-group record is the enclosing decoder's business and is an
/// error here.
pub fn skip_value<B: Buf>(wire_type: WireType, id: u32, buf: &mut B) -> Result<(), WireError> {
    let skip = match wire_type {
        WireType::Varint => {
            u64::read_leb128(buf)?;
            return Ok(());
        }
        WireType::Bits64 => 8,
        WireType::LenDelim => read_len(buf)?,
        WireType::Bits32 => 4,
        WireType::StartGroup => return skip_group(id, buf),
        WireType::EndGroup => return Err(WireError::UnexpectedGroupEnd { id }),
    };

    if buf.remaining() < skip {
        return Err(WireError::Truncated);
    }
    buf.advance(skip);
    Ok(())
}

/// Consume records until the end of the group opened with `start_id`.
///
/// The matching end-group key must carry the same field id; a different id
/// is a fatal wire error. Nested groups recurse.
pub fn skip_group<B: Buf>(start_id: u32, buf: &mut B) -> Result<(), WireError> {
    loop {
        let key = match FieldKey::read(buf) {
            Ok(key) => key,
            Err(WireError::InvalidKey { .. }) if !buf.has_remaining() => {
                return Err(WireError::UnterminatedGroup { id: start_id });
            }
            Err(e) => return Err(e),
        };
        match key.wire_type {
            WireType::EndGroup => {
                return if key.id == start_id {
                    Ok(())
                } else {
                    Err(WireError::GroupEndMismatch {
                        expected: start_id,
                        actual: key.id,
                    })
                };
            }
            WireType::StartGroup => skip_group(key.id, buf)?,
            other => skip_value(other, key.id, buf)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn proptest_key_roundtrips() {
        fn arb_wire_type() -> impl Strategy<Value = WireType> {
            (0u8..=5).prop_map(|raw| WireType::from_raw(raw).expect("known valid"))
        }

        let strat = (MIN_FIELD_ID..=MAX_FIELD_ID, arb_wire_type());
        proptest!(|((id, wire_type) in strat)| {
            let key = FieldKey::new(id, wire_type);
            let mut buf = Vec::new();
            key.write(&mut buf);
            prop_assert_eq!(buf.len(), key.written_len());
            prop_assert_eq!(FieldKey::read(&mut &buf[..]).unwrap(), key);
        });
    }

    #[test]
    fn test_all_raw_wire_types() {
        for raw in u8::MIN..u8::MAX {
            match (raw, WireType::from_raw(raw)) {
                (0, Ok(WireType::Varint))
                | (1, Ok(WireType::Bits64))
                | (2, Ok(WireType::LenDelim))
                | (3, Ok(WireType::StartGroup))
                | (4, Ok(WireType::EndGroup))
                | (5, Ok(WireType::Bits32)) => (),
                (_, Err(_)) => (),
                other => panic!("unexpected value {other:?}"),
            }
        }
    }

    #[test]
    fn test_zero_field_id_rejected() {
        // Raw key 0b0000_0000: id 0, wire type varint.
        assert!(FieldKey::read(&mut &[0u8][..]).is_err());
    }

    #[test]
    fn test_read_len() {
        let mut buf = &[0u8][..];
        assert_eq!(read_len(&mut buf).unwrap(), 0);

        let mut buf = &[0xAC, 0x02][..];
        assert_eq!(read_len(&mut buf).unwrap(), 300);
    }

    #[test]
    fn test_skip_varint() {
        let mut buf = &[0x80, 0x01, 99][..];
        skip_value(WireType::Varint, 1, &mut buf).unwrap();
        assert_eq!(buf, &[99]);
    }

    #[test]
    fn test_skip_fixed() {
        let mut buf = &[1, 2, 3, 4, 99][..];
        skip_value(WireType::Bits32, 1, &mut buf).unwrap();
        assert_eq!(buf, &[99]);

        let mut buf = &[1, 2, 3, 4, 5, 6, 7, 8, 99][..];
        skip_value(WireType::Bits64, 1, &mut buf).unwrap();
        assert_eq!(buf, &[99]);
    }

    #[test]
    fn test_skip_len_delim() {
        let mut buf = &[3, 1, 2, 3, 99][..];
        skip_value(WireType::LenDelim, 1, &mut buf).unwrap();
        assert_eq!(buf, &[99]);
    }

    #[test]
    fn test_skip_group_with_nested_group() {
        // group 2 { varint 1 = 5; group 3 { }; } then a trailing byte.
        let buf = [
            0x08, 0x05, // field 1 varint 5
            0x1B, // field 3 start group
            0x1C, // field 3 end group
            0x14, // field 2 end group
        ];
        let mut slice = &buf[..];
        assert_eq!(
            skip_group(2, &mut slice),
            Ok(()),
            "nested group should be consumed"
        );
        assert!(slice.is_empty());
    }

    #[test]
    fn test_skip_group_mismatched_end() {
        // End-group for id 7 while skipping group 2.
        let buf = [0x08, 0x05, 0x3C];
        assert_eq!(
            skip_group(2, &mut &buf[..]),
            Err(WireError::GroupEndMismatch {
                expected: 2,
                actual: 7
            })
        );
    }

    #[test]
    fn test_skip_group_unterminated() {
        let buf = [0x08, 0x05];
        assert_eq!(
            skip_group(2, &mut &buf[..]),
            Err(WireError::UnterminatedGroup { id: 2 })
        );
    }

    #[test]
    fn test_skip_bare_end_group() {
        let mut buf = &[0u8][..];
        assert!(skip_value(WireType::EndGroup, 1, &mut buf).is_err());
    }
}
