//! The reflective wire codec.
//!
//! This module holds the scalar payload codec shared by the encoder and the
//! decoder; [`encode`] and [`decode`] drive whole messages through it using
//! the schema.

pub(crate) mod decode;
pub(crate) mod encode;

use bytes::{Buf, BufMut};

use crate::error::{Error, WireError};
use crate::leb128::{unzigzag32, unzigzag64, zigzag32, zigzag64, Leb128};
use crate::schema::ScalarKind;
use crate::value::Value;
use crate::wire::read_len;

/// Write the payload of one scalar value, without any key.
///
/// `field` names the field for diagnostics; slots only hold verified
/// values, so a shape mismatch here is an internal inconsistency.
pub(crate) fn write_scalar<B: BufMut>(
    kind: ScalarKind,
    value: &Value,
    field: &str,
    buf: &mut B,
) -> Result<(), Error> {
    match (kind, value) {
        // Negative int32 is sign-extended to 64 bits, giving the ten-byte
        // varint the wire spec requires.
        (ScalarKind::Int32, Value::I32(n)) => {
            (*n as i64 as u64).write_leb128(buf);
        }
        (ScalarKind::Sint32, Value::I32(n)) => {
            zigzag32(*n).write_leb128(buf);
        }
        (ScalarKind::Sfixed32, Value::I32(n)) => buf.put_i32_le(*n),
        (ScalarKind::Uint32, Value::U32(n)) => {
            (*n).write_leb128(buf);
        }
        (ScalarKind::Fixed32, Value::U32(n)) => buf.put_u32_le(*n),
        (ScalarKind::Int64, Value::I64(n)) => {
            (*n as u64).write_leb128(buf);
        }
        (ScalarKind::Sint64, Value::I64(n)) => {
            zigzag64(*n).write_leb128(buf);
        }
        (ScalarKind::Sfixed64, Value::I64(n)) => buf.put_i64_le(*n),
        (ScalarKind::Uint64, Value::U64(n)) => {
            (*n).write_leb128(buf);
        }
        (ScalarKind::Fixed64, Value::U64(n)) => buf.put_u64_le(*n),
        (ScalarKind::Bool, Value::Bool(b)) => buf.put_u8(u8::from(*b)),
        (ScalarKind::Float, Value::F32(x)) => buf.put_f32_le(*x),
        (ScalarKind::Double, Value::F64(x)) => buf.put_f64_le(*x),
        (ScalarKind::String, Value::Str(s)) => {
            (s.len() as u64).write_leb128(buf);
            buf.put_slice(s.as_bytes());
        }
        (ScalarKind::Bytes, Value::Bytes(b)) => {
            (b.len() as u64).write_leb128(buf);
            buf.put_slice(b);
        }
        (kind, value) => {
            return Err(Error::illegal_value(
                field,
                format!("{} slot for {} field", value.kind_name(), kind.proto_name()),
            ));
        }
    }
    Ok(())
}

/// The number of payload bytes [`write_scalar`] will produce.
pub(crate) fn scalar_len(kind: ScalarKind, value: &Value, field: &str) -> Result<usize, Error> {
    let len = match (kind, value) {
        (ScalarKind::Int32, Value::I32(n)) => (*n as i64 as u64).leb128_len(),
        (ScalarKind::Sint32, Value::I32(n)) => zigzag32(*n).leb128_len(),
        (ScalarKind::Uint32, Value::U32(n)) => (*n).leb128_len(),
        (ScalarKind::Int64, Value::I64(n)) => (*n as u64).leb128_len(),
        (ScalarKind::Sint64, Value::I64(n)) => zigzag64(*n).leb128_len(),
        (ScalarKind::Uint64, Value::U64(n)) => (*n).leb128_len(),
        (ScalarKind::Sfixed32, _) | (ScalarKind::Fixed32, _) | (ScalarKind::Float, _) => 4,
        (ScalarKind::Sfixed64, _) | (ScalarKind::Fixed64, _) | (ScalarKind::Double, _) => 8,
        (ScalarKind::Bool, _) => 1,
        (ScalarKind::String, Value::Str(s)) => (s.len() as u64).leb128_len() + s.len(),
        (ScalarKind::Bytes, Value::Bytes(b)) => (b.len() as u64).leb128_len() + b.len(),
        (kind, value) => {
            return Err(Error::illegal_value(
                field,
                format!("{} slot for {} field", value.kind_name(), kind.proto_name()),
            ));
        }
    };
    Ok(len)
}

/// Read the payload of one scalar value. Integer results are masked to the
/// declared width.
pub(crate) fn read_scalar<B: Buf>(kind: ScalarKind, buf: &mut B) -> Result<Value, WireError> {
    let value = match kind {
        ScalarKind::Int32 => Value::I32(u64::read_leb128(buf)? as i32),
        ScalarKind::Uint32 => Value::U32(u64::read_leb128(buf)? as u32),
        ScalarKind::Sint32 => Value::I32(unzigzag32(u64::read_leb128(buf)? as u32)),
        ScalarKind::Int64 => Value::I64(u64::read_leb128(buf)? as i64),
        ScalarKind::Uint64 => Value::U64(u64::read_leb128(buf)?),
        ScalarKind::Sint64 => Value::I64(unzigzag64(u64::read_leb128(buf)?)),
        ScalarKind::Fixed32 => {
            check_remaining(buf, 4)?;
            Value::U32(buf.get_u32_le())
        }
        ScalarKind::Sfixed32 => {
            check_remaining(buf, 4)?;
            Value::I32(buf.get_i32_le())
        }
        ScalarKind::Fixed64 => {
            check_remaining(buf, 8)?;
            Value::U64(buf.get_u64_le())
        }
        ScalarKind::Sfixed64 => {
            check_remaining(buf, 8)?;
            Value::I64(buf.get_i64_le())
        }
        ScalarKind::Bool => Value::Bool(u64::read_leb128(buf)? != 0),
        ScalarKind::Float => {
            check_remaining(buf, 4)?;
            Value::F32(buf.get_f32_le())
        }
        ScalarKind::Double => {
            check_remaining(buf, 8)?;
            Value::F64(buf.get_f64_le())
        }
        ScalarKind::String => {
            let data = read_len_prefixed(buf)?;
            let text = String::from_utf8(data.to_vec()).map_err(|_| WireError::InvalidUtf8)?;
            Value::Str(text)
        }
        ScalarKind::Bytes => Value::Bytes(read_len_prefixed(buf)?),
    };
    Ok(value)
}

#[inline]
fn check_remaining<B: Buf>(buf: &B, needed: usize) -> Result<(), WireError> {
    if buf.remaining() < needed {
        Err(WireError::Truncated)
    } else {
        Ok(())
    }
}

#[inline]
pub(crate) fn read_len_prefixed<B: Buf>(buf: &mut B) -> Result<bytes::Bytes, WireError> {
    let len = read_len(buf)?;
    check_remaining(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(kind: ScalarKind, value: Value) {
        let mut buf = Vec::new();
        write_scalar(kind, &value, "test", &mut buf).unwrap();
        assert_eq!(buf.len(), scalar_len(kind, &value, "test").unwrap());
        let decoded = read_scalar(kind, &mut &buf[..]).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_varint_roundtrips() {
        roundtrip(ScalarKind::Int32, Value::I32(0));
        roundtrip(ScalarKind::Int32, Value::I32(-1));
        roundtrip(ScalarKind::Int32, Value::I32(i32::MIN));
        roundtrip(ScalarKind::Uint32, Value::U32(u32::MAX));
        roundtrip(ScalarKind::Int64, Value::I64(i64::MIN));
        roundtrip(ScalarKind::Uint64, Value::U64(u64::MAX));
        roundtrip(ScalarKind::Bool, Value::Bool(true));
    }

    #[test]
    fn test_zigzag_roundtrips() {
        roundtrip(ScalarKind::Sint32, Value::I32(-1));
        roundtrip(ScalarKind::Sint32, Value::I32(i32::MIN));
        roundtrip(ScalarKind::Sint64, Value::I64(i64::MIN));
    }

    #[test]
    fn test_fixed_roundtrips() {
        roundtrip(ScalarKind::Fixed32, Value::U32(u32::MAX));
        roundtrip(ScalarKind::Sfixed32, Value::I32(i32::MIN));
        roundtrip(ScalarKind::Fixed64, Value::U64(u64::MAX));
        roundtrip(ScalarKind::Sfixed64, Value::I64(i64::MIN));
        roundtrip(ScalarKind::Float, Value::F32(-2.5));
        roundtrip(ScalarKind::Double, Value::F64(f64::MAX));
    }

    #[test]
    fn test_len_delimited_roundtrips() {
        roundtrip(ScalarKind::String, Value::Str(String::from("hello 🎉")));
        roundtrip(ScalarKind::Bytes, Value::Bytes(bytes::Bytes::from_static(&[1, 2, 3])));
        roundtrip(ScalarKind::String, Value::Str(String::new()));
    }

    #[test]
    fn test_negative_int32_ten_bytes() {
        let mut buf = Vec::new();
        write_scalar(ScalarKind::Int32, &Value::I32(-1), "test", &mut buf).unwrap();
        assert_eq!(buf.len(), 10);
        assert_eq!(buf[9], 0x01);
        assert!(buf[..9].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_string_invalid_utf8() {
        let buf = [3u8, 0xff, 0xfe, 0xfd];
        assert_eq!(
            read_scalar(ScalarKind::String, &mut &buf[..]),
            Err(WireError::InvalidUtf8)
        );
    }

    #[test]
    fn test_truncated_fixed() {
        let buf = [1u8, 2, 3];
        assert_eq!(
            read_scalar(ScalarKind::Fixed32, &mut &buf[..]),
            Err(WireError::Truncated)
        );
    }
}
