//! Reflective message decoding.
//!
//! The decode loop reads a key, dispatches on the field id, and skips
//! anything it does not know about, which is what keeps old readers
//! compatible with newer writers. Required fields are checked after the
//! loop so the caller still receives the partially decoded value.

use bytes::Buf;

use crate::codec::read_scalar;
use crate::error::{Error, WireError};
use crate::leb128::Leb128;
use crate::runtime::{DynamicMessage, Slot};
use crate::schema::{FieldRef, FieldType, MessageRef};
use crate::value::Value;
use crate::wire::{self, FieldKey, WireType};

/// Decode one message of type `descriptor` from `buf`.
///
/// With `len` set the message occupies exactly that many bytes and `buf` is
/// advanced past them; otherwise the message runs to the end of the buffer
/// (or, for a group body, to its end-group record).
pub(crate) fn decode_message<B: Buf>(
    descriptor: &MessageRef,
    buf: &mut B,
    len: Option<usize>,
) -> Result<DynamicMessage, Error> {
    match len {
        Some(len) => {
            if buf.remaining() < len {
                return Err(Error::wire_in(descriptor.fqn(), WireError::Truncated));
            }
            let window = buf.copy_to_bytes(len);
            decode_body(descriptor, &mut &window[..])
        }
        None => decode_body(descriptor, buf),
    }
}

fn decode_body<B: Buf>(descriptor: &MessageRef, buf: &mut B) -> Result<DynamicMessage, Error> {
    let mut message = descriptor.empty();
    let group_id = descriptor.group_id();
    let mut end_group: Option<u32> = None;

    while buf.has_remaining() {
        let key = FieldKey::read(buf).map_err(|e| Error::wire_in(descriptor.fqn(), e))?;
        if key.wire_type == WireType::EndGroup {
            end_group = Some(key.id);
            break;
        }
        match descriptor.field_by_id(key.id) {
            None => wire::skip_value(key.wire_type, key.id, buf)
                .map_err(|e| Error::wire_in(descriptor.fqn(), e))?,
            Some(field) => decode_field_into(&field, key.wire_type, buf, &mut message)?,
        }
    }

    match (group_id, end_group) {
        (Some(expected), Some(actual)) if expected == actual => {}
        (Some(expected), Some(actual)) => {
            return Err(Error::wire_in(
                descriptor.fqn(),
                WireError::GroupEndMismatch { expected, actual },
            ));
        }
        (Some(id), None) => {
            return Err(Error::wire_in(
                descriptor.fqn(),
                WireError::UnterminatedGroup { id },
            ));
        }
        (None, Some(id)) => {
            return Err(Error::wire_in(
                descriptor.fqn(),
                WireError::UnexpectedGroupEnd { id },
            ));
        }
        (None, None) => {}
    }

    let missing: Vec<String> = descriptor
        .fields()
        .iter()
        .zip(message.slots())
        .filter(|(field, slot)| field.is_required() && matches!(slot, Slot::Empty))
        .map(|(field, _)| field.name().to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(Error::RequiredFieldMissing {
            missing,
            encoded: None,
            decoded: Some(Box::new(message)),
        });
    }
    Ok(message)
}

/// Decode one record for a known field and store it.
///
/// Values coming off the wire are stored without re-verification; the
/// scalar reader already yields wire-valid values. Repeated fields append,
/// singular fields overwrite (last value wins).
fn decode_field_into<B: Buf>(
    field: &FieldRef,
    wire_type: WireType,
    buf: &mut B,
    message: &mut DynamicMessage,
) -> Result<(), Error> {
    let in_field = |e: WireError| Error::wire_in(field.fqn(), e);

    match field.field_type() {
        FieldType::Scalar(kind) => {
            let declared = kind.wire_type();
            if field.is_repeated()
                && wire_type == WireType::LenDelim
                && declared != WireType::LenDelim
            {
                // A packed record, whether or not the field was declared
                // packed: the two encodings decode identically.
                let window = crate::codec::read_len_prefixed(buf).map_err(in_field)?;
                let mut slice = &window[..];
                while slice.has_remaining() {
                    let value = read_scalar(kind, &mut slice).map_err(in_field)?;
                    message.push_unchecked(field, value);
                }
                Ok(())
            } else if wire_type != declared {
                Err(in_field(WireError::TypeMismatch {
                    expected: declared,
                    actual: wire_type,
                }))
            } else {
                let value = read_scalar(kind, buf).map_err(in_field)?;
                store(field, message, value);
                Ok(())
            }
        }
        FieldType::Enum(_) => {
            if field.is_repeated() && wire_type == WireType::LenDelim {
                let window = crate::codec::read_len_prefixed(buf).map_err(in_field)?;
                let mut slice = &window[..];
                while slice.has_remaining() {
                    let number = u64::read_leb128(&mut slice).map_err(in_field)? as i32;
                    message.push_unchecked(field, Value::Enum(number));
                }
                Ok(())
            } else if wire_type != WireType::Varint {
                Err(in_field(WireError::TypeMismatch {
                    expected: WireType::Varint,
                    actual: wire_type,
                }))
            } else {
                let number = u64::read_leb128(buf).map_err(in_field)? as i32;
                store(field, message, Value::Enum(number));
                Ok(())
            }
        }
        FieldType::Message(_) => {
            if wire_type != WireType::LenDelim {
                return Err(in_field(WireError::TypeMismatch {
                    expected: WireType::LenDelim,
                    actual: wire_type,
                }));
            }
            let target = field
                .message_type()
                .ok_or_else(|| Error::UnresolvedType { field: field.fqn() })?;
            let len = wire::read_len(buf).map_err(in_field)?;
            let nested = decode_message(&target, buf, Some(len))?;
            store(field, message, Value::Message(nested));
            Ok(())
        }
        FieldType::Group(_) => {
            if wire_type != WireType::StartGroup {
                return Err(in_field(WireError::TypeMismatch {
                    expected: WireType::StartGroup,
                    actual: wire_type,
                }));
            }
            let target = field
                .message_type()
                .ok_or_else(|| Error::UnresolvedType { field: field.fqn() })?;
            // The group body consumes its own end-group record.
            let nested = decode_body(&target, buf)?;
            store(field, message, Value::Message(nested));
            Ok(())
        }
        FieldType::Unresolved { .. } => Err(Error::UnresolvedType { field: field.fqn() }),
    }
}

fn store(field: &FieldRef, message: &mut DynamicMessage, value: Value) {
    if field.is_repeated() {
        message.push_unchecked(field, value);
    } else {
        message.set_unchecked(field, value);
    }
}
