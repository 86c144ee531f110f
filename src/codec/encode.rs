//! Reflective message encoding.
//!
//! Fields are emitted in declaration order. A missing required field does
//! not abort the pass: the remaining fields are still encoded and the
//! failure is reported at the end with the best-effort buffer attached.

use smallvec::SmallVec;

use crate::codec::{scalar_len, write_scalar};
use crate::error::Error;
use crate::leb128::Leb128;
use crate::runtime::{DynamicMessage, Slot};
use crate::schema::{FieldRef, FieldType};
use crate::value::Value;
use crate::wire::{FieldKey, WireType};

pub(crate) fn encode_message(message: &DynamicMessage, buf: &mut Vec<u8>) -> Result<(), Error> {
    let descriptor = message.descriptor();
    let mut missing: SmallVec<[String; 4]> = SmallVec::new();

    for (field, slot) in descriptor.fields().iter().zip(message.slots()) {
        match slot {
            Slot::Empty => {
                if field.is_required() {
                    missing.push(field.name().to_owned());
                }
            }
            Slot::Single(value) => encode_single(field, value, buf)?,
            Slot::Repeated(values) if values.is_empty() => {}
            Slot::Repeated(values) if field.is_packed() => encode_packed(field, values, buf)?,
            Slot::Repeated(values) => {
                for value in values {
                    encode_single(field, value, buf)?;
                }
            }
        }
    }

    if !missing.is_empty() {
        return Err(Error::RequiredFieldMissing {
            missing: missing.into_vec(),
            encoded: Some(buf.clone()),
            decoded: None,
        });
    }
    Ok(())
}

fn encode_single(field: &FieldRef, value: &Value, buf: &mut Vec<u8>) -> Result<(), Error> {
    let id = field.id();
    match field.field_type() {
        FieldType::Scalar(kind) => {
            FieldKey::new(id, kind.wire_type()).write(buf);
            write_scalar(kind, value, &field.fqn(), buf)
        }
        FieldType::Enum(_) => {
            let Value::Enum(number) = value else {
                return Err(Error::illegal_value(
                    field.fqn(),
                    format!("{} slot for enum field", value.kind_name()),
                ));
            };
            FieldKey::new(id, WireType::Varint).write(buf);
            (*number as i64 as u64).write_leb128(buf);
            Ok(())
        }
        FieldType::Message(_) => {
            let message = expect_message(field, value)?;
            let mut scratch = Vec::new();
            encode_message(message, &mut scratch)?;
            FieldKey::new(id, WireType::LenDelim).write(buf);
            (scratch.len() as u64).write_leb128(buf);
            buf.extend_from_slice(&scratch);
            Ok(())
        }
        FieldType::Group(_) => {
            let message = expect_message(field, value)?;
            FieldKey::new(id, WireType::StartGroup).write(buf);
            encode_message(message, buf)?;
            FieldKey::new(id, WireType::EndGroup).write(buf);
            Ok(())
        }
        FieldType::Unresolved { .. } => Err(Error::UnresolvedType { field: field.fqn() }),
    }
}

fn expect_message<'v>(field: &FieldRef, value: &'v Value) -> Result<&'v DynamicMessage, Error> {
    match value {
        Value::Message(message) => Ok(message),
        other => Err(Error::illegal_value(
            field.fqn(),
            format!("{} slot for message field", other.kind_name()),
        )),
    }
}

/// Emit a packed repeated field: one length-delimited record holding every
/// element payload back to back. The payload length is computed up front,
/// so no backpatching is needed.
fn encode_packed(field: &FieldRef, values: &[Value], buf: &mut Vec<u8>) -> Result<(), Error> {
    let name = field.fqn();
    let payload_len = match field.field_type() {
        FieldType::Scalar(kind) => values
            .iter()
            .map(|value| scalar_len(kind, value, &name))
            .sum::<Result<usize, Error>>()?,
        FieldType::Enum(_) => values
            .iter()
            .map(|value| enum_payload_len(field, value))
            .sum::<Result<usize, Error>>()?,
        _ => {
            return Err(Error::illegal_value(
                name,
                "packed encoding applies to scalar and enum fields",
            ));
        }
    };

    FieldKey::new(field.id(), WireType::LenDelim).write(buf);
    (payload_len as u64).write_leb128(buf);

    match field.field_type() {
        FieldType::Scalar(kind) => {
            for value in values {
                write_scalar(kind, value, &name, buf)?;
            }
        }
        FieldType::Enum(_) => {
            for value in values {
                let Value::Enum(number) = value else {
                    return Err(Error::illegal_value(
                        name,
                        format!("{} slot for enum field", value.kind_name()),
                    ));
                };
                (*number as i64 as u64).write_leb128(buf);
            }
        }
        _ => {}
    }
    Ok(())
}

fn enum_payload_len(field: &FieldRef, value: &Value) -> Result<usize, Error> {
    match value {
        Value::Enum(number) => Ok((*number as i64 as u64).leb128_len()),
        other => Err(Error::illegal_value(
            field.fqn(),
            format!("{} slot for enum field", other.kind_name()),
        )),
    }
}
