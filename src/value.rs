//! Dynamic field values and the per-field verification rules.
//!
//! Every write into a runtime message goes through [`verify_value`], which
//! checks the value's shape against the field's rule and type and coerces
//! scalars into the wire representation's in-memory form. Slots therefore
//! only ever hold verified values, and the encoder can trust them.

use bytes::Bytes;

use crate::error::Error;
use crate::runtime::DynamicMessage;
use crate::schema::{FieldRef, FieldType, Label, NodeId, ScalarKind, Schema};

/// A dynamically typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Bytes),
    /// An enum value, stored as its declared number.
    Enum(i32),
    Message(DynamicMessage),
    /// A sequence for repeated fields. Never nests.
    List(Vec<Value>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

impl From<DynamicMessage> for Value {
    fn from(v: DynamicMessage) -> Self {
        Value::Message(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl Value {
    /// A short tag for diagnostics.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
        }
    }
}

impl FieldRef {
    /// Validate and coerce `value` for this field.
    ///
    /// Repeated fields accept a list or a single value (which is wrapped);
    /// singular fields reject lists.
    pub fn verify(&self, value: Value) -> Result<Value, Error> {
        verify_value(self.schema().as_ref(), self.node_id(), value, false)
    }
}

/// The verification entry point, usable before the schema is frozen.
pub(crate) fn verify_value(
    schema: &Schema,
    field: NodeId,
    value: Value,
    inside_list: bool,
) -> Result<Value, Error> {
    let Some(data) = schema.field_data(field) else {
        return Err(Error::illegal_value(schema.fqn(field), "not a field"));
    };
    let name = schema.fqn(field);

    if inside_list {
        if matches!(value, Value::List(_)) {
            return Err(Error::illegal_value(name, "sequences do not nest"));
        }
    } else if data.label == Label::Repeated {
        return match value {
            Value::List(items) => {
                let verified = items
                    .into_iter()
                    .map(|item| verify_value(schema, field, item, true))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List(verified))
            }
            single => Ok(Value::List(vec![verify_value(
                schema, field, single, true,
            )?])),
        };
    } else if matches!(value, Value::List(_)) {
        return Err(Error::illegal_value(
            name,
            "sequence supplied for a singular field",
        ));
    }

    match &data.ty {
        FieldType::Scalar(kind) => verify_scalar(*kind, value, &name),
        FieldType::Enum(enumeration) => verify_enum(schema, *enumeration, value, &name),
        FieldType::Message(target) | FieldType::Group(target) => {
            verify_message(schema, *target, value, &name)
        }
        FieldType::Unresolved { .. } => Err(Error::UnresolvedType { field: name }),
    }
}

/// Coerce toward a 64-bit signed integer. Floats must be finite and are
/// truncated toward zero; strings are parsed. Out-of-range inputs wrap at
/// the destination width, mirroring the 32-bit masking of the original
/// runtime.
fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::I32(n) => Some(i64::from(*n)),
        Value::U32(n) => Some(i64::from(*n)),
        Value::I64(n) => Some(*n),
        Value::U64(n) => Some(*n as i64),
        Value::Enum(n) => Some(i64::from(*n)),
        Value::F32(x) if x.is_finite() => Some(*x as i64),
        Value::F64(x) if x.is_finite() => Some(*x as i64),
        Value::Str(s) => {
            if let Ok(n) = s.parse::<i64>() {
                Some(n)
            } else if let Ok(n) = s.parse::<u64>() {
                Some(n as i64)
            } else {
                s.parse::<f64>().ok().filter(|x| x.is_finite()).map(|x| x as i64)
            }
        }
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::I32(n) => Some(f64::from(*n)),
        Value::U32(n) => Some(f64::from(*n)),
        Value::I64(n) => Some(*n as f64),
        Value::U64(n) => Some(*n as f64),
        Value::Enum(n) => Some(f64::from(*n)),
        Value::F32(x) => Some(f64::from(*x)),
        Value::F64(x) => Some(*x),
        // `parse` already understands "inf", "-inf", and "NaN", which pass
        // through for floating-point fields.
        Value::Str(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn verify_scalar(kind: ScalarKind, value: Value, name: &str) -> Result<Value, Error> {
    let reject = |value: &Value| {
        Err(Error::illegal_value(
            name,
            format!("{} not convertible to {}", value.kind_name(), kind.proto_name()),
        ))
    };

    match kind {
        ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => {
            match coerce_i64(&value) {
                Some(n) => Ok(Value::I32(n as i32)),
                None => reject(&value),
            }
        }
        ScalarKind::Uint32 | ScalarKind::Fixed32 => match coerce_i64(&value) {
            Some(n) => Ok(Value::U32(n as u32)),
            None => reject(&value),
        },
        ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => {
            match coerce_i64(&value) {
                Some(n) => Ok(Value::I64(n)),
                None => reject(&value),
            }
        }
        ScalarKind::Uint64 | ScalarKind::Fixed64 => match coerce_i64(&value) {
            Some(n) => Ok(Value::U64(n as u64)),
            None => reject(&value),
        },
        ScalarKind::Bool => match &value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            // One rule on every path: exactly "true" or "false".
            Value::Str(s) if s == "true" => Ok(Value::Bool(true)),
            Value::Str(s) if s == "false" => Ok(Value::Bool(false)),
            _ => reject(&value),
        },
        ScalarKind::Float => match coerce_f64(&value) {
            Some(x) => Ok(Value::F32(x as f32)),
            None => reject(&value),
        },
        ScalarKind::Double => match coerce_f64(&value) {
            Some(x) => Ok(Value::F64(x)),
            None => reject(&value),
        },
        ScalarKind::String => match value {
            Value::Str(s) => Ok(Value::Str(s)),
            other => reject(&other),
        },
        ScalarKind::Bytes => match value {
            Value::Bytes(b) => Ok(Value::Bytes(b)),
            Value::Str(s) => Ok(Value::Bytes(Bytes::from(s.into_bytes()))),
            other => reject(&other),
        },
    }
}

fn verify_enum(
    schema: &Schema,
    enumeration: NodeId,
    value: Value,
    name: &str,
) -> Result<Value, Error> {
    let declared_number = |n: i32| schema.child_by_number(enumeration, i64::from(n)).is_some();

    match &value {
        Value::Enum(n) | Value::I32(n) => {
            if declared_number(*n) {
                Ok(Value::Enum(*n))
            } else {
                Err(Error::IllegalEnumValue {
                    field: name.to_owned(),
                    value: n.to_string(),
                })
            }
        }
        Value::I64(n) => match i32::try_from(*n) {
            Ok(n) if declared_number(n) => Ok(Value::Enum(n)),
            _ => Err(Error::IllegalEnumValue {
                field: name.to_owned(),
                value: n.to_string(),
            }),
        },
        Value::U32(n) => match i32::try_from(*n) {
            Ok(n) if declared_number(n) => Ok(Value::Enum(n)),
            _ => Err(Error::IllegalEnumValue {
                field: name.to_owned(),
                value: n.to_string(),
            }),
        },
        Value::Str(s) => match schema.child_by_name(enumeration, s) {
            Some(v) => match &schema.node(v).kind {
                crate::schema::NodeKind::EnumValue(data) => Ok(Value::Enum(data.number)),
                _ => Err(Error::IllegalEnumValue {
                    field: name.to_owned(),
                    value: s.clone(),
                }),
            },
            None => Err(Error::IllegalEnumValue {
                field: name.to_owned(),
                value: s.clone(),
            }),
        },
        other => Err(Error::IllegalEnumValue {
            field: name.to_owned(),
            value: other.kind_name().to_owned(),
        }),
    }
}

fn verify_message(
    schema: &Schema,
    target: NodeId,
    value: Value,
    name: &str,
) -> Result<Value, Error> {
    match value {
        Value::Message(message) => {
            let same_schema = std::ptr::eq(message.schema_ptr(), schema as *const Schema);
            if same_schema && message.descriptor_node() == target {
                Ok(Value::Message(message))
            } else {
                Err(Error::illegal_value(
                    name,
                    format!("message is not a {}", schema.fqn(target)),
                ))
            }
        }
        other => Err(Error::illegal_value(
            name,
            format!("{} where a message was expected", other.kind_name()),
        )),
    }
}
