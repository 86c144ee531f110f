//! Runtime message values.
//!
//! A [`DynamicMessage`] is the generic runtime value keyed by its message
//! descriptor: one slot per declared field, driven entirely through the
//! `set`/`get`/`add` trio. Name-based accessor methods are a code
//! generator's business; keys here accept both the field's (possibly
//! camelCased) name and its original name.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::{Buf, Bytes};

use crate::codec::{decode, encode};
use crate::error::{Error, WireError};
use crate::leb128::Leb128;
use crate::schema::{FieldRef, MessageRef, NodeId, Schema};
use crate::value::{verify_value, Value};
use crate::wire;

/// One field slot. Repeated fields always hold a list (possibly empty);
/// singular fields are either absent or hold one verified value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    Empty,
    Single(Value),
    Repeated(Vec<Value>),
}

/// A read-only view of one field's slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Absent,
    Single(&'a Value),
    Repeated(&'a [Value]),
}

impl<'a> FieldValue<'a> {
    pub fn as_single(self) -> Option<&'a Value> {
        match self {
            FieldValue::Single(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_repeated(self) -> Option<&'a [Value]> {
        match self {
            FieldValue::Repeated(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

/// A runtime value of some message type.
#[derive(Clone)]
pub struct DynamicMessage {
    schema: Arc<Schema>,
    message: NodeId,
    slots: Vec<Slot>,
}

impl MessageRef {
    /// Construct an instance with every slot empty, then apply declared
    /// field defaults.
    pub fn empty(&self) -> DynamicMessage {
        let fields = self.fields();
        let slots = fields
            .iter()
            .map(|field| {
                if let Some(default) = field.default_value() {
                    Slot::Single(default)
                } else if field.is_repeated() {
                    Slot::Repeated(Vec::new())
                } else {
                    Slot::Empty
                }
            })
            .collect();
        DynamicMessage {
            schema: Arc::clone(self.schema()),
            message: self.node_id(),
            slots,
        }
    }

    /// Construct from `(field name, value)` pairs.
    pub fn from_pairs<K, V, I>(&self, pairs: I) -> Result<DynamicMessage, Error>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut message = self.empty();
        for (key, value) in pairs {
            message.set(key.as_ref(), value)?;
        }
        Ok(message)
    }

    /// Construct from positional values, matched to declared fields in
    /// declaration order.
    pub fn from_values<V, I>(&self, values: I) -> Result<DynamicMessage, Error>
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let fields = self.fields();
        let mut message = self.empty();
        for (index, value) in values.into_iter().enumerate() {
            let Some(field) = fields.get(index) else {
                return Err(Error::illegal_value(
                    self.fqn(),
                    format!("{} positional values for {} fields", index + 1, fields.len()),
                ));
            };
            message.set(field.name(), value)?;
        }
        Ok(message)
    }

    /// Decode a message of this type from the entire slice.
    pub fn decode(&self, data: &[u8]) -> Result<DynamicMessage, Error> {
        let mut slice = data;
        decode::decode_message(self, &mut slice, None)
    }

    /// Decode a length-prefixed message, advancing `buf` past it.
    pub fn decode_delimited<B: Buf>(&self, buf: &mut B) -> Result<DynamicMessage, Error> {
        let len = wire::read_len(buf).map_err(|e| Error::wire_in(self.fqn(), e))?;
        decode::decode_message(self, buf, Some(len))
    }

    /// Decode from base64 text.
    pub fn decode_base64(&self, text: &str) -> Result<DynamicMessage, Error> {
        let data = BASE64.decode(text).map_err(|_| {
            Error::wire_in(self.fqn(), WireError::InvalidTextEncoding { encoding: "base64" })
        })?;
        self.decode(&data)
    }

    /// Decode from hex text.
    pub fn decode_hex(&self, text: &str) -> Result<DynamicMessage, Error> {
        let data = hex::decode(text).map_err(|_| {
            Error::wire_in(self.fqn(), WireError::InvalidTextEncoding { encoding: "hex" })
        })?;
        self.decode(&data)
    }
}

impl DynamicMessage {
    /// The message type this value was built from.
    pub fn descriptor(&self) -> MessageRef {
        MessageRef::new(Arc::clone(&self.schema), self.message)
    }

    pub(crate) fn descriptor_node(&self) -> NodeId {
        self.message
    }

    pub(crate) fn schema_ptr(&self) -> *const Schema {
        Arc::as_ptr(&self.schema)
    }

    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    fn field_entry(&self, key: &str) -> Result<(usize, FieldRef), Error> {
        self.descriptor()
            .fields()
            .into_iter()
            .enumerate()
            .find(|(_, field)| field.name() == key || field.original_name() == key)
            .ok_or_else(|| Error::NameResolution {
                reference: key.to_owned(),
                context: self.schema.fqn(self.message),
            })
    }

    fn index_of(&self, field: &FieldRef) -> Option<usize> {
        self.descriptor()
            .fields()
            .iter()
            .position(|f| f.node_id() == field.node_id())
    }

    /// Set a field by name. The value is verified and coerced; repeated
    /// fields accept a list or a single value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), Error> {
        let (index, field) = self.field_entry(key)?;
        let verified = field.verify(value.into())?;
        self.slots[index] = match verified {
            Value::List(values) => Slot::Repeated(values),
            single => Slot::Single(single),
        };
        Ok(())
    }

    /// Clear a field by name. Clearing a required field is rejected.
    pub fn clear(&mut self, key: &str) -> Result<(), Error> {
        let (index, field) = self.field_entry(key)?;
        if field.is_required() {
            return Err(Error::illegal_value(
                field.fqn(),
                "required fields cannot be cleared",
            ));
        }
        self.slots[index] = if field.is_repeated() {
            Slot::Repeated(Vec::new())
        } else {
            Slot::Empty
        };
        Ok(())
    }

    /// Read a field's slot by name.
    pub fn get(&self, key: &str) -> Result<FieldValue<'_>, Error> {
        let (index, _) = self.field_entry(key)?;
        Ok(match &self.slots[index] {
            Slot::Empty => FieldValue::Absent,
            Slot::Single(value) => FieldValue::Single(value),
            Slot::Repeated(values) => FieldValue::Repeated(values),
        })
    }

    /// Append one verified value to a repeated field. Rejects singular
    /// fields.
    pub fn add(&mut self, key: &str, value: impl Into<Value>) -> Result<(), Error> {
        let (index, field) = self.field_entry(key)?;
        if !field.is_repeated() {
            return Err(Error::illegal_value(
                field.fqn(),
                "add applies to repeated fields only",
            ));
        }
        let verified = verify_value(self.schema.as_ref(), field.node_id(), value.into(), true)?;
        match &mut self.slots[index] {
            Slot::Repeated(values) => values.push(verified),
            slot => *slot = Slot::Repeated(vec![verified]),
        }
        Ok(())
    }

    /// Store a wire-decoded value without re-verification.
    pub(crate) fn set_unchecked(&mut self, field: &FieldRef, value: Value) {
        if let Some(index) = self.index_of(field) {
            self.slots[index] = Slot::Single(value);
        }
    }

    /// Append a wire-decoded value without re-verification.
    pub(crate) fn push_unchecked(&mut self, field: &FieldRef, value: Value) {
        if let Some(index) = self.index_of(field) {
            match &mut self.slots[index] {
                Slot::Repeated(values) => values.push(value),
                slot => *slot = Slot::Repeated(vec![value]),
            }
        }
    }

    // ---- whole-message operations ------------------------------------

    /// Encode into a fresh buffer.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        encode::encode_message(self, &mut buf)?;
        Ok(buf)
    }

    /// Encode, appending to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        encode::encode_message(self, buf)
    }

    /// Encode into a shared byte buffer.
    pub fn encode_to_bytes(&self) -> Result<Bytes, Error> {
        self.encode_to_vec().map(Bytes::from)
    }

    /// Encode with a varint length prefix, appending to `buf`.
    pub fn encode_delimited(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        let payload = self.encode_to_vec()?;
        (payload.len() as u64).write_leb128(buf);
        buf.extend_from_slice(&payload);
        Ok(())
    }

    /// The encoded message as base64 text.
    pub fn to_base64(&self) -> Result<String, Error> {
        self.encode_to_vec().map(|buf| BASE64.encode(buf))
    }

    /// The encoded message as lowercase hex text.
    pub fn to_hex(&self) -> Result<String, Error> {
        self.encode_to_vec().map(hex::encode)
    }

    /// Deep-copy the set fields into a plain name-to-value mapping.
    ///
    /// `bytes` values are omitted unless `include_buffers` is set; the rule
    /// applies through nested messages.
    pub fn to_raw(&self, include_buffers: bool) -> BTreeMap<String, Value> {
        let mut raw = BTreeMap::new();
        for (field, slot) in self.descriptor().fields().iter().zip(&self.slots) {
            let value = match slot {
                Slot::Empty => continue,
                Slot::Single(value) => match raw_copy(value, include_buffers) {
                    Some(value) => value,
                    None => continue,
                },
                Slot::Repeated(values) => Value::List(
                    values
                        .iter()
                        .filter_map(|value| raw_copy(value, include_buffers))
                        .collect(),
                ),
            };
            raw.insert(field.name().to_owned(), value);
        }
        raw
    }

    fn without_buffers(&self) -> DynamicMessage {
        let mut copy = self.clone();
        for slot in &mut copy.slots {
            match slot {
                Slot::Single(Value::Bytes(_)) => *slot = Slot::Empty,
                Slot::Single(Value::Message(nested)) => *nested = nested.without_buffers(),
                Slot::Repeated(values) => {
                    values.retain(|value| !matches!(value, Value::Bytes(_)));
                    for value in values {
                        if let Value::Message(nested) = value {
                            *nested = nested.without_buffers();
                        }
                    }
                }
                _ => {}
            }
        }
        copy
    }
}

fn raw_copy(value: &Value, include_buffers: bool) -> Option<Value> {
    match value {
        Value::Bytes(_) if !include_buffers => None,
        Value::Message(nested) if !include_buffers => {
            Some(Value::Message(nested.without_buffers()))
        }
        other => Some(other.clone()),
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && Arc::ptr_eq(&self.schema, &other.schema)
            && self.slots == other.slots
    }
}

impl std::fmt::Debug for DynamicMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (field, slot) in self.descriptor().fields().iter().zip(&self.slots) {
            match slot {
                Slot::Empty => {}
                Slot::Single(value) => {
                    map.entry(&field.name(), value);
                }
                Slot::Repeated(values) => {
                    map.entry(&field.name(), values);
                }
            }
        }
        map.finish()
    }
}
