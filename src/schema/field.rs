//! Field descriptors: labels, scalar kinds, and two-phase type references.

use std::collections::BTreeMap;

use crate::schema::{Literal, NodeId};
use crate::value::Value;
use crate::wire::WireType;

/// The proto2 field rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Label {
    Required,
    Optional,
    Repeated,
}

/// The scalar field kinds and their wire framing.
///
/// This is the registered-descriptor table: each kind knows the wire type
/// its payload travels under.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScalarKind {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    Float,
    Double,
    String,
    Bytes,
}

impl ScalarKind {
    /// The wire type a payload of this kind is framed with.
    pub const fn wire_type(self) -> WireType {
        match self {
            ScalarKind::Int32
            | ScalarKind::Int64
            | ScalarKind::Uint32
            | ScalarKind::Uint64
            | ScalarKind::Sint32
            | ScalarKind::Sint64
            | ScalarKind::Bool => WireType::Varint,
            ScalarKind::Fixed64 | ScalarKind::Sfixed64 | ScalarKind::Double => WireType::Bits64,
            ScalarKind::Fixed32 | ScalarKind::Sfixed32 | ScalarKind::Float => WireType::Bits32,
            ScalarKind::String | ScalarKind::Bytes => WireType::LenDelim,
        }
    }

    /// Whether `[packed=true]` is legal for a repeated field of this kind.
    ///
    /// Everything except the length-delimited kinds packs.
    pub const fn is_packable(self) -> bool {
        !matches!(self, ScalarKind::String | ScalarKind::Bytes)
    }

    /// The `.proto` spelling of this kind.
    pub const fn proto_name(self) -> &'static str {
        match self {
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Sint32 => "sint32",
            ScalarKind::Sint64 => "sint64",
            ScalarKind::Fixed32 => "fixed32",
            ScalarKind::Fixed64 => "fixed64",
            ScalarKind::Sfixed32 => "sfixed32",
            ScalarKind::Sfixed64 => "sfixed64",
            ScalarKind::Bool => "bool",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
        }
    }
}

/// A field's type, before and after the resolution pass.
///
/// The parser records message, group, and enum references symbolically as
/// [`FieldType::Unresolved`]; [`crate::schema::Schema::resolve_types`]
/// replaces them with handles into the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarKind),
    /// A symbolic reference awaiting resolution. `group` selects the legacy
    /// start/end-group framing once the reference binds to a message.
    Unresolved { name: String, group: bool },
    Message(NodeId),
    Group(NodeId),
    Enum(NodeId),
}

impl FieldType {
    /// Shorthand for a symbolic message-or-enum reference.
    pub fn named(name: impl Into<String>) -> Self {
        FieldType::Unresolved {
            name: name.into(),
            group: false,
        }
    }

    /// Shorthand for a symbolic group reference.
    pub fn group(name: impl Into<String>) -> Self {
        FieldType::Unresolved {
            name: name.into(),
            group: true,
        }
    }

    /// The wire framing for values of this type, once resolved.
    pub fn wire_type(&self) -> Option<WireType> {
        match self {
            FieldType::Scalar(kind) => Some(kind.wire_type()),
            FieldType::Unresolved { .. } => None,
            FieldType::Message(_) => Some(WireType::LenDelim),
            FieldType::Group(_) => Some(WireType::StartGroup),
            FieldType::Enum(_) => Some(WireType::Varint),
        }
    }
}

/// Descriptor payload of a field node.
#[derive(Debug, Clone)]
pub(crate) struct FieldData {
    pub id: u32,
    pub label: Label,
    pub ty: FieldType,
    /// The source spelling, kept when `convert_fields_to_camel_case`
    /// rewrites the node name.
    pub original_name: String,
    pub packed: bool,
    pub options: BTreeMap<String, Literal>,
    /// The verified form of the `default` option, filled in by the
    /// resolution pass.
    pub default_value: Option<Value>,
}
