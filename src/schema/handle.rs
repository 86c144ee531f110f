//! Cheap typed handles into a frozen [`Schema`].
//!
//! A handle is an `Arc<Schema>` plus a [`NodeId`]; cloning one is two
//! pointer-sized copies. Handles are the "built factory" surface: a
//! [`MessageRef`] constructs and decodes dynamic messages, an [`EnumRef`]
//! materializes the name/number mapping, a [`ServiceRef`] builds a
//! dispatcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Error;
use crate::schema::{
    FieldType, Label, Literal, NodeId, NodeKind, Schema, TypeBinding,
};

macro_rules! handle_common {
    ($ty:ident) => {
        impl $ty {
            pub(crate) fn new(schema: Arc<Schema>, id: NodeId) -> Self {
                $ty { schema, id }
            }

            pub fn schema(&self) -> &Arc<Schema> {
                &self.schema
            }

            pub fn node_id(&self) -> NodeId {
                self.id
            }

            pub fn name(&self) -> &str {
                self.schema.name(self.id)
            }

            /// Fully-qualified dotted name, with a leading dot.
            pub fn fqn(&self) -> String {
                self.schema.fqn(self.id)
            }

            /// Options declared on this node.
            pub fn options(&self) -> &BTreeMap<String, Literal> {
                self.schema.options(self.id)
            }
        }

        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id && Arc::ptr_eq(&self.schema, &other.schema)
            }
        }

        impl Eq for $ty {}

        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.schema.describe(self.id))
            }
        }
    };
}

/// Handle to a message type; the runtime value factory for that type.
#[derive(Clone)]
pub struct MessageRef {
    pub(crate) schema: Arc<Schema>,
    pub(crate) id: NodeId,
}

handle_common!(MessageRef);

impl MessageRef {
    /// Declared fields, in declaration order.
    pub fn fields(&self) -> Vec<FieldRef> {
        self.schema
            .children(self.id)
            .iter()
            .copied()
            .filter(|&c| matches!(self.schema.node(c).kind, NodeKind::Field(_)))
            .map(|c| FieldRef::new(Arc::clone(&self.schema), c))
            .collect()
    }

    /// Find a field by its (possibly camelCased) name or original name.
    pub fn field_by_name(&self, name: &str) -> Option<FieldRef> {
        self.fields()
            .into_iter()
            .find(|f| f.name() == name || f.original_name() == name)
    }

    /// Find a field by its id.
    pub fn field_by_id(&self, id: u32) -> Option<FieldRef> {
        self.fields().into_iter().find(|f| f.id() == id)
    }

    /// Messages nested directly under this one.
    pub fn nested_messages(&self) -> Vec<MessageRef> {
        self.schema
            .children(self.id)
            .iter()
            .copied()
            .filter(|&c| matches!(self.schema.node(c).kind, NodeKind::Message(_)))
            .map(|c| MessageRef::new(Arc::clone(&self.schema), c))
            .collect()
    }

    /// Enums nested directly under this message.
    pub fn nested_enums(&self) -> Vec<EnumRef> {
        self.schema
            .children(self.id)
            .iter()
            .copied()
            .filter(|&c| matches!(self.schema.node(c).kind, NodeKind::Enum(_)))
            .map(|c| EnumRef::new(Arc::clone(&self.schema), c))
            .collect()
    }

    /// When this message is a legacy group body, the id of the declaring
    /// field (and of the end-group record on the wire).
    pub fn group_id(&self) -> Option<u32> {
        self.schema.message_data(self.id).and_then(|m| m.group_id)
    }

    /// The reserved extension id range, if any.
    pub fn extensions(&self) -> Option<(u32, u32)> {
        self.schema.message_data(self.id).and_then(|m| m.extensions)
    }
}

/// Handle to a single field of a message.
#[derive(Clone)]
pub struct FieldRef {
    pub(crate) schema: Arc<Schema>,
    pub(crate) id: NodeId,
}

handle_common!(FieldRef);

impl FieldRef {
    pub fn original_name(&self) -> &str {
        self.schema
            .field_data(self.id)
            .map(|f| f.original_name.as_str())
            .unwrap_or_default()
    }

    /// The field id (wire tag number).
    pub fn id(&self) -> u32 {
        self.schema.field_data(self.id).map(|f| f.id).unwrap_or(0)
    }

    pub fn label(&self) -> Label {
        self.schema
            .field_data(self.id)
            .map(|f| f.label)
            .unwrap_or(Label::Optional)
    }

    pub fn is_repeated(&self) -> bool {
        self.label() == Label::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.label() == Label::Required
    }

    /// Whether this repeated field uses packed encoding.
    pub fn is_packed(&self) -> bool {
        self.schema
            .field_data(self.id)
            .map(|f| f.packed)
            .unwrap_or(false)
    }

    pub fn field_type(&self) -> FieldType {
        self.schema
            .field_data(self.id)
            .map(|f| f.ty.clone())
            .unwrap_or(FieldType::Unresolved {
                name: String::new(),
                group: false,
            })
    }

    /// The verified default value, when the field declares one.
    pub fn default_value(&self) -> Option<crate::value::Value> {
        self.schema
            .field_data(self.id)
            .and_then(|f| f.default_value.clone())
    }

    /// The message this field belongs to.
    pub fn containing_message(&self) -> Option<MessageRef> {
        self.schema
            .parent(self.id)
            .map(|p| MessageRef::new(Arc::clone(&self.schema), p))
    }

    /// The resolved message (or group body) this field refers to.
    pub fn message_type(&self) -> Option<MessageRef> {
        match self.field_type() {
            FieldType::Message(id) | FieldType::Group(id) => {
                Some(MessageRef::new(Arc::clone(&self.schema), id))
            }
            _ => None,
        }
    }

    /// The resolved enum this field refers to.
    pub fn enum_type(&self) -> Option<EnumRef> {
        match self.field_type() {
            FieldType::Enum(id) => Some(EnumRef::new(Arc::clone(&self.schema), id)),
            _ => None,
        }
    }
}

/// Handle to an enum type.
#[derive(Clone)]
pub struct EnumRef {
    pub(crate) schema: Arc<Schema>,
    pub(crate) id: NodeId,
}

handle_common!(EnumRef);

impl EnumRef {
    /// Declared values, in declaration order.
    pub fn values(&self) -> Vec<EnumValueRef> {
        self.schema
            .children(self.id)
            .iter()
            .copied()
            .filter(|&c| matches!(self.schema.node(c).kind, NodeKind::EnumValue(_)))
            .map(|c| EnumValueRef::new(Arc::clone(&self.schema), c))
            .collect()
    }

    pub fn value_by_name(&self, name: &str) -> Option<EnumValueRef> {
        self.values().into_iter().find(|v| v.name() == name)
    }

    pub fn value_by_number(&self, number: i32) -> Option<EnumValueRef> {
        self.values().into_iter().find(|v| v.number() == number)
    }

    /// Materialize the name-to-number mapping.
    pub fn build(&self) -> BTreeMap<String, i32> {
        self.values()
            .into_iter()
            .map(|v| (v.name().to_owned(), v.number()))
            .collect()
    }
}

/// Handle to a single enum value.
#[derive(Clone)]
pub struct EnumValueRef {
    pub(crate) schema: Arc<Schema>,
    pub(crate) id: NodeId,
}

handle_common!(EnumValueRef);

impl EnumValueRef {
    pub fn number(&self) -> i32 {
        match &self.schema.node(self.id).kind {
            NodeKind::EnumValue(v) => v.number,
            _ => 0,
        }
    }
}

/// Handle to a service.
#[derive(Clone)]
pub struct ServiceRef {
    pub(crate) schema: Arc<Schema>,
    pub(crate) id: NodeId,
}

handle_common!(ServiceRef);

impl ServiceRef {
    /// Declared rpc methods, in declaration order.
    pub fn rpcs(&self) -> Vec<RpcRef> {
        self.schema
            .children(self.id)
            .iter()
            .copied()
            .filter(|&c| matches!(self.schema.node(c).kind, NodeKind::Rpc(_)))
            .map(|c| RpcRef::new(Arc::clone(&self.schema), c))
            .collect()
    }

    pub fn rpc_by_name(&self, name: &str) -> Option<RpcRef> {
        self.rpcs().into_iter().find(|r| r.name() == name)
    }
}

/// Handle to a single rpc method.
#[derive(Clone)]
pub struct RpcRef {
    pub(crate) schema: Arc<Schema>,
    pub(crate) id: NodeId,
}

handle_common!(RpcRef);

impl RpcRef {
    fn binding(&self, request: bool) -> Result<MessageRef, Error> {
        let bound = match &self.schema.node(self.id).kind {
            NodeKind::Rpc(r) => {
                let binding = if request { &r.request } else { &r.response };
                match binding {
                    TypeBinding::Resolved(id) => Some(*id),
                    TypeBinding::Unresolved(_) => None,
                }
            }
            _ => None,
        };
        bound
            .map(|id| MessageRef::new(Arc::clone(&self.schema), id))
            .ok_or_else(|| Error::UnresolvedType {
                field: self.fqn(),
            })
    }

    /// The resolved request message type.
    pub fn request(&self) -> Result<MessageRef, Error> {
        self.binding(true)
    }

    /// The resolved response message type.
    pub fn response(&self) -> Result<MessageRef, Error> {
        self.binding(false)
    }
}
