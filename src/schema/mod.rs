//! The reflection tree: an arena of schema nodes with numeric handles.
//!
//! A `.proto` parser (external to this crate) constructs the tree through
//! the `add_*` methods, then calls [`Schema::resolve_types`] to bind every
//! symbolic type reference and freeze the tree behind an [`Arc`]. All
//! runtime surfaces (message factories, dynamic values, dispatchers) hang
//! off the frozen schema.

mod field;
mod handle;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::Error;
use crate::util::to_camel_case;
use crate::value::Value;
use crate::wire::{MAX_FIELD_ID, MIN_FIELD_ID};

pub use field::{FieldType, Label, ScalarKind};
pub use handle::{EnumRef, EnumValueRef, FieldRef, MessageRef, RpcRef, ServiceRef};

pub(crate) use field::FieldData;

/// A literal option value, as written in a `.proto` source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Construction-time configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaOptions {
    /// Rewrite `snake_case` field names to `camelCase` at construction.
    /// The source spelling is retained as the field's `original_name`.
    pub convert_fields_to_camel_case: bool,
}

/// Handle to a node in the reflection arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One reflection entity. The parent link is a plain handle, so the tree
/// stays acyclic under ownership.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub parent: Option<NodeId>,
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Namespace(NamespaceData),
    Message(MessageData),
    Field(FieldData),
    Enum(NamespaceData),
    EnumValue(EnumValueData),
    Service(NamespaceData),
    Rpc(RpcData),
}

impl NodeKind {
    fn tag(&self) -> &'static str {
        match self {
            NodeKind::Namespace(_) => "Namespace",
            NodeKind::Message(_) => "Message",
            NodeKind::Field(_) => "Field",
            NodeKind::Enum(_) => "Enum",
            NodeKind::EnumValue(_) => "EnumValue",
            NodeKind::Service(_) => "Service",
            NodeKind::Rpc(_) => "RpcMethod",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NamespaceData {
    pub children: Vec<NodeId>,
    pub options: BTreeMap<String, Literal>,
}

#[derive(Debug, Clone)]
pub(crate) struct MessageData {
    pub ns: NamespaceData,
    /// Reserved extension id range, inclusive.
    pub extensions: Option<(u32, u32)>,
    /// Set when this message is a legacy group body; equals the id of the
    /// field that declares the group.
    pub group_id: Option<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnumValueData {
    pub number: i32,
}

/// A symbolic reference that the resolution pass replaces with a handle.
#[derive(Debug, Clone)]
pub(crate) enum TypeBinding {
    Unresolved(String),
    Resolved(NodeId),
}

#[derive(Debug, Clone)]
pub(crate) struct RpcData {
    pub request: TypeBinding,
    pub response: TypeBinding,
    pub options: BTreeMap<String, Literal>,
}

/// The reflection arena.
pub struct Schema {
    nodes: Vec<Node>,
    root: NodeId,
    options: SchemaOptions,
    resolved: bool,
}

impl Schema {
    pub fn new(options: SchemaOptions) -> Self {
        let root = Node {
            parent: None,
            name: String::new(),
            kind: NodeKind::Namespace(NamespaceData::default()),
        };
        Schema {
            nodes: vec![root],
            root: NodeId(0),
            options,
            resolved: false,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The dotted path from the root to `id`. The root itself is the empty
    /// string, so fully-qualified names carry a leading dot: `.Pkg.Person`.
    pub fn fqn(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            parts.push(self.node(current).name.as_str());
            cursor = self.node(current).parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// Like [`Schema::fqn`], prefixed with the node-kind tag.
    pub fn describe(&self, id: NodeId) -> String {
        format!("{} {}", self.node(id).kind.tag(), self.fqn(id))
    }

    pub(crate) fn ns_data(&self, id: NodeId) -> Option<&NamespaceData> {
        match &self.node(id).kind {
            NodeKind::Namespace(ns) | NodeKind::Enum(ns) | NodeKind::Service(ns) => Some(ns),
            NodeKind::Message(m) => Some(&m.ns),
            _ => None,
        }
    }

    fn ns_data_mut(&mut self, id: NodeId) -> Option<&mut NamespaceData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Namespace(ns) | NodeKind::Enum(ns) | NodeKind::Service(ns) => Some(ns),
            NodeKind::Message(m) => Some(&mut m.ns),
            _ => None,
        }
    }

    pub(crate) fn field_data(&self, id: NodeId) -> Option<&FieldData> {
        match &self.node(id).kind {
            NodeKind::Field(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn message_data(&self, id: NodeId) -> Option<&MessageData> {
        match &self.node(id).kind {
            NodeKind::Message(m) => Some(m),
            _ => None,
        }
    }

    /// The children of a namespace-like node, in declaration order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.ns_data(id).map(|ns| ns.children.as_slice()).unwrap_or(&[])
    }

    /// Linear lookup of a direct child by (current) name.
    pub fn child_by_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.node(c).name == name)
    }

    /// Linear lookup of a direct child by number: a field id or an enum
    /// value number.
    pub fn child_by_number(&self, id: NodeId, number: i64) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| {
            match &self.node(c).kind {
                NodeKind::Field(f) => i64::from(f.id) == number,
                NodeKind::EnumValue(v) => i64::from(v.number) == number,
                _ => false,
            }
        })
    }

    /// Options attached to a node (namespace-like nodes, fields, rpcs).
    pub fn options(&self, id: NodeId) -> &BTreeMap<String, Literal> {
        static EMPTY: BTreeMap<String, Literal> = BTreeMap::new();
        match &self.node(id).kind {
            NodeKind::Namespace(ns) | NodeKind::Enum(ns) | NodeKind::Service(ns) => &ns.options,
            NodeKind::Message(m) => &m.ns.options,
            NodeKind::Field(f) => &f.options,
            NodeKind::Rpc(r) => &r.options,
            NodeKind::EnumValue(_) => &EMPTY,
        }
    }

    pub fn set_option(&mut self, id: NodeId, key: impl Into<String>, value: Literal) {
        let key = key.into();
        match &mut self.node_mut(id).kind {
            NodeKind::Namespace(ns) | NodeKind::Enum(ns) | NodeKind::Service(ns) => {
                ns.options.insert(key, value);
            }
            NodeKind::Message(m) => {
                m.ns.options.insert(key, value);
            }
            NodeKind::Field(f) => {
                f.options.insert(key, value);
            }
            NodeKind::Rpc(r) => {
                r.options.insert(key, value);
            }
            NodeKind::EnumValue(_) => {}
        }
    }

    // ---- construction ------------------------------------------------

    fn push_node(&mut self, parent: NodeId, name: String, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: Some(parent),
            name,
            kind,
        });
        id
    }

    /// Register `child` under `parent`, enforcing name uniqueness.
    ///
    /// On collision the camelCase reversion rule applies: any colliding
    /// field whose name was rewritten falls back to its `original_name`.
    /// If names still collide afterwards the insertion fails.
    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, Error> {
        if self.ns_data(parent).is_none() {
            return Err(Error::illegal_value(
                self.fqn(parent),
                "node cannot contain children",
            ));
        }

        let name = self.node(child).name.clone();
        if self.child_by_name(parent, &name).is_some() {
            let mut colliding: Vec<NodeId> = self
                .children(parent)
                .iter()
                .copied()
                .filter(|&c| self.node(c).name == name)
                .collect();
            colliding.push(child);

            let mut reverted = false;
            for id in colliding {
                if let NodeKind::Field(f) = &self.node(id).kind {
                    if f.original_name != self.node(id).name {
                        let original = f.original_name.clone();
                        self.node_mut(id).name = original;
                        reverted = true;
                    }
                }
            }

            let taken = !reverted || self.duplicates_after(parent, child);
            if taken {
                return Err(Error::DuplicateName {
                    name,
                    namespace: self.fqn(parent),
                });
            }
        }

        if let Some(ns) = self.ns_data_mut(parent) {
            ns.children.push(child);
        }
        Ok(child)
    }

    /// Whether any name is shared among `parent`'s children plus `extra`.
    fn duplicates_after(&self, parent: NodeId, extra: NodeId) -> bool {
        let mut names: Vec<&str> = self
            .children(parent)
            .iter()
            .copied()
            .chain(std::iter::once(extra))
            .map(|c| self.node(c).name.as_str())
            .collect();
        names.sort_unstable();
        names.windows(2).any(|w| w[0] == w[1])
    }

    pub fn add_namespace(&mut self, parent: NodeId, name: &str) -> Result<NodeId, Error> {
        let id = self.push_node(
            parent,
            name.to_owned(),
            NodeKind::Namespace(NamespaceData::default()),
        );
        self.attach(parent, id)
    }

    pub fn add_message(&mut self, parent: NodeId, name: &str) -> Result<NodeId, Error> {
        let id = self.push_node(
            parent,
            name.to_owned(),
            NodeKind::Message(MessageData {
                ns: NamespaceData::default(),
                extensions: None,
                group_id: None,
            }),
        );
        self.attach(parent, id)
    }

    /// Add the message body of a legacy group. `group_id` is the id of the
    /// field that declares the group; the matching end-group record on the
    /// wire carries it.
    pub fn add_group(&mut self, parent: NodeId, name: &str, group_id: u32) -> Result<NodeId, Error> {
        let id = self.push_node(
            parent,
            name.to_owned(),
            NodeKind::Message(MessageData {
                ns: NamespaceData::default(),
                extensions: None,
                group_id: Some(group_id),
            }),
        );
        self.attach(parent, id)
    }

    /// Reserve an inclusive extension id range on a message.
    pub fn set_extensions(&mut self, message: NodeId, lo: u32, hi: u32) -> Result<(), Error> {
        match &mut self.node_mut(message).kind {
            NodeKind::Message(m) => {
                m.extensions = Some((lo, hi));
                Ok(())
            }
            _ => Err(Error::illegal_value(
                self.fqn(message),
                "extensions apply to messages only",
            )),
        }
    }

    pub fn add_field(
        &mut self,
        message: NodeId,
        name: &str,
        id: u32,
        label: Label,
        ty: FieldType,
        options: BTreeMap<String, Literal>,
    ) -> Result<NodeId, Error> {
        if self.message_data(message).is_none() {
            return Err(Error::illegal_value(
                self.fqn(message),
                "fields belong to messages",
            ));
        }
        if !(MIN_FIELD_ID..=MAX_FIELD_ID).contains(&id) {
            return Err(Error::illegal_value(
                format!("{}.{name}", self.fqn(message)),
                format!("field id {id} out of range"),
            ));
        }
        if self.child_by_number(message, i64::from(id)).is_some() {
            return Err(Error::illegal_value(
                format!("{}.{name}", self.fqn(message)),
                format!("field id {id} already in use"),
            ));
        }

        let node_name = if self.options.convert_fields_to_camel_case {
            to_camel_case(name)
        } else {
            name.to_owned()
        };
        let packed = matches!(options.get("packed"), Some(Literal::Bool(true)));
        let node = self.push_node(
            message,
            node_name,
            NodeKind::Field(FieldData {
                id,
                label,
                ty,
                original_name: name.to_owned(),
                packed,
                options,
                default_value: None,
            }),
        );
        self.attach(message, node)
    }

    pub fn add_enum(&mut self, parent: NodeId, name: &str) -> Result<NodeId, Error> {
        let id = self.push_node(
            parent,
            name.to_owned(),
            NodeKind::Enum(NamespaceData::default()),
        );
        self.attach(parent, id)
    }

    pub fn add_enum_value(
        &mut self,
        enumeration: NodeId,
        name: &str,
        number: i32,
    ) -> Result<NodeId, Error> {
        if !matches!(self.node(enumeration).kind, NodeKind::Enum(_)) {
            return Err(Error::illegal_value(
                self.fqn(enumeration),
                "enum values belong to enums",
            ));
        }
        let id = self.push_node(
            enumeration,
            name.to_owned(),
            NodeKind::EnumValue(EnumValueData { number }),
        );
        self.attach(enumeration, id)
    }

    pub fn add_service(&mut self, parent: NodeId, name: &str) -> Result<NodeId, Error> {
        let id = self.push_node(
            parent,
            name.to_owned(),
            NodeKind::Service(NamespaceData::default()),
        );
        self.attach(parent, id)
    }

    pub fn add_rpc(
        &mut self,
        service: NodeId,
        name: &str,
        request: &str,
        response: &str,
    ) -> Result<NodeId, Error> {
        if !matches!(self.node(service).kind, NodeKind::Service(_)) {
            return Err(Error::illegal_value(
                self.fqn(service),
                "rpc methods belong to services",
            ));
        }
        let id = self.push_node(
            service,
            name.to_owned(),
            NodeKind::Rpc(RpcData {
                request: TypeBinding::Unresolved(request.to_owned()),
                response: TypeBinding::Unresolved(response.to_owned()),
                options: BTreeMap::new(),
            }),
        );
        self.attach(service, id)
    }

    // ---- resolution --------------------------------------------------

    /// Resolve a symbolic, possibly dotted reference from `from`.
    ///
    /// A leading dot makes the reference absolute (descend from the root).
    /// Otherwise descent is attempted from `from` itself and then, on
    /// failure, retried from each ancestor in turn (lexical fallback).
    /// Returns `None` when the root is reached without a match.
    pub fn resolve(&self, from: NodeId, qn: &str, exclude_fields: bool) -> Option<NodeId> {
        let segments: Vec<&str> = qn.split('.').collect();
        let (start, segments) = match segments.split_first() {
            Some((&"", rest)) => (self.root, rest),
            _ => (from, &segments[..]),
        };
        if segments.is_empty() {
            return None;
        }

        let mut scope = Some(start);
        while let Some(s) = scope {
            if let Some(found) = self.descend(s, segments, exclude_fields) {
                return Some(found);
            }
            scope = self.node(s).parent;
        }
        None
    }

    fn descend(&self, from: NodeId, segments: &[&str], exclude_fields: bool) -> Option<NodeId> {
        let mut cursor = from;
        for &segment in segments {
            let next = self.child_by_name(cursor, segment)?;
            if exclude_fields && matches!(self.node(next).kind, NodeKind::Field(_)) {
                return None;
            }
            cursor = next;
        }
        Some(cursor)
    }

    /// The resolution pass: bind every field's symbolic type reference and
    /// every rpc's request/response name, validate field ids against the
    /// extension ranges and `packed` against packability, verify `default`
    /// options, and freeze the tree.
    pub fn resolve_types(mut self) -> Result<Arc<Self>, Error> {
        let ids: Vec<NodeId> = (0..self.nodes.len() as u32).map(NodeId).collect();

        // Bind symbolic references.
        for &id in &ids {
            let pending_field = match &self.node(id).kind {
                NodeKind::Field(f) => match &f.ty {
                    FieldType::Unresolved { name, group } => Some((name.clone(), *group)),
                    _ => None,
                },
                _ => None,
            };
            if let Some((name, group)) = pending_field {
                let Some(message) = self.node(id).parent else { continue };
                let bound = self.bind_field_type(id, message, &name, group)?;
                if let NodeKind::Field(f) = &mut self.node_mut(id).kind {
                    f.ty = bound;
                }
                trace!(field = %self.fqn(id), reference = %name, "bound field type");
                continue;
            }

            let pending_rpc = match &self.node(id).kind {
                NodeKind::Rpc(r) => Some(
                    [(true, &r.request), (false, &r.response)]
                        .into_iter()
                        .filter_map(|(is_req, binding)| match binding {
                            TypeBinding::Unresolved(n) => Some((is_req, n.clone())),
                            TypeBinding::Resolved(_) => None,
                        })
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            };
            if let Some(pending) = pending_rpc {
                for (is_request, name) in pending {
                    let Some(service) = self.node(id).parent else { continue };
                    let target = self
                        .resolve(service, &name, true)
                        .filter(|&t| matches!(self.node(t).kind, NodeKind::Message(_)))
                        .ok_or_else(|| Error::NameResolution {
                            reference: name.clone(),
                            context: self.fqn(id),
                        })?;
                    if let NodeKind::Rpc(r) = &mut self.node_mut(id).kind {
                        if is_request {
                            r.request = TypeBinding::Resolved(target);
                        } else {
                            r.response = TypeBinding::Resolved(target);
                        }
                    }
                }
            }
        }

        // Validate fields now that types are concrete.
        for &id in &ids {
            let Some(f) = self.field_data(id) else { continue };
            let Some(message) = self.node(id).parent else { continue };

            if let Some((lo, hi)) = self.message_data(message).and_then(|m| m.extensions) {
                if (lo..=hi).contains(&f.id) {
                    return Err(Error::illegal_value(
                        self.fqn(id),
                        format!("field id {} lies inside the extension range", f.id),
                    ));
                }
            }

            if f.packed {
                let packable = match &f.ty {
                    FieldType::Scalar(kind) => kind.is_packable(),
                    FieldType::Enum(_) => true,
                    _ => false,
                };
                if !packable || f.label != Label::Repeated {
                    return Err(Error::illegal_value(
                        self.fqn(id),
                        "[packed=true] requires a repeated packable field",
                    ));
                }
            }
        }

        // Verify `default` options through the same rules as user writes.
        let mut defaults: Vec<(NodeId, Value)> = Vec::new();
        for &id in &ids {
            let Some(f) = self.field_data(id) else { continue };
            let Some(literal) = f.options.get("default") else { continue };
            if f.label == Label::Repeated {
                return Err(Error::illegal_value(
                    self.fqn(id),
                    "repeated fields cannot carry a default",
                ));
            }
            let raw = match literal {
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(n) => Value::I64(*n),
                Literal::Float(x) => Value::F64(*x),
                Literal::Str(s) => Value::Str(s.clone()),
            };
            let verified = crate::value::verify_value(&self, id, raw, false)?;
            defaults.push((id, verified));
        }
        for (id, value) in defaults {
            if let NodeKind::Field(f) = &mut self.node_mut(id).kind {
                f.default_value = Some(value);
            }
        }

        self.resolved = true;
        debug!(nodes = self.nodes.len(), "schema types resolved");
        Ok(Arc::new(self))
    }

    fn bind_field_type(
        &self,
        field: NodeId,
        message: NodeId,
        reference: &str,
        group: bool,
    ) -> Result<FieldType, Error> {
        let unresolved = || Error::NameResolution {
            reference: reference.to_owned(),
            context: self.fqn(field),
        };
        let target = self.resolve(message, reference, true).ok_or_else(unresolved)?;
        match (&self.node(target).kind, group) {
            (NodeKind::Message(m), true) => {
                let field_id = self.field_data(field).map(|f| f.id);
                if m.group_id.is_some() && m.group_id == field_id {
                    Ok(FieldType::Group(target))
                } else {
                    Err(unresolved())
                }
            }
            (NodeKind::Message(_), false) => Ok(FieldType::Message(target)),
            (NodeKind::Enum(_), false) => Ok(FieldType::Enum(target)),
            _ => Err(unresolved()),
        }
    }

    // ---- frozen-schema lookups ---------------------------------------

    fn lookup(self: &Arc<Self>, path: &str) -> Result<NodeId, Error> {
        self.resolve(self.root, path, true)
            .ok_or_else(|| Error::NameResolution {
                reference: path.to_owned(),
                context: String::from("."),
            })
    }

    /// Look up a message type by (possibly dotted) path from the root.
    pub fn message(self: &Arc<Self>, path: &str) -> Result<MessageRef, Error> {
        let id = self.lookup(path)?;
        if self.message_data(id).is_some() {
            Ok(MessageRef::new(Arc::clone(self), id))
        } else {
            Err(Error::NameResolution {
                reference: path.to_owned(),
                context: String::from("."),
            })
        }
    }

    /// Look up an enum type by path from the root.
    pub fn enumeration(self: &Arc<Self>, path: &str) -> Result<EnumRef, Error> {
        let id = self.lookup(path)?;
        if matches!(self.node(id).kind, NodeKind::Enum(_)) {
            Ok(EnumRef::new(Arc::clone(self), id))
        } else {
            Err(Error::NameResolution {
                reference: path.to_owned(),
                context: String::from("."),
            })
        }
    }

    /// Look up a service by path from the root.
    pub fn service(self: &Arc<Self>, path: &str) -> Result<ServiceRef, Error> {
        let id = self.lookup(path)?;
        if matches!(self.node(id).kind, NodeKind::Service(_)) {
            Ok(ServiceRef::new(Arc::clone(self), id))
        } else {
            Err(Error::NameResolution {
                reference: path.to_owned(),
                context: String::from("."),
            })
        }
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("nodes", &self.nodes.len())
            .field("resolved", &self.resolved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(kind: ScalarKind) -> FieldType {
        FieldType::Scalar(kind)
    }

    #[test]
    fn test_fqn_and_describe() {
        let mut schema = Schema::new(SchemaOptions::default());
        let pkg = schema.add_namespace(schema.root(), "pkg").unwrap();
        let msg = schema.add_message(pkg, "Person").unwrap();
        assert_eq!(schema.fqn(msg), ".pkg.Person");
        assert_eq!(schema.describe(msg), "Message .pkg.Person");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut schema = Schema::new(SchemaOptions::default());
        schema.add_message(schema.root(), "A").unwrap();
        assert!(matches!(
            schema.add_message(schema.root(), "A"),
            Err(Error::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_camel_case_collision_reverts() {
        let mut schema = Schema::new(SchemaOptions {
            convert_fields_to_camel_case: true,
        });
        let msg = schema.add_message(schema.root(), "M").unwrap();
        schema
            .add_field(
                msg,
                "some_field",
                1,
                Label::Optional,
                scalar(ScalarKind::Int32),
                BTreeMap::new(),
            )
            .unwrap();
        // "someField" collides with the rewritten "some_field".
        schema
            .add_field(
                msg,
                "someField",
                2,
                Label::Optional,
                scalar(ScalarKind::Int32),
                BTreeMap::new(),
            )
            .unwrap();

        // The rewritten field reverted to its source spelling, leaving the
        // literal "someField" for the second field.
        assert!(schema.child_by_name(msg, "some_field").is_some());
        assert!(schema.child_by_name(msg, "someField").is_some());
    }

    #[test]
    fn test_identical_original_names_still_collide() {
        let mut schema = Schema::new(SchemaOptions {
            convert_fields_to_camel_case: true,
        });
        let msg = schema.add_message(schema.root(), "M").unwrap();
        schema
            .add_field(
                msg,
                "dup_name",
                1,
                Label::Optional,
                scalar(ScalarKind::Int32),
                BTreeMap::new(),
            )
            .unwrap();
        assert!(matches!(
            schema.add_field(
                msg,
                "dup_name",
                2,
                Label::Optional,
                scalar(ScalarKind::Int32),
                BTreeMap::new(),
            ),
            Err(Error::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_id_rejected() {
        let mut schema = Schema::new(SchemaOptions::default());
        let msg = schema.add_message(schema.root(), "M").unwrap();
        schema
            .add_field(
                msg,
                "a",
                1,
                Label::Optional,
                scalar(ScalarKind::Int32),
                BTreeMap::new(),
            )
            .unwrap();
        assert!(schema
            .add_field(
                msg,
                "b",
                1,
                Label::Optional,
                scalar(ScalarKind::Int32),
                BTreeMap::new(),
            )
            .is_err());
    }

    #[test]
    fn test_resolve_lexical_fallback() {
        let mut schema = Schema::new(SchemaOptions::default());
        let outer = schema.add_namespace(schema.root(), "outer").unwrap();
        let target = schema.add_message(outer, "Target").unwrap();
        let inner = schema.add_namespace(outer, "inner").unwrap();
        let msg = schema.add_message(inner, "M").unwrap();

        // "Target" is not under M or inner; found in the outer namespace.
        assert_eq!(schema.resolve(msg, "Target", true), Some(target));
        // Absolute reference.
        assert_eq!(schema.resolve(msg, ".outer.Target", true), Some(target));
        // Unknown names resolve to nothing.
        assert_eq!(schema.resolve(msg, "Missing", true), None);
    }

    #[test]
    fn test_resolve_skips_fields_when_asked() {
        let mut schema = Schema::new(SchemaOptions::default());
        let msg = schema.add_message(schema.root(), "M").unwrap();
        schema
            .add_field(
                msg,
                "Shadow",
                1,
                Label::Optional,
                scalar(ScalarKind::Int32),
                BTreeMap::new(),
            )
            .unwrap();
        let shadow = schema.add_message(schema.root(), "Shadow").unwrap();

        // Excluding fields falls through to the sibling message.
        assert_eq!(schema.resolve(msg, "Shadow", true), Some(shadow));
        // Without the exclusion the field wins in the nearer scope.
        let field = schema.child_by_name(msg, "Shadow").unwrap();
        assert_eq!(schema.resolve(msg, "Shadow", false), Some(field));
    }

    #[test]
    fn test_resolution_binds_and_rejects() {
        let mut schema = Schema::new(SchemaOptions::default());
        let msg = schema.add_message(schema.root(), "Outer").unwrap();
        schema.add_enum(msg, "Kind").unwrap();
        schema
            .add_field(
                msg,
                "kind",
                1,
                Label::Optional,
                FieldType::named("Kind"),
                BTreeMap::new(),
            )
            .unwrap();
        let schema = schema.resolve_types().unwrap();
        let outer = schema.message("Outer").unwrap();
        let field = outer.field_by_name("kind").unwrap();
        assert!(matches!(field.field_type(), FieldType::Enum(_)));
    }

    #[test]
    fn test_resolution_failure() {
        let mut schema = Schema::new(SchemaOptions::default());
        let msg = schema.add_message(schema.root(), "M").unwrap();
        schema
            .add_field(
                msg,
                "x",
                1,
                Label::Optional,
                FieldType::named("NoSuchType"),
                BTreeMap::new(),
            )
            .unwrap();
        assert!(matches!(
            schema.resolve_types(),
            Err(Error::NameResolution { .. })
        ));
    }

    #[test]
    fn test_extension_range_enforced() {
        let mut schema = Schema::new(SchemaOptions::default());
        let msg = schema.add_message(schema.root(), "M").unwrap();
        schema.set_extensions(msg, 100, 200).unwrap();
        schema
            .add_field(
                msg,
                "x",
                150,
                Label::Optional,
                scalar(ScalarKind::Int32),
                BTreeMap::new(),
            )
            .unwrap();
        assert!(schema.resolve_types().is_err());
    }

    #[test]
    fn test_packed_requires_packable() {
        let mut schema = Schema::new(SchemaOptions::default());
        let msg = schema.add_message(schema.root(), "M").unwrap();
        let mut options = BTreeMap::new();
        options.insert("packed".to_owned(), Literal::Bool(true));
        schema
            .add_field(
                msg,
                "names",
                1,
                Label::Repeated,
                scalar(ScalarKind::String),
                options,
            )
            .unwrap();
        assert!(schema.resolve_types().is_err());
    }
}
