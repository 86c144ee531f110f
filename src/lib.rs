//! Runtime Protocol Buffers reflection with proto2 wire-format encoding and
//! decoding.
//!
//! A schema (normally produced by a `.proto` parser) is built into a
//! [`Schema`] reflection tree, resolved, and frozen; every message type in
//! it then acts as a factory for [`DynamicMessage`] values that encode to
//! and decode from the Google Protocol Buffers wire format, including
//! packed repeated fields, zig-zag integers, required-field enforcement,
//! unknown-field skipping, and legacy groups.
//!
//! ```
//! use protoflex::{FieldType, Label, ScalarKind, Schema, SchemaOptions, Value};
//! use std::collections::BTreeMap;
//!
//! let mut schema = Schema::new(SchemaOptions::default());
//! let root = schema.root();
//! let person = schema.add_message(root, "Person").unwrap();
//! schema
//!     .add_field(person, "name", 1, Label::Required,
//!                FieldType::Scalar(ScalarKind::String), BTreeMap::new())
//!     .unwrap();
//! schema
//!     .add_field(person, "age", 2, Label::Optional,
//!                FieldType::Scalar(ScalarKind::Int32), BTreeMap::new())
//!     .unwrap();
//! let schema = schema.resolve_types().unwrap();
//!
//! let person = schema.message("Person").unwrap();
//! let value = person
//!     .from_pairs([("name", Value::from("A")), ("age", Value::from(30))])
//!     .unwrap();
//! let encoded = value.encode_to_vec().unwrap();
//! assert_eq!(person.decode(&encoded).unwrap(), value);
//! ```

pub mod error;
pub mod leb128;
pub mod runtime;
pub mod schema;
pub mod service;
pub mod value;
pub mod wire;

mod codec;
mod util;

pub use error::{Error, WireError};
pub use runtime::{DynamicMessage, FieldValue};
pub use schema::{
    EnumRef, EnumValueRef, FieldRef, FieldType, Label, Literal, MessageRef, NodeId, RpcRef,
    ScalarKind, Schema, SchemaOptions, ServiceRef,
};
pub use service::Dispatcher;
pub use value::Value;
