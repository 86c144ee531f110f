//! Required-field enforcement with best-effort progress attached.

use std::collections::BTreeMap;
use std::sync::Arc;

use hex_literal::hex;
use protoflex::{Error, FieldType, Label, ScalarKind, Schema, SchemaOptions, Value};

/// `message Person { required string name=1; optional int32 age=2; }`
fn person_schema() -> Arc<Schema> {
    let mut schema = Schema::new(SchemaOptions::default());
    let person = schema.add_message(schema.root(), "Person").unwrap();
    schema
        .add_field(
            person,
            "name",
            1,
            Label::Required,
            FieldType::Scalar(ScalarKind::String),
            BTreeMap::new(),
        )
        .unwrap();
    schema
        .add_field(
            person,
            "age",
            2,
            Label::Optional,
            FieldType::Scalar(ScalarKind::Int32),
            BTreeMap::new(),
        )
        .unwrap();
    schema.resolve_types().unwrap()
}

#[test]
fn test_encode_missing_required_attaches_partial_buffer() {
    let schema = person_schema();
    let person = schema.message("Person").unwrap();
    let value = person.from_pairs([("age", Value::from(30))]).unwrap();

    let err = value.encode_to_vec().unwrap_err();
    let Error::RequiredFieldMissing { missing, encoded, decoded } = &err else {
        panic!("expected required-field error, got {err:?}");
    };
    assert_eq!(missing, &["name"]);
    assert!(decoded.is_none());
    // Best effort: the age field was still encoded.
    assert_eq!(encoded.as_deref(), Some(&hex!("10 1e")[..]));
}

#[test]
fn test_decode_missing_required_attaches_partial_value() {
    let schema = person_schema();
    let person = schema.message("Person").unwrap();

    // Only the age field on the wire.
    let err = person.decode(&hex!("10 1e")).unwrap_err();
    let Some(partial) = err.decoded() else {
        panic!("expected partial decoded value, got {err:?}");
    };
    assert_eq!(
        partial.get("age").unwrap().as_single(),
        Some(&Value::I32(30))
    );
    assert!(partial.get("name").unwrap().is_absent());
}

#[test]
fn test_required_present_roundtrips() {
    let schema = person_schema();
    let person = schema.message("Person").unwrap();
    let value = person.from_pairs([("name", Value::from("A"))]).unwrap();
    let decoded = person.decode(&value.encode_to_vec().unwrap()).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn test_required_cannot_be_cleared() {
    let schema = person_schema();
    let person = schema.message("Person").unwrap();
    let mut value = person.from_pairs([("name", Value::from("A"))]).unwrap();

    value.clear("age").unwrap();
    assert!(matches!(
        value.clear("name"),
        Err(Error::IllegalValue { .. })
    ));
}

#[test]
fn test_nested_missing_required_propagates() {
    let mut schema = Schema::new(SchemaOptions::default());
    let inner = schema.add_message(schema.root(), "Inner").unwrap();
    schema
        .add_field(
            inner,
            "x",
            1,
            Label::Required,
            FieldType::Scalar(ScalarKind::Int32),
            BTreeMap::new(),
        )
        .unwrap();
    let outer = schema.add_message(schema.root(), "Outer").unwrap();
    schema
        .add_field(
            outer,
            "inner",
            1,
            Label::Optional,
            FieldType::named("Inner"),
            BTreeMap::new(),
        )
        .unwrap();
    let schema = schema.resolve_types().unwrap();

    let inner_type = schema.message("Inner").unwrap();
    let outer_type = schema.message("Outer").unwrap();
    let value = outer_type
        .from_pairs([("inner", Value::from(inner_type.empty()))])
        .unwrap();

    assert!(matches!(
        value.encode_to_vec(),
        Err(Error::RequiredFieldMissing { .. })
    ));
}

#[test]
fn test_default_satisfies_required_on_encode() {
    let mut schema = Schema::new(SchemaOptions::default());
    let msg = schema.add_message(schema.root(), "M").unwrap();
    let mut options = BTreeMap::new();
    options.insert("default".to_owned(), protoflex::Literal::Int(9));
    schema
        .add_field(
            msg,
            "x",
            1,
            Label::Required,
            FieldType::Scalar(ScalarKind::Int32),
            options,
        )
        .unwrap();
    let schema = schema.resolve_types().unwrap();
    let msg = schema.message("M").unwrap();

    // The default is applied at construction, so the slot is present.
    let value = msg.empty();
    assert_eq!(value.encode_to_vec().unwrap(), hex!("08 09"));
}
