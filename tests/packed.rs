//! Packed repeated encoding and its equivalence with per-tag encoding.

use std::collections::BTreeMap;
use std::sync::Arc;

use hex_literal::hex;
use protoflex::{FieldType, Label, Literal, ScalarKind, Schema, SchemaOptions, Value};

fn repeated_int32_schema(packed: bool) -> Arc<Schema> {
    let mut schema = Schema::new(SchemaOptions::default());
    let msg = schema.add_message(schema.root(), "M").unwrap();
    let mut options = BTreeMap::new();
    if packed {
        options.insert("packed".to_owned(), Literal::Bool(true));
    }
    schema
        .add_field(
            msg,
            "v",
            1,
            Label::Repeated,
            FieldType::Scalar(ScalarKind::Int32),
            options,
        )
        .unwrap();
    schema.resolve_types().unwrap()
}

fn values() -> Value {
    Value::List(vec![Value::from(1), Value::from(2), Value::from(300)])
}

#[test]
fn test_packed_fixture() {
    let schema = repeated_int32_schema(true);
    let msg = schema.message("M").unwrap();
    let value = msg.from_pairs([("v", values())]).unwrap();
    assert_eq!(value.encode_to_vec().unwrap(), hex!("0a 04 01 02 ac 02"));
}

#[test]
fn test_unpacked_fixture() {
    let schema = repeated_int32_schema(false);
    let msg = schema.message("M").unwrap();
    let value = msg.from_pairs([("v", values())]).unwrap();
    assert_eq!(value.encode_to_vec().unwrap(), hex!("08 01 08 02 08 ac 02"));
}

#[test]
fn test_packed_decodes_as_unpacked_and_back() {
    let packed = repeated_int32_schema(true);
    let unpacked = repeated_int32_schema(false);
    let packed_msg = packed.message("M").unwrap();
    let unpacked_msg = unpacked.message("M").unwrap();

    // Packed bytes read by an unpacked reader.
    let decoded = unpacked_msg.decode(&hex!("0a 04 01 02 ac 02")).unwrap();
    assert_eq!(
        decoded.get("v").unwrap().as_repeated().unwrap(),
        &[Value::I32(1), Value::I32(2), Value::I32(300)]
    );

    // Per-tag bytes read by a packed reader.
    let decoded = packed_msg.decode(&hex!("08 01 08 02 08 ac 02")).unwrap();
    assert_eq!(
        decoded.get("v").unwrap().as_repeated().unwrap(),
        &[Value::I32(1), Value::I32(2), Value::I32(300)]
    );
}

#[test]
fn test_multiple_packed_records_concatenate() {
    let schema = repeated_int32_schema(true);
    let msg = schema.message("M").unwrap();
    // Two packed records for the same field; elements append.
    let decoded = msg.decode(&hex!("0a 02 01 02 0a 01 03")).unwrap();
    assert_eq!(
        decoded.get("v").unwrap().as_repeated().unwrap(),
        &[Value::I32(1), Value::I32(2), Value::I32(3)]
    );
}

#[test]
fn test_empty_repeated_emits_nothing() {
    let schema = repeated_int32_schema(true);
    let msg = schema.message("M").unwrap();
    let value = msg.empty();
    assert!(value.encode_to_vec().unwrap().is_empty());
}

#[test]
fn test_packed_zigzag() {
    let mut schema = Schema::new(SchemaOptions::default());
    let msg = schema.add_message(schema.root(), "M").unwrap();
    let mut options = BTreeMap::new();
    options.insert("packed".to_owned(), Literal::Bool(true));
    schema
        .add_field(
            msg,
            "v",
            1,
            Label::Repeated,
            FieldType::Scalar(ScalarKind::Sint32),
            options,
        )
        .unwrap();
    let schema = schema.resolve_types().unwrap();
    let msg = schema.message("M").unwrap();

    let value = msg
        .from_pairs([(
            "v",
            Value::List(vec![Value::from(0), Value::from(-1), Value::from(1)]),
        )])
        .unwrap();
    // Zig-zag: 0 -> 0, -1 -> 1, 1 -> 2.
    assert_eq!(value.encode_to_vec().unwrap(), hex!("0a 03 00 01 02"));

    let decoded = msg.decode(&hex!("0a 03 00 01 02")).unwrap();
    assert_eq!(
        decoded.get("v").unwrap().as_repeated().unwrap(),
        &[Value::I32(0), Value::I32(-1), Value::I32(1)]
    );
}

#[test]
fn test_packed_enum() {
    let mut schema = Schema::new(SchemaOptions::default());
    let msg = schema.add_message(schema.root(), "M").unwrap();
    let e = schema.add_enum(schema.root(), "E").unwrap();
    schema.add_enum_value(e, "A", 0).unwrap();
    schema.add_enum_value(e, "B", 1).unwrap();
    let mut options = BTreeMap::new();
    options.insert("packed".to_owned(), Literal::Bool(true));
    schema
        .add_field(msg, "v", 1, Label::Repeated, FieldType::named("E"), options)
        .unwrap();
    let schema = schema.resolve_types().unwrap();
    let msg = schema.message("M").unwrap();

    let value = msg
        .from_pairs([(
            "v",
            Value::List(vec![Value::from("A"), Value::from("B"), Value::from("B")]),
        )])
        .unwrap();
    assert_eq!(value.encode_to_vec().unwrap(), hex!("0a 03 00 01 01"));

    let decoded = msg.decode(&hex!("0a 03 00 01 01")).unwrap();
    assert_eq!(
        decoded.get("v").unwrap().as_repeated().unwrap(),
        &[Value::Enum(0), Value::Enum(1), Value::Enum(1)]
    );
}

#[test]
fn test_packed_length_exceeding_buffer() {
    let schema = repeated_int32_schema(true);
    let msg = schema.message("M").unwrap();
    // Length prefix says 9 bytes but only two follow.
    assert!(msg.decode(&hex!("0a 09 01 02")).is_err());
}
