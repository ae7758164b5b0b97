//! Integration tests: decode/encode, validation, errors, schema resolution,
//! streams, and the schema JSON form.

use bytespec::{
    decode_records, AssertValue, Assertion, Codec, CodecError, Count, EnumDef, FieldDef,
    FieldKind, Len, Primitive, ResolvedSchema, Schema, SchemaError, StructDef, Termination, Value,
};
use std::collections::HashMap;

/// Header with a magic signature, a version floor, positive dimensions, and
/// a small flags range: 4 + 2 + 4 + 4 + 1 = 15 bytes.
fn header_schema() -> ResolvedSchema {
    let schema = Schema {
        structs: vec![StructDef {
            name: "Header".to_string(),
            fields: vec![
                FieldDef::new("magic", FieldKind::Bytes(Len::Fixed(4))).with(Assertion::Equals(
                    AssertValue::Bytes(vec![0x89, 0x50, 0x4E, 0x47]),
                )),
                FieldDef::new("version", FieldKind::U16).with(Assertion::GreaterOrEqual(1)),
                FieldDef::new("width", FieldKind::U32).with(Assertion::GreaterThan(0)),
                FieldDef::new("height", FieldKind::U32).with(Assertion::GreaterThan(0)),
                FieldDef::new("flags", FieldKind::U8).with(Assertion::Range { min: 0, max: 7 }),
            ],
        }],
        enums: Vec::new(),
    };
    ResolvedSchema::resolve(schema).expect("resolve")
}

fn valid_header_bytes() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, // magic
        0x00, 0x01, // version = 1
        0x00, 0x00, 0x00, 0x64, // width = 100
        0x00, 0x00, 0x00, 0xC8, // height = 200
        0x03, // flags = 3
    ]
}

fn header_values(version: u64, width: u64, height: u64, flags: u64) -> HashMap<String, Value> {
    let mut values = HashMap::new();
    values.insert(
        "magic".to_string(),
        Value::Bytes(vec![0x89, 0x50, 0x4E, 0x47]),
    );
    values.insert("version".to_string(), Value::U16(version as u16));
    values.insert("width".to_string(), Value::U32(width as u32));
    values.insert("height".to_string(), Value::U32(height as u32));
    values.insert("flags".to_string(), Value::U8(flags as u8));
    values
}

#[test]
fn test_valid_header() {
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);
    let (values, consumed) = codec.read("Header", &valid_header_bytes()).expect("read");
    assert_eq!(consumed, 15);
    assert_eq!(
        values.get("magic").and_then(Value::as_bytes),
        Some(&[0x89u8, 0x50, 0x4E, 0x47][..])
    );
    assert_eq!(values.get("version").and_then(Value::as_u64), Some(1));
    assert_eq!(values.get("width").and_then(Value::as_u64), Some(100));
    assert_eq!(values.get("height").and_then(Value::as_u64), Some(200));
    assert_eq!(values.get("flags").and_then(Value::as_u64), Some(3));
}

#[test]
fn test_invalid_magic() {
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);
    let mut bytes = valid_header_bytes();
    bytes[..4].copy_from_slice(&[0, 0, 0, 0]);
    let err = codec.read("Header", &bytes).expect_err("should fail");
    assert!(matches!(err, CodecError::MagicMismatch { .. }), "{:?}", err);
    assert!(err.to_string().contains("magic"), "{}", err);
}

#[test]
fn test_invalid_version() {
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);
    let mut bytes = valid_header_bytes();
    bytes[4] = 0;
    bytes[5] = 0; // version = 0, must be >= 1
    let err = codec.read("Header", &bytes).expect_err("should fail");
    assert!(matches!(err, CodecError::RangeViolation { .. }), "{:?}", err);
    assert!(err.to_string().contains("version"), "{}", err);
}

#[test]
fn test_flags_boundary() {
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);

    let mut bytes = valid_header_bytes();
    bytes[14] = 7;
    let (values, _) = codec.read("Header", &bytes).expect("flags = 7 is valid");
    assert_eq!(values.get("flags").and_then(Value::as_u64), Some(7));

    bytes[14] = 8;
    let err = codec.read("Header", &bytes).expect_err("flags = 8 is invalid");
    assert!(matches!(err, CodecError::RangeViolation { .. }), "{:?}", err);
    assert!(err.to_string().contains("flags"), "{}", err);
}

#[test]
fn test_truncated_input_names_the_field() {
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);
    // magic + version + width = 10 bytes; height is cut off.
    let bytes = &valid_header_bytes()[..10];
    let err = codec.read("Header", bytes).expect_err("should fail");
    match err {
        CodecError::TruncatedInput {
            ref field,
            needed,
            remaining,
        } => {
            assert_eq!(field, "height");
            assert_eq!(needed, 4);
            assert_eq!(remaining, 0);
        }
        other => panic!("expected TruncatedInput, got {:?}", other),
    }
}

#[test]
fn test_validation_short_circuits() {
    // A bad width must abort before flags (out of range here) is reached.
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);
    let mut bytes = valid_header_bytes();
    bytes[6..10].copy_from_slice(&[0, 0, 0, 0]); // width = 0
    bytes[14] = 200; // flags also bad
    let err = codec.read("Header", &bytes).expect_err("should fail");
    assert!(err.to_string().contains("width"), "{}", err);
}

#[test]
fn test_roundtrip_and_byte_exactness() {
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);
    let values = header_values(2, 1920, 1080, 5);
    let bytes = codec.write("Header", &values).expect("write");
    // All widths are declared: 4 + 2 + 4 + 4 + 1.
    assert_eq!(bytes.len(), 15);
    let (decoded, consumed) = codec.read("Header", &bytes).expect("read");
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, values);
}

#[test]
fn test_write_refuses_assertion_violation() {
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);
    let values = header_values(2, 1920, 1080, 8); // flags out of range
    let err = codec.write("Header", &values).expect_err("should fail");
    assert!(matches!(err, CodecError::RangeViolation { .. }), "{:?}", err);
    assert!(err.to_string().contains("flags"), "{}", err);
}

#[test]
fn test_write_missing_field() {
    let codec = Codec::new(header_schema(), bytespec::Endianness::Big);
    let mut values = header_values(1, 1, 1, 0);
    values.remove("height");
    let err = codec.write("Header", &values).expect_err("should fail");
    assert!(matches!(err, CodecError::MissingField { .. }), "{:?}", err);
    assert!(err.to_string().contains("height"), "{}", err);
}

#[test]
fn test_encode_value_too_wide_for_field() {
    let schema = Schema {
        structs: vec![StructDef {
            name: "Small".to_string(),
            fields: vec![FieldDef::new("byte", FieldKind::U8)],
        }],
        enums: Vec::new(),
    };
    let codec = Codec::new(
        ResolvedSchema::resolve(schema).expect("resolve"),
        bytespec::Endianness::Big,
    );
    let mut values = HashMap::new();
    values.insert("byte".to_string(), Value::U16(300));
    let err = codec.write("Small", &values).expect_err("should fail");
    match err {
        CodecError::RangeViolation { ref field, value, .. } => {
            assert_eq!(field, "byte");
            assert_eq!(value, 300);
        }
        other => panic!("expected RangeViolation, got {:?}", other),
    }
}

#[test]
fn test_signed_fields_roundtrip() {
    let schema = Schema {
        structs: vec![StructDef {
            name: "Deltas".to_string(),
            fields: vec![
                FieldDef::new("dx", FieldKind::I8),
                FieldDef::new("dy", FieldKind::I16),
                FieldDef::new("dz", FieldKind::I32),
            ],
        }],
        enums: Vec::new(),
    };
    let codec = Codec::new(
        ResolvedSchema::resolve(schema).expect("resolve"),
        bytespec::Endianness::Big,
    );
    let mut values = HashMap::new();
    values.insert("dx".to_string(), Value::I8(-1));
    values.insert("dy".to_string(), Value::I16(-1000));
    values.insert("dz".to_string(), Value::I32(-70000));
    let bytes = codec.write("Deltas", &values).expect("write");
    assert_eq!(bytes.len(), 7);
    let (decoded, consumed) = codec.read("Deltas", &bytes).expect("read");
    assert_eq!(consumed, 7);
    assert_eq!(decoded, values);
}

#[test]
fn test_little_endian_layout() {
    let schema = Schema {
        structs: vec![StructDef {
            name: "Word".to_string(),
            fields: vec![FieldDef::new("w", FieldKind::U16)],
        }],
        enums: Vec::new(),
    };
    let resolved = ResolvedSchema::resolve(schema).expect("resolve");
    let mut values = HashMap::new();
    values.insert("w".to_string(), Value::U16(0x0102));

    let big = Codec::new(resolved.clone(), bytespec::Endianness::Big);
    assert_eq!(big.write("Word", &values).expect("write"), vec![0x01, 0x02]);

    let little = Codec::new(resolved, bytespec::Endianness::Little);
    assert_eq!(
        little.write("Word", &values).expect("write"),
        vec![0x02, 0x01]
    );
}

#[test]
fn test_unknown_enum_value() {
    let schema = Schema {
        structs: vec![StructDef {
            name: "Message".to_string(),
            fields: vec![FieldDef::new("status", FieldKind::Enum("Status".to_string()))],
        }],
        enums: vec![EnumDef::new("Status", Primitive::U8)
            .variant("OK", 1)
            .variant("ERROR", 2)],
    };
    let codec = Codec::new(
        ResolvedSchema::resolve(schema).expect("resolve"),
        bytespec::Endianness::Big,
    );
    let err = codec.read("Message", &[9]).expect_err("should fail");
    match err {
        CodecError::UnknownEnumValue { ref field, value } => {
            assert_eq!(field, "status");
            assert_eq!(value, 9);
        }
        other => panic!("expected UnknownEnumValue, got {:?}", other),
    }

    let mut values = HashMap::new();
    values.insert("status".to_string(), Value::Tag("MAYBE".to_string()));
    let err = codec.write("Message", &values).expect_err("should fail");
    assert!(matches!(err, CodecError::UnknownEnumTag { .. }), "{:?}", err);
    assert!(err.to_string().contains("MAYBE"), "{}", err);
}

#[test]
fn test_type_handle_roundtrip() {
    let resolved = header_schema();
    let codec = Codec::new(resolved, bytespec::Endianness::Big);
    let header = codec.handle("Header").expect("handle");
    let values = header_values(1, 640, 480, 0);
    let bytes = header.write(&values).expect("write");
    let (decoded, consumed) = header.read(&bytes).expect("read");
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, values);

    assert!(matches!(
        codec.handle("Nope"),
        Err(CodecError::UnknownStruct(_))
    ));
}

#[test]
fn test_decode_records_stream() {
    let schema = Schema {
        structs: vec![StructDef {
            name: "Pair".to_string(),
            fields: vec![
                FieldDef::new("a", FieldKind::U8),
                FieldDef::new("b", FieldKind::U16),
            ],
        }],
        enums: Vec::new(),
    };
    let codec = Codec::new(
        ResolvedSchema::resolve(schema).expect("resolve"),
        bytespec::Endianness::Big,
    );
    let bytes = [1, 0, 10, 2, 0, 20, 3, 0, 30];
    let records = decode_records(&codec, "Pair", &bytes).expect("stream");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].byte_range, (0, 3));
    assert_eq!(records[1].byte_range, (3, 6));
    assert_eq!(records[2].byte_range, (6, 9));
    assert_eq!(records[2].values.get("b").and_then(Value::as_u64), Some(30));

    // A trailing partial record fails the whole stream with its offset.
    let err = decode_records(&codec, "Pair", &bytes[..8]).expect_err("should fail");
    assert_eq!(err.index, 2);
    assert_eq!(err.offset, 6);
    assert!(matches!(err.source, CodecError::TruncatedInput { .. }));
}

#[test]
fn test_resolve_rejects_misplaced_open_array() {
    let schema = Schema {
        structs: vec![StructDef {
            name: "Bad".to_string(),
            fields: vec![
                FieldDef::new(
                    "entries",
                    FieldKind::Array {
                        elem: Box::new(FieldKind::U8),
                        terminate: Termination::End,
                    },
                ),
                FieldDef::new("trailer", FieldKind::U8),
            ],
        }],
        enums: Vec::new(),
    };
    let err = ResolvedSchema::resolve(schema).expect_err("should fail");
    assert!(matches!(err, SchemaError::Invalid(_)), "{:?}", err);
}

#[test]
fn test_resolve_rejects_duplicate_struct() {
    let def = StructDef {
        name: "Twin".to_string(),
        fields: vec![FieldDef::new("x", FieldKind::U8)],
    };
    let schema = Schema {
        structs: vec![def.clone(), def],
        enums: Vec::new(),
    };
    assert!(matches!(
        ResolvedSchema::resolve(schema),
        Err(SchemaError::DuplicateStruct(_))
    ));
}

#[test]
fn test_count_from_earlier_field() {
    let schema = Schema {
        structs: vec![StructDef {
            name: "Packet".to_string(),
            fields: vec![
                FieldDef::new("n", FieldKind::U8),
                FieldDef::new(
                    "items",
                    FieldKind::Array {
                        elem: Box::new(FieldKind::U16),
                        terminate: Termination::Count(Count::Field("n".to_string())),
                    },
                ),
            ],
        }],
        enums: Vec::new(),
    };
    let codec = Codec::new(
        ResolvedSchema::resolve(schema).expect("resolve"),
        bytespec::Endianness::Big,
    );
    let bytes = [2, 0x01, 0x00, 0x02, 0x00];
    let (values, consumed) = codec.read("Packet", &bytes).expect("read");
    assert_eq!(consumed, 5);
    let items = values.get("items").and_then(Value::as_list).expect("items");
    assert_eq!(items, &[Value::U16(0x0100), Value::U16(0x0200)][..]);

    // Count says three but only two fit.
    let err = codec.read("Packet", &[3, 0, 1, 0, 2]).expect_err("should fail");
    assert!(matches!(err, CodecError::TruncatedInput { .. }), "{:?}", err);
    assert!(err.to_string().contains("items"), "{}", err);
}

#[test]
fn test_schema_json_file_roundtrip() {
    let resolved = header_schema();
    let json = serde_json::to_string_pretty(&resolved.schema).expect("serialize");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("header.json");
    std::fs::write(&path, &json).expect("write schema");

    let src = std::fs::read_to_string(&path).expect("read schema");
    let schema: Schema = serde_json::from_str(&src).expect("parse schema");
    let codec = Codec::new(
        ResolvedSchema::resolve(schema).expect("resolve"),
        bytespec::Endianness::Big,
    );
    let (values, consumed) = codec.read("Header", &valid_header_bytes()).expect("read");
    assert_eq!(consumed, 15);
    assert_eq!(values.get("flags").and_then(Value::as_u64), Some(3));
}
