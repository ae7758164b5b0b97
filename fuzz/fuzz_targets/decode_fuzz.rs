//! Decode fuzz target: feed arbitrary bytes to Codec::read for a fixed
//! chunked schema. Decode must return Ok or a typed error; it must not panic.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn fuzz_codec() -> &'static bytespec::Codec {
    use bytespec::{
        AssertValue, Codec, Count, Endianness, FieldDef, FieldKind, Len, ResolvedSchema, Schema,
        Sentinel, StructDef, Termination,
    };
    use std::sync::OnceLock;

    static CODEC: OnceLock<Codec> = OnceLock::new();
    CODEC.get_or_init(|| {
        let schema = Schema {
            structs: vec![
                StructDef {
                    name: "Chunk".to_string(),
                    fields: vec![
                        FieldDef::new("length", FieldKind::U16),
                        FieldDef::new("chunk_type", FieldKind::Bytes(Len::Fixed(4))),
                        FieldDef::new("data", FieldKind::Bytes(Len::Field("length".to_string()))),
                    ],
                },
                StructDef {
                    name: "File".to_string(),
                    fields: vec![
                        FieldDef::new("count", FieldKind::U8),
                        FieldDef::new(
                            "counted",
                            FieldKind::Array {
                                elem: Box::new(FieldKind::Struct("Chunk".to_string())),
                                terminate: Termination::Count(Count::Field("count".to_string())),
                            },
                        ),
                        FieldDef::new(
                            "rest",
                            FieldKind::Array {
                                elem: Box::new(FieldKind::Struct("Chunk".to_string())),
                                terminate: Termination::Sentinel(Sentinel {
                                    field: Some("chunk_type".to_string()),
                                    value: AssertValue::Bytes(vec![73, 69, 78, 68]),
                                }),
                            },
                        ),
                    ],
                },
            ],
            enums: Vec::new(),
        };
        Codec::new(
            ResolvedSchema::resolve(schema).expect("resolve"),
            Endianness::Big,
        )
    })
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let _ = fuzz_codec().read("File", data);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
