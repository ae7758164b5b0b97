//! Encode/decode binary structs from resolved definitions.
//!
//! Handles fixed-width integers (with configurable byte order), byte
//! sequences, enums, nested structs, and arrays under the three termination
//! policies, with per-field validation on both decode and encode.

use crate::def::{
    AssertValue, Assertion, Count, FieldKind, Len, Primitive, ResolvedSchema, StructDef,
    Termination,
};
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Endianness {
    Big,
    Little,
}

#[derive(Debug)]
pub struct Codec {
    pub endianness: Endianness,
    resolved: ResolvedSchema,
}

/// Decode/encode failures. Every message embeds the declared name of the
/// offending field verbatim, so callers can match on it.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("field {field}: need {needed} byte(s), {remaining} remaining")]
    TruncatedInput {
        field: String,
        needed: usize,
        remaining: usize,
    },
    #[error("field {field}: value {value} fails bound {bound}")]
    RangeViolation {
        field: String,
        value: i64,
        bound: String,
    },
    #[error("field {field}: expected {expected}, found {actual}")]
    MagicMismatch {
        field: String,
        expected: String,
        actual: String,
    },
    #[error("field {field}: value {value} has no enum mapping")]
    UnknownEnumValue { field: String, value: i64 },
    #[error("field {field}: unknown enum tag {tag}")]
    UnknownEnumTag { field: String, tag: String },
    #[error("field {field}: input exhausted before the array terminated")]
    ArrayTerminationFailure { field: String },
    #[error("unknown struct: {0}")]
    UnknownStruct(String),
    #[error("unknown enum: {0}")]
    UnknownEnum(String),
    #[error("field {field}: unresolved count/length reference {referenced}")]
    UnknownField { field: String, referenced: String },
    #[error("field {field}: missing from value")]
    MissingField { field: String },
    #[error("field {field}: expected {expected} byte(s), found {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("field {field}: expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
}

impl Codec {
    pub fn new(resolved: ResolvedSchema, endianness: Endianness) -> Self {
        Codec {
            endianness,
            resolved,
        }
    }

    pub fn resolved(&self) -> &ResolvedSchema {
        &self.resolved
    }

    /// Decode a single struct by name. Returns the field values and the
    /// exact number of bytes consumed from the start of `bytes`.
    pub fn read(
        &self,
        struct_name: &str,
        bytes: &[u8],
    ) -> Result<(HashMap<String, Value>, usize), CodecError> {
        let def = self
            .resolved
            .get_struct(struct_name)
            .ok_or_else(|| CodecError::UnknownStruct(struct_name.to_string()))?;
        let mut cursor = Cursor::new(bytes);
        let values = self.decode_fields(&mut cursor, def)?;
        Ok((values, cursor.position() as usize))
    }

    /// Encode a single struct by name. Every declared field must be present
    /// and satisfy its assertions; nothing is defaulted.
    pub fn write(
        &self,
        struct_name: &str,
        values: &HashMap<String, Value>,
    ) -> Result<Vec<u8>, CodecError> {
        let def = self
            .resolved
            .get_struct(struct_name)
            .ok_or_else(|| CodecError::UnknownStruct(struct_name.to_string()))?;
        let mut out = Vec::new();
        self.encode_fields(&mut out, def, values)?;
        Ok(out)
    }

    /// A view binding this codec to one struct definition, mirroring the
    /// read/write surface of a generated type.
    pub fn handle<'a>(&'a self, struct_name: &'a str) -> Result<TypeHandle<'a>, CodecError> {
        if self.resolved.get_struct(struct_name).is_none() {
            return Err(CodecError::UnknownStruct(struct_name.to_string()));
        }
        Ok(TypeHandle {
            codec: self,
            name: struct_name,
        })
    }

    fn decode_fields(
        &self,
        r: &mut Cursor<&[u8]>,
        def: &StructDef,
    ) -> Result<HashMap<String, Value>, CodecError> {
        let mut out = HashMap::new();
        for f in &def.fields {
            // Validation runs before the next field is attempted, so the
            // first failing field aborts the whole struct.
            let v = self.decode_kind(r, &f.name, &f.kind, &out)?;
            validate(&f.name, &v, &f.assertions)?;
            out.insert(f.name.clone(), v);
        }
        Ok(out)
    }

    fn decode_kind(
        &self,
        r: &mut Cursor<&[u8]>,
        field: &str,
        kind: &FieldKind,
        ctx: &HashMap<String, Value>,
    ) -> Result<Value, CodecError> {
        if let Some(p) = kind.primitive() {
            return self.decode_prim(r, p, field);
        }
        match kind {
            FieldKind::Bytes(len) => self.decode_bytes(r, field, len, ctx),
            FieldKind::Enum(name) => {
                let def = self
                    .resolved
                    .get_enum(name)
                    .ok_or_else(|| CodecError::UnknownEnum(name.clone()))?;
                let raw = take(r, def.underlying.size_in_bytes(), field)?;
                let n = self.read_raw_int(raw, def.underlying);
                let tag = def
                    .tag_for(n)
                    .ok_or_else(|| CodecError::UnknownEnumValue {
                        field: field.to_string(),
                        value: n,
                    })?;
                Ok(Value::Tag(tag.to_string()))
            }
            FieldKind::Struct(name) => {
                let def = self
                    .resolved
                    .get_struct(name)
                    .ok_or_else(|| CodecError::UnknownStruct(name.clone()))?;
                Ok(Value::Struct(self.decode_fields(r, def)?))
            }
            FieldKind::Array { elem, terminate } => {
                self.decode_array(r, field, elem, terminate, ctx)
            }
            // Scalar kinds are handled by decode_prim above.
            _ => unreachable!(),
        }
    }

    fn decode_bytes(
        &self,
        r: &mut Cursor<&[u8]>,
        field: &str,
        len: &Len,
        ctx: &HashMap<String, Value>,
    ) -> Result<Value, CodecError> {
        match len {
            Len::Fixed(n) => Ok(Value::Bytes(take(r, *n as usize, field)?.to_vec())),
            Len::Field(referenced) => {
                let n = ctx
                    .get(referenced)
                    .and_then(Value::as_u64)
                    .ok_or_else(|| CodecError::UnknownField {
                        field: field.to_string(),
                        referenced: referenced.clone(),
                    })?;
                Ok(Value::Bytes(take(r, n as usize, field)?.to_vec()))
            }
            Len::NulTerminated => {
                let pos = r.position() as usize;
                let buf = *r.get_ref();
                match buf[pos..].iter().position(|&b| b == 0) {
                    Some(i) => {
                        r.set_position((pos + i + 1) as u64);
                        Ok(Value::Bytes(buf[pos..pos + i].to_vec()))
                    }
                    None => Err(CodecError::TruncatedInput {
                        field: field.to_string(),
                        needed: buf.len() - pos + 1,
                        remaining: buf.len() - pos,
                    }),
                }
            }
        }
    }

    fn decode_array(
        &self,
        r: &mut Cursor<&[u8]>,
        field: &str,
        elem: &FieldKind,
        terminate: &Termination,
        ctx: &HashMap<String, Value>,
    ) -> Result<Value, CodecError> {
        let mut list = Vec::new();
        match terminate {
            Termination::Count(count) => {
                let n = match count {
                    Count::Fixed(k) => *k,
                    Count::Field(referenced) => ctx
                        .get(referenced)
                        .and_then(Value::as_u64)
                        .ok_or_else(|| CodecError::UnknownField {
                            field: field.to_string(),
                            referenced: referenced.clone(),
                        })?,
                };
                for _ in 0..n {
                    list.push(self.decode_kind(r, field, elem, ctx)?);
                }
            }
            Termination::End => {
                while remaining(r) > 0 {
                    let before = r.position();
                    list.push(self.decode_kind(r, field, elem, ctx)?);
                    if r.position() == before {
                        // Zero-size element: the buffer can never drain.
                        return Err(CodecError::ArrayTerminationFailure {
                            field: field.to_string(),
                        });
                    }
                }
            }
            Termination::Sentinel(rule) => loop {
                if remaining(r) == 0 {
                    return Err(CodecError::ArrayTerminationFailure {
                        field: field.to_string(),
                    });
                }
                let before = r.position();
                let v = self.decode_kind(r, field, elem, ctx)?;
                let done = rule.matches(&v);
                list.push(v);
                if done {
                    break;
                }
                if r.position() == before {
                    return Err(CodecError::ArrayTerminationFailure {
                        field: field.to_string(),
                    });
                }
            },
        }
        Ok(Value::List(list))
    }

    fn decode_prim(
        &self,
        r: &mut Cursor<&[u8]>,
        p: Primitive,
        field: &str,
    ) -> Result<Value, CodecError> {
        let raw = take(r, p.size_in_bytes(), field)?;
        Ok(match p {
            Primitive::U8 => Value::U8(raw[0]),
            Primitive::U16 => Value::U16(self.read_uint(raw) as u16),
            Primitive::U32 => Value::U32(self.read_uint(raw) as u32),
            Primitive::U64 => Value::U64(self.read_uint(raw)),
            Primitive::I8 => Value::I8(raw[0] as i8),
            Primitive::I16 => Value::I16(self.read_int(raw) as i16),
            Primitive::I32 => Value::I32(self.read_int(raw) as i32),
            Primitive::I64 => Value::I64(self.read_int(raw)),
        })
    }

    fn encode_fields(
        &self,
        w: &mut Vec<u8>,
        def: &StructDef,
        values: &HashMap<String, Value>,
    ) -> Result<(), CodecError> {
        for f in &def.fields {
            let v = values.get(&f.name).ok_or_else(|| CodecError::MissingField {
                field: f.name.clone(),
            })?;
            // A value that fails to validate must also refuse to encode.
            validate(&f.name, v, &f.assertions)?;
            self.encode_kind(w, &f.name, &f.kind, v)?;
        }
        Ok(())
    }

    fn encode_kind(
        &self,
        w: &mut Vec<u8>,
        field: &str,
        kind: &FieldKind,
        v: &Value,
    ) -> Result<(), CodecError> {
        if let Some(p) = kind.primitive() {
            return self.encode_prim(w, p, field, v);
        }
        match kind {
            FieldKind::Bytes(len) => self.encode_bytes(w, field, len, v),
            FieldKind::Enum(name) => {
                let def = self
                    .resolved
                    .get_enum(name)
                    .ok_or_else(|| CodecError::UnknownEnum(name.clone()))?;
                let tag = v.as_tag().ok_or_else(|| CodecError::TypeMismatch {
                    field: field.to_string(),
                    expected: "enum tag",
                })?;
                let n = def.value_of(tag).ok_or_else(|| CodecError::UnknownEnumTag {
                    field: field.to_string(),
                    tag: tag.to_string(),
                })?;
                self.write_raw_int(w, def.underlying, n);
                Ok(())
            }
            FieldKind::Struct(name) => {
                let def = self
                    .resolved
                    .get_struct(name)
                    .ok_or_else(|| CodecError::UnknownStruct(name.clone()))?;
                let m = v.as_struct().ok_or_else(|| CodecError::TypeMismatch {
                    field: field.to_string(),
                    expected: "nested struct value",
                })?;
                self.encode_fields(w, def, m)
            }
            FieldKind::Array { elem, .. } => {
                // An array encodes as the concatenation of its elements.
                // Sibling count/length fields are written independently and
                // must match by schema convention.
                let list = v.as_list().ok_or_else(|| CodecError::TypeMismatch {
                    field: field.to_string(),
                    expected: "list value",
                })?;
                for item in list {
                    self.encode_kind(w, field, elem, item)?;
                }
                Ok(())
            }
            _ => unreachable!(),
        }
    }

    fn encode_bytes(
        &self,
        w: &mut Vec<u8>,
        field: &str,
        len: &Len,
        v: &Value,
    ) -> Result<(), CodecError> {
        let b = v.as_bytes().ok_or_else(|| CodecError::TypeMismatch {
            field: field.to_string(),
            expected: "byte sequence",
        })?;
        match len {
            Len::Fixed(n) => {
                if b.len() != *n as usize {
                    return Err(CodecError::LengthMismatch {
                        field: field.to_string(),
                        expected: *n as usize,
                        actual: b.len(),
                    });
                }
                w.extend_from_slice(b);
            }
            Len::Field(_) => {
                // The length field is a sibling, written on its own pass.
                w.extend_from_slice(b);
            }
            Len::NulTerminated => {
                if b.contains(&0) {
                    return Err(CodecError::TypeMismatch {
                        field: field.to_string(),
                        expected: "byte sequence without an interior 0x00",
                    });
                }
                w.extend_from_slice(b);
                w.push(0);
            }
        }
        Ok(())
    }

    fn encode_prim(
        &self,
        w: &mut Vec<u8>,
        p: Primitive,
        field: &str,
        v: &Value,
    ) -> Result<(), CodecError> {
        let size = p.size_in_bytes();
        if p.is_signed() {
            let n = v.as_i64().ok_or_else(|| CodecError::TypeMismatch {
                field: field.to_string(),
                expected: "signed integer",
            })?;
            if size < 8 {
                let max = (1i64 << (8 * size - 1)) - 1;
                let min = -max - 1;
                if n < min || n > max {
                    return Err(CodecError::RangeViolation {
                        field: field.to_string(),
                        value: n,
                        bound: format!("{}..={}", min, max),
                    });
                }
            }
            let mut buf = [0u8; 8];
            match self.endianness {
                Endianness::Big => BigEndian::write_int(&mut buf, n, size),
                Endianness::Little => LittleEndian::write_int(&mut buf, n, size),
            }
            w.extend_from_slice(&buf[..size]);
        } else {
            let n = v.as_u64().ok_or_else(|| CodecError::TypeMismatch {
                field: field.to_string(),
                expected: "unsigned integer",
            })?;
            if size < 8 {
                let max = (1u64 << (8 * size)) - 1;
                if n > max {
                    return Err(CodecError::RangeViolation {
                        field: field.to_string(),
                        value: n as i64,
                        bound: format!("0..={}", max),
                    });
                }
            }
            let mut buf = [0u8; 8];
            match self.endianness {
                Endianness::Big => BigEndian::write_uint(&mut buf, n, size),
                Endianness::Little => LittleEndian::write_uint(&mut buf, n, size),
            }
            w.extend_from_slice(&buf[..size]);
        }
        Ok(())
    }

    fn read_uint(&self, b: &[u8]) -> u64 {
        match self.endianness {
            Endianness::Big => BigEndian::read_uint(b, b.len()),
            Endianness::Little => LittleEndian::read_uint(b, b.len()),
        }
    }

    fn read_int(&self, b: &[u8]) -> i64 {
        match self.endianness {
            Endianness::Big => BigEndian::read_int(b, b.len()),
            Endianness::Little => LittleEndian::read_int(b, b.len()),
        }
    }

    /// Raw integer of an enum's underlying primitive, sign-extended when the
    /// primitive is signed.
    fn read_raw_int(&self, b: &[u8], p: Primitive) -> i64 {
        if p.is_signed() {
            self.read_int(b)
        } else {
            self.read_uint(b) as i64
        }
    }

    fn write_raw_int(&self, w: &mut Vec<u8>, p: Primitive, n: i64) {
        let size = p.size_in_bytes();
        let mut buf = [0u8; 8];
        if p.is_signed() {
            match self.endianness {
                Endianness::Big => BigEndian::write_int(&mut buf, n, size),
                Endianness::Little => LittleEndian::write_int(&mut buf, n, size),
            }
        } else {
            match self.endianness {
                Endianness::Big => BigEndian::write_uint(&mut buf, n as u64, size),
                Endianness::Little => LittleEndian::write_uint(&mut buf, n as u64, size),
            }
        }
        w.extend_from_slice(&buf[..size]);
    }
}

/// View of one struct definition with the two-operation surface every
/// concrete format type exposes.
#[derive(Debug, Clone, Copy)]
pub struct TypeHandle<'a> {
    codec: &'a Codec,
    name: &'a str,
}

impl TypeHandle<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn read(&self, bytes: &[u8]) -> Result<(HashMap<String, Value>, usize), CodecError> {
        self.codec.read(self.name, bytes)
    }

    pub fn write(&self, values: &HashMap<String, Value>) -> Result<Vec<u8>, CodecError> {
        self.codec.write(self.name, values)
    }
}

/// Evaluate a field's assertions against a decoded (or about-to-be-encoded)
/// value. The first failing assertion wins.
pub fn validate(field: &str, v: &Value, assertions: &[Assertion]) -> Result<(), CodecError> {
    for a in assertions {
        match a {
            Assertion::Equals(expected) => {
                if !assert_value_eq(expected, v) {
                    return Err(CodecError::MagicMismatch {
                        field: field.to_string(),
                        expected: expected.to_string(),
                        actual: value_display(v),
                    });
                }
            }
            Assertion::NotEquals(expected) => {
                if assert_value_eq(expected, v) {
                    return Err(match (expected, v.as_i64()) {
                        (AssertValue::Int(_), Some(n)) => {
                            bound_err(field, n, format!("!= {}", expected))
                        }
                        _ => CodecError::MagicMismatch {
                            field: field.to_string(),
                            expected: format!("other than {}", expected),
                            actual: value_display(v),
                        },
                    });
                }
            }
            Assertion::GreaterThan(k) => {
                let n = numeric(field, v)?;
                if n <= *k {
                    return Err(bound_err(field, n, format!("> {}", k)));
                }
            }
            Assertion::GreaterOrEqual(k) => {
                let n = numeric(field, v)?;
                if n < *k {
                    return Err(bound_err(field, n, format!(">= {}", k)));
                }
            }
            Assertion::LessThan(k) => {
                let n = numeric(field, v)?;
                if n >= *k {
                    return Err(bound_err(field, n, format!("< {}", k)));
                }
            }
            Assertion::LessOrEqual(k) => {
                let n = numeric(field, v)?;
                if n > *k {
                    return Err(bound_err(field, n, format!("<= {}", k)));
                }
            }
            Assertion::In(set) => {
                let n = numeric(field, v)?;
                if !set.contains(&n) {
                    return Err(bound_err(field, n, format!("in {:?}", set)));
                }
            }
            Assertion::NotIn(set) => {
                let n = numeric(field, v)?;
                if set.contains(&n) {
                    return Err(bound_err(field, n, format!("not in {:?}", set)));
                }
            }
            Assertion::Range { min, max } => {
                let n = numeric(field, v)?;
                if n < *min || n > *max {
                    return Err(bound_err(field, n, format!("{}..={}", min, max)));
                }
            }
        }
    }
    Ok(())
}

fn assert_value_eq(expected: &AssertValue, v: &Value) -> bool {
    match expected {
        AssertValue::Int(k) => v.as_i64() == Some(*k),
        AssertValue::Bytes(b) => v.as_bytes() == Some(b.as_slice()),
    }
}

fn numeric(field: &str, v: &Value) -> Result<i64, CodecError> {
    v.as_i64().ok_or_else(|| CodecError::TypeMismatch {
        field: field.to_string(),
        expected: "numeric value",
    })
}

fn bound_err(field: &str, value: i64, bound: String) -> CodecError {
    CodecError::RangeViolation {
        field: field.to_string(),
        value,
        bound,
    }
}

fn value_display(v: &Value) -> String {
    match v {
        Value::Bytes(b) => AssertValue::Bytes(b.clone()).to_string(),
        other => match other.as_i64() {
            Some(n) => n.to_string(),
            None => format!("{:?}", other),
        },
    }
}

fn remaining(r: &Cursor<&[u8]>) -> usize {
    r.get_ref().len() - r.position() as usize
}

fn take<'a>(r: &mut Cursor<&'a [u8]>, n: usize, field: &str) -> Result<&'a [u8], CodecError> {
    let pos = r.position() as usize;
    let buf = *r.get_ref();
    if buf.len() - pos < n {
        return Err(CodecError::TruncatedInput {
            field: field.to_string(),
            needed: n,
            remaining: buf.len() - pos,
        });
    }
    r.set_position((pos + n) as u64);
    Ok(&buf[pos..pos + n])
}
