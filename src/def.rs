//! Definition model for binary formats: structs, fields, enums, assertions.
//!
//! Definitions are static configuration objects produced ahead of time (by a
//! schema compiler or by hand, e.g. from JSON) and consumed unchanged by the
//! codec. Struct and enum references are by name and resolved once, so a
//! struct may appear inside an array of itself without any structural
//! recursion at the definition level.

use crate::check;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Root schema: named structs and enums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub structs: Vec<StructDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
}

/// An ordered, fixed-composition record of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// A named, typed slot within a struct, with optional validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDef {
            name: name.into(),
            kind,
            assertions: Vec::new(),
        }
    }

    /// Append an assertion (builder style, for programmatic schemas).
    pub fn with(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }
}

/// Field type. Multi-byte integers use the codec's configured byte order
/// (big-endian by convention).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    /// Raw byte sequence with an externally-given length.
    Bytes(Len),
    /// Symbolic enum backed by a fixed-width integer, by enum name.
    Enum(String),
    /// Nested struct, by struct name.
    Struct(String),
    /// Repeated element under a termination policy.
    Array {
        elem: Box<FieldKind>,
        terminate: Termination,
    },
}

impl FieldKind {
    /// The primitive backing a scalar kind, if any.
    pub fn primitive(&self) -> Option<Primitive> {
        Some(match self {
            FieldKind::U8 => Primitive::U8,
            FieldKind::U16 => Primitive::U16,
            FieldKind::U32 => Primitive::U32,
            FieldKind::U64 => Primitive::U64,
            FieldKind::I8 => Primitive::I8,
            FieldKind::I16 => Primitive::I16,
            FieldKind::I32 => Primitive::I32,
            FieldKind::I64 => Primitive::I64,
            _ => return None,
        })
    }
}

/// Fixed-width integer primitives (also the underlying type of an enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Primitive {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl Primitive {
    pub fn size_in_bytes(self) -> usize {
        match self {
            Primitive::U8 | Primitive::I8 => 1,
            Primitive::U16 | Primitive::I16 => 2,
            Primitive::U32 | Primitive::I32 => 4,
            Primitive::U64 | Primitive::I64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64
        )
    }
}

/// Length of a `Bytes` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Len {
    /// Literal byte count.
    Fixed(u64),
    /// Value of an earlier integer field of the same struct.
    Field(String),
    /// Bytes up to a 0x00 terminator; the terminator is consumed but not
    /// part of the value.
    NulTerminated,
}

/// Element count of a counted array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Count {
    /// Literal element count.
    Fixed(u64),
    /// Value of an earlier integer field of the same struct.
    Field(String),
}

/// The rule governing how many elements an array decodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Termination {
    /// Exactly `Count` elements.
    Count(Count),
    /// Repeat until the input buffer is exhausted. Only valid as the last
    /// field of a struct.
    End,
    /// Stop at the first element matching the sentinel, inclusive of that
    /// element.
    Sentinel(Sentinel),
}

/// Per-element stop condition for `Termination::Sentinel`: the named field
/// of the just-decoded element (or the element itself when `field` is None)
/// equals `value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentinel {
    pub field: Option<String>,
    pub value: AssertValue,
}

impl Sentinel {
    /// Whether a decoded element satisfies this sentinel. Integer sentinels
    /// match integer scalars; byte sentinels match `Bytes` values.
    pub fn matches(&self, element: &crate::value::Value) -> bool {
        let target = match &self.field {
            Some(f) => match element.as_struct().and_then(|m| m.get(f)) {
                Some(v) => v,
                None => return false,
            },
            None => element,
        };
        match &self.value {
            AssertValue::Int(k) => target.as_i64() == Some(*k),
            AssertValue::Bytes(b) => target.as_bytes() == Some(b.as_slice()),
        }
    }
}

/// A validation predicate attached to a field, evaluated after decode and
/// before encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Assertion {
    Equals(AssertValue),
    NotEquals(AssertValue),
    GreaterThan(i64),
    GreaterOrEqual(i64),
    LessThan(i64),
    LessOrEqual(i64),
    In(Vec<i64>),
    NotIn(Vec<i64>),
    /// Inclusive on both ends.
    Range { min: i64, max: i64 },
}

/// Constant compared against by `Equals`/`NotEquals` and sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssertValue {
    Int(i64),
    /// For fixed signature fields.
    Bytes(Vec<u8>),
}

impl fmt::Display for AssertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssertValue::Int(n) => write!(f, "{}", n),
            AssertValue::Bytes(b) => {
                write!(f, "[")?;
                for (i, x) in b.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:#04x}", x)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Symbolic enum: a name <-> integer bijection over a fixed-width primitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub underlying: Primitive,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, underlying: Primitive) -> Self {
        EnumDef {
            name: name.into(),
            underlying,
            variants: Vec::new(),
        }
    }

    pub fn variant(mut self, name: impl Into<String>, value: i64) -> Self {
        self.variants.push(EnumVariant {
            name: name.into(),
            value,
        });
        self
    }

    /// Symbolic tag for an integer, if mapped.
    pub fn tag_for(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }

    /// Integer for a symbolic tag, if declared.
    pub fn value_of(&self, tag: &str) -> Option<i64> {
        self.variants.iter().find(|v| v.name == tag).map(|v| v.value)
    }
}

/// Schema-level failures, produced at resolution time, never during
/// decode/encode.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate struct name: {0}")]
    DuplicateStruct(String),
    #[error("duplicate enum name: {0}")]
    DuplicateEnum(String),
    #[error("{0}")]
    Invalid(check::CheckMessage),
}

/// Resolved schema: structs and enums indexed by name for the codec.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub schema: Schema,
    structs_by_name: HashMap<String, usize>,
    enums_by_name: HashMap<String, usize>,
}

impl ResolvedSchema {
    /// Build the name indexes and run the structural checks. Any
    /// error-severity finding rejects the schema before the codec can see it.
    pub fn resolve(schema: Schema) -> Result<Self, SchemaError> {
        let mut structs_by_name = HashMap::new();
        let mut enums_by_name = HashMap::new();
        for (i, s) in schema.structs.iter().enumerate() {
            if structs_by_name.insert(s.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateStruct(s.name.clone()));
            }
        }
        for (i, e) in schema.enums.iter().enumerate() {
            if enums_by_name.insert(e.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateEnum(e.name.clone()));
            }
        }
        if let Some(m) = check::check(&schema)
            .into_iter()
            .find(|m| m.severity == check::Severity::Error)
        {
            return Err(SchemaError::Invalid(m));
        }
        Ok(ResolvedSchema {
            schema,
            structs_by_name,
            enums_by_name,
        })
    }

    pub fn get_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs_by_name
            .get(name)
            .map(|&i| &self.schema.structs[i])
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums_by_name.get(name).map(|&i| &self.schema.enums[i])
    }
}
