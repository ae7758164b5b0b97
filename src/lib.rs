//! # bytespec — Declarative Binary Struct Codec
//!
//! A runtime codec that turns a declarative field/array/enum/validation
//! description into exact-byte encode and decode routines. Definitions are
//! produced ahead of time (by a schema compiler, by hand, or from JSON) and
//! handed to the codec as static configuration; the codec itself holds no
//! state across calls.
//!
//! ## Field kinds
//!
//! - Fixed-width integers: `u8`..`u64`, `i8`..`i64`, big-endian by
//!   convention (little-endian configurable)
//! - Byte sequences: fixed length, length from an earlier field, or
//!   NUL-terminated
//! - Symbolic enums over a fixed-width integer (unmapped values are errors)
//! - Nested structs, recursively through arrays
//! - Arrays under three termination policies: fixed/field count,
//!   end-of-input, per-element sentinel
//! - Assertions per field: equality (magic signatures), ranges,
//!   comparisons, sets
//!
//! ## Example schema (JSON form)
//!
//! ```text
//! {
//!   "structs": [
//!     { "name": "Header", "fields": [
//!       { "name": "magic", "kind": { "Bytes": { "Fixed": 4 } },
//!         "assertions": [ { "Equals": { "Bytes": [137, 80, 78, 71] } } ] },
//!       { "name": "version", "kind": "U16",
//!         "assertions": [ { "GreaterOrEqual": 1 } ] },
//!       { "name": "flags", "kind": "U8",
//!         "assertions": [ { "Range": { "min": 0, "max": 7 } } ] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! ## Usage
//!
//! Resolve a [`Schema`] into a [`ResolvedSchema`], wrap it in a [`Codec`],
//! then `read` bytes into values (with the exact consumed byte count) or
//! `write` values back to bytes. The first failing field aborts the whole
//! operation with a typed [`CodecError`] naming that field.

pub mod check;
pub mod codec;
pub mod def;
pub mod dump;
pub mod stream;
pub mod value;

pub use check::{CheckMessage, CheckRule, Severity};
pub use codec::{Codec, CodecError, Endianness, TypeHandle};
pub use def::{
    AssertValue, Assertion, Count, EnumDef, EnumVariant, FieldDef, FieldKind, Len, Primitive,
    ResolvedSchema, Schema, SchemaError, Sentinel, StructDef, Termination,
};
pub use dump::{record_to_dump, value_to_dump};
pub use stream::{decode_records, encode_records, DecodedRecord, StreamError};
pub use value::Value;
