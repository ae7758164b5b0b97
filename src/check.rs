//! Structural checks for schemas: run once at resolution, before any
//! decode/encode.
//!
//! ## Rules
//!
//! - **Names**: no duplicate field names in a struct, no duplicate variant
//!   names or values in an enum (the mapping must be a bijection).
//! - **References**: struct/enum names used by fields must be defined.
//! - **Count/length references**: a `Field(...)` count or length must name an
//!   earlier integer field of the same struct.
//! - **Open arrays**: an end-of-input terminated array can only be the last
//!   field of its struct, and never an array element.
//! - **Self-embedding**: a struct may reach itself only through an
//!   input-bounded array, never by direct embedding or fixed-count arrays.
//! - **Sentinels**: a sentinel naming an element field requires a struct
//!   element that declares that field.
//! - **Assertions** (warnings): assertion kinds that cannot hold for the
//!   field's kind, e.g. a numeric range on a byte sequence.

use crate::def::{AssertValue, Assertion, Count, FieldKind, Len, Schema, StructDef, Termination};
use std::collections::HashMap;
use std::fmt;

/// Severity of a check finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRule {
    EmptyDef,
    DuplicateName,
    UnknownReference,
    CountFieldRef,
    OpenArrayPlacement,
    SelfEmbedding,
    SentinelShape,
    AssertionShape,
}

/// A single finding with its location ("Struct.field" or a definition name).
#[derive(Debug, Clone)]
pub struct CheckMessage {
    pub rule: CheckRule,
    pub severity: Severity,
    pub location: String,
    pub message: String,
}

impl fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Run all rules over a schema. Returns findings in definition order.
pub fn check(schema: &Schema) -> Vec<CheckMessage> {
    let mut out = Vec::new();
    let structs: HashMap<&str, &StructDef> = schema
        .structs
        .iter()
        .map(|s| (s.name.as_str(), s))
        .collect();
    let enum_names: Vec<&str> = schema.enums.iter().map(|e| e.name.as_str()).collect();

    for e in &schema.enums {
        let loc = format!("enum {}", e.name);
        if e.variants.is_empty() {
            push(&mut out, CheckRule::EmptyDef, Severity::Error, &loc, "enum has no variants");
        }
        for (i, v) in e.variants.iter().enumerate() {
            for w in &e.variants[..i] {
                if w.name == v.name {
                    push(
                        &mut out,
                        CheckRule::DuplicateName,
                        Severity::Error,
                        &loc,
                        format!("duplicate variant name {}", v.name),
                    );
                }
                if w.value == v.value {
                    push(
                        &mut out,
                        CheckRule::DuplicateName,
                        Severity::Error,
                        &loc,
                        format!("variants {} and {} share value {}", w.name, v.name, v.value),
                    );
                }
            }
        }
    }

    for s in &schema.structs {
        if s.fields.is_empty() {
            push(
                &mut out,
                CheckRule::EmptyDef,
                Severity::Error,
                &s.name,
                "struct has no fields",
            );
        }
        for (i, f) in s.fields.iter().enumerate() {
            let loc = format!("{}.{}", s.name, f.name);
            if s.fields[..i].iter().any(|g| g.name == f.name) {
                push(
                    &mut out,
                    CheckRule::DuplicateName,
                    Severity::Error,
                    &loc,
                    "duplicate field name",
                );
            }
            check_kind(&mut out, &loc, s, i, &f.kind, &structs, &enum_names, true);
            check_assertions(&mut out, &loc, &f.kind, &f.assertions);
        }
        check_open_array_last(&mut out, s);
    }

    check_embedding_cycles(&mut out, schema, &structs);
    out
}

#[allow(clippy::too_many_arguments)]
fn check_kind(
    out: &mut Vec<CheckMessage>,
    loc: &str,
    owner: &StructDef,
    field_index: usize,
    kind: &FieldKind,
    structs: &HashMap<&str, &StructDef>,
    enum_names: &[&str],
    top_level: bool,
) {
    match kind {
        FieldKind::Bytes(Len::Field(referenced)) => {
            check_field_ref(out, loc, owner, field_index, referenced);
        }
        FieldKind::Enum(name) => {
            if !enum_names.contains(&name.as_str()) {
                push(
                    out,
                    CheckRule::UnknownReference,
                    Severity::Error,
                    loc,
                    format!("unknown enum {}", name),
                );
            }
        }
        FieldKind::Struct(name) => {
            if !structs.contains_key(name.as_str()) {
                push(
                    out,
                    CheckRule::UnknownReference,
                    Severity::Error,
                    loc,
                    format!("unknown struct {}", name),
                );
            }
        }
        FieldKind::Array { elem, terminate } => {
            match terminate {
                Termination::Count(Count::Field(referenced)) => {
                    check_field_ref(out, loc, owner, field_index, referenced);
                }
                Termination::End if !top_level => {
                    push(
                        out,
                        CheckRule::OpenArrayPlacement,
                        Severity::Error,
                        loc,
                        "an end-of-input array cannot be an array element",
                    );
                }
                Termination::Sentinel(rule) => match (&rule.field, elem.as_ref()) {
                    (Some(f), FieldKind::Struct(name)) => {
                        if let Some(def) = structs.get(name.as_str()) {
                            if !def.fields.iter().any(|g| &g.name == f) {
                                push(
                                    out,
                                    CheckRule::SentinelShape,
                                    Severity::Error,
                                    loc,
                                    format!("sentinel field {} not declared by struct {}", f, name),
                                );
                            }
                        }
                    }
                    (Some(f), _) => {
                        push(
                            out,
                            CheckRule::SentinelShape,
                            Severity::Error,
                            loc,
                            format!("sentinel field {} requires a struct element", f),
                        );
                    }
                    (None, FieldKind::Struct(_)) => {
                        push(
                            out,
                            CheckRule::SentinelShape,
                            Severity::Warning,
                            loc,
                            "sentinel without a field compares the whole struct element and will never match",
                        );
                    }
                    (None, _) => {}
                },
                _ => {}
            }
            check_kind(out, loc, owner, field_index, elem, structs, enum_names, false);
        }
        _ => {}
    }
}

fn check_field_ref(
    out: &mut Vec<CheckMessage>,
    loc: &str,
    owner: &StructDef,
    field_index: usize,
    referenced: &str,
) {
    match owner.fields[..field_index]
        .iter()
        .find(|g| g.name == referenced)
    {
        Some(g) => match g.kind.primitive() {
            Some(p) if p.is_signed() => push(
                out,
                CheckRule::CountFieldRef,
                Severity::Warning,
                loc,
                format!("count/length field {} is signed", referenced),
            ),
            Some(_) => {}
            None => push(
                out,
                CheckRule::CountFieldRef,
                Severity::Error,
                loc,
                format!("count/length field {} is not an integer", referenced),
            ),
        },
        None => push(
            out,
            CheckRule::CountFieldRef,
            Severity::Error,
            loc,
            format!("{} must be an earlier field of the same struct", referenced),
        ),
    }
}

fn check_open_array_last(out: &mut Vec<CheckMessage>, s: &StructDef) {
    for (i, f) in s.fields.iter().enumerate() {
        let is_open = matches!(
            &f.kind,
            FieldKind::Array {
                terminate: Termination::End,
                ..
            }
        );
        if is_open && i + 1 != s.fields.len() {
            push(
                out,
                CheckRule::OpenArrayPlacement,
                Severity::Error,
                &format!("{}.{}", s.name, f.name),
                "an end-of-input array must be the last field of its struct",
            );
        }
    }
}

fn check_assertions(
    out: &mut Vec<CheckMessage>,
    loc: &str,
    kind: &FieldKind,
    assertions: &[Assertion],
) {
    let numeric = kind.primitive().is_some();
    let bytes = matches!(kind, FieldKind::Bytes(_));
    for a in assertions {
        let ok = match a {
            Assertion::Equals(AssertValue::Int(_)) | Assertion::NotEquals(AssertValue::Int(_)) => {
                numeric
            }
            Assertion::Equals(AssertValue::Bytes(_))
            | Assertion::NotEquals(AssertValue::Bytes(_)) => bytes,
            _ => numeric,
        };
        if !ok {
            push(
                out,
                CheckRule::AssertionShape,
                Severity::Warning,
                loc,
                "assertion cannot hold for this field kind",
            );
        }
    }
}

/// A struct reaching itself through direct embedding, or through an array
/// whose element count is a fixed literal, has no finite size. Reaching
/// itself through an input-bounded array (field count, end-of-input,
/// sentinel) is fine.
fn check_embedding_cycles(
    out: &mut Vec<CheckMessage>,
    schema: &Schema,
    structs: &HashMap<&str, &StructDef>,
) {
    for s in &schema.structs {
        let mut stack = vec![s.name.as_str()];
        let mut visited = Vec::new();
        while let Some(name) = stack.pop() {
            if visited.contains(&name) {
                continue;
            }
            visited.push(name);
            let def = match structs.get(name) {
                Some(d) => d,
                None => continue,
            };
            for f in &def.fields {
                for target in embedding_targets(&f.kind) {
                    if target == s.name {
                        push(
                            out,
                            CheckRule::SelfEmbedding,
                            Severity::Error,
                            &s.name,
                            format!("struct embeds itself (via {}.{})", name, f.name),
                        );
                    } else {
                        stack.push(target);
                    }
                }
            }
        }
    }
}

/// Struct names a kind embeds with a size fixed at definition time.
fn embedding_targets(kind: &FieldKind) -> Vec<&str> {
    match kind {
        FieldKind::Struct(name) => vec![name.as_str()],
        FieldKind::Array {
            elem,
            terminate: Termination::Count(Count::Fixed(n)),
        } if *n > 0 => embedding_targets(elem),
        _ => Vec::new(),
    }
}

fn push(
    out: &mut Vec<CheckMessage>,
    rule: CheckRule,
    severity: Severity,
    location: &str,
    message: impl Into<String>,
) {
    out.push(CheckMessage {
        rule,
        severity,
        location: location.to_string(),
        message: message.into(),
    });
}
