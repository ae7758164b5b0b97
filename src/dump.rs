//! Format decoded values for display (dump text). Uses the resolved schema
//! to print fields in declaration order and to recurse with the right
//! definitions.

use crate::def::{FieldKind, ResolvedSchema};
use crate::value::Value;
use std::collections::HashMap;

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Format a single value with no schema context. Struct fields come out in
/// sorted order since the map itself is unordered.
pub fn value_to_dump(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Bytes(b) => format!("{}hex({})", pad, hex_string(b)),
        Value::Tag(t) => format!("{}{}", pad, t),
        Value::Struct(m) => {
            let mut lines: Vec<String> = vec![format!("{}struct {{", pad)];
            let mut keys: Vec<_> = m.keys().collect();
            keys.sort();
            for k in keys {
                let sub = value_to_dump(&m[k], indent + 1);
                lines.push(format!("{}  {}: {}", pad, k, sub.trim_start()));
            }
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        Value::List(lst) => {
            if lst.is_empty() {
                format!("{}[]", pad)
            } else {
                let mut lines: Vec<String> = vec![format!("{}[", pad)];
                for (i, item) in lst.iter().enumerate() {
                    let sub = value_to_dump(item, indent + 1);
                    lines.push(format!("{}  [{}] {}", pad, i, sub.trim_start()));
                }
                lines.push(format!("{}]", pad));
                lines.join("\n")
            }
        }
        scalar => format!("{}{}", pad, scalar_string(scalar)),
    }
}

fn scalar_string(v: &Value) -> String {
    match v {
        Value::U8(x) => format!("{}", x),
        Value::U16(x) => format!("{}", x),
        Value::U32(x) => format!("{}", x),
        Value::U64(x) => format!("{}", x),
        Value::I8(x) => format!("{}", x),
        Value::I16(x) => format!("{}", x),
        Value::I32(x) => format!("{}", x),
        Value::I64(x) => format!("{}", x),
        other => format!("{:?}", other),
    }
}

/// Format a decoded record, fields in declaration order. Falls back to
/// `value_to_dump` when the struct is not in the schema.
pub fn record_to_dump(
    resolved: &ResolvedSchema,
    struct_name: &str,
    values: &HashMap<String, Value>,
    indent: usize,
) -> String {
    let def = match resolved.get_struct(struct_name) {
        Some(d) => d,
        None => return value_to_dump(&Value::Struct(values.clone()), indent),
    };
    let pad = "  ".repeat(indent);
    let mut lines = Vec::new();
    for f in &def.fields {
        let v = match values.get(&f.name) {
            Some(v) => v,
            None => continue,
        };
        let sub = field_to_dump(resolved, &f.kind, v, indent + 1);
        lines.push(format!("{}{}: {}", pad, f.name, sub.trim_start()));
    }
    lines.join("\n")
}

fn field_to_dump(resolved: &ResolvedSchema, kind: &FieldKind, v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match (kind, v) {
        (FieldKind::Struct(name), Value::Struct(m)) => {
            let body = record_to_dump(resolved, name, m, indent + 1);
            format!("{pad}struct {{\n{body}\n{pad}}}", pad = pad, body = body)
        }
        (FieldKind::Array { elem, .. }, Value::List(lst)) => {
            if lst.is_empty() {
                return format!("{}[]", pad);
            }
            let mut lines: Vec<String> = vec![format!("{}[", pad)];
            for (i, item) in lst.iter().enumerate() {
                let sub = field_to_dump(resolved, elem, item, indent + 1);
                lines.push(format!("{}  [{}] {}", pad, i, sub.trim_start()));
            }
            lines.push(format!("{}]", pad));
            lines.join("\n")
        }
        _ => value_to_dump(v, indent),
    }
}
