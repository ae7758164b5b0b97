//! Check schema files for structural problems before handing them to the
//! codec: duplicate names, unknown references, open-array placement,
//! count-field references, self-embedding, sentinel and assertion shapes.
//!
//! Usage:
//!   check_schema <schema.json> [...]
//!
//! Exit code 1 if any error-level findings.

use bytespec::check::{check, CheckRule, Severity};
use bytespec::Schema;
use std::path::Path;

fn rule_id(rule: CheckRule) -> &'static str {
    match rule {
        CheckRule::EmptyDef => "empty-def",
        CheckRule::DuplicateName => "duplicate-name",
        CheckRule::UnknownReference => "unknown-reference",
        CheckRule::CountFieldRef => "count-field-ref",
        CheckRule::OpenArrayPlacement => "open-array-placement",
        CheckRule::SelfEmbedding => "self-embedding",
        CheckRule::SentinelShape => "sentinel-shape",
        CheckRule::AssertionShape => "assertion-shape",
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: check_schema <schema.json> [...]");
        std::process::exit(2);
    }

    let mut has_error = false;
    let mut total_errors = 0usize;
    let mut total_warnings = 0usize;

    for path in &args {
        let path = Path::new(path);
        let src = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                has_error = true;
                continue;
            }
        };
        let schema: Schema = match serde_json::from_str(&src) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{}: parse error: {}", path.display(), e);
                has_error = true;
                continue;
            }
        };
        let messages = check(&schema);
        for m in &messages {
            let severity_str = match m.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            println!(
                "{}: {}: {} [{}]",
                path.display(),
                severity_str,
                m,
                rule_id(m.rule)
            );
            match m.severity {
                Severity::Error => total_errors += 1,
                Severity::Warning => total_warnings += 1,
            }
        }
        if messages.iter().any(|m| m.severity == Severity::Error) {
            has_error = true;
        }
    }

    if total_errors > 0 || total_warnings > 0 {
        eprintln!("check: {} error(s), {} warning(s)", total_errors, total_warnings);
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
