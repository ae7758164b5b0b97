//! Decode a binary file against a schema and dump the values as text.
//!
//! Usage:
//!   dump_record <schema.json> <struct-name> <data-file> [--little] [--stream]
//!
//! Options:
//!   --little     Decode little-endian (default is big-endian)
//!   --stream     Treat the file as concatenated records and dump each one

use bytespec::{decode_records, record_to_dump, Codec, Endianness, ResolvedSchema, Schema};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let endianness = if let Some(pos) = args.iter().position(|a| a == "--little") {
        args.remove(pos);
        Endianness::Little
    } else {
        Endianness::Big
    };
    let stream = if let Some(pos) = args.iter().position(|a| a == "--stream") {
        args.remove(pos);
        true
    } else {
        false
    };
    if args.len() != 3 {
        eprintln!("usage: dump_record <schema.json> <struct-name> <data-file> [--little] [--stream]");
        std::process::exit(2);
    }
    let schema_path = PathBuf::from(&args[0]);
    let struct_name = args[1].clone();
    let data_path = PathBuf::from(&args[2]);

    let schema_src = std::fs::read_to_string(&schema_path)?;
    let schema: Schema = serde_json::from_str(&schema_src)?;
    let resolved = ResolvedSchema::resolve(schema)?;
    let codec = Codec::new(resolved.clone(), endianness);
    let data = std::fs::read(&data_path)?;

    if stream {
        let records = decode_records(&codec, &struct_name, &data)?;
        eprintln!(
            "{}: {} record(s), {} byte(s)",
            data_path.display(),
            records.len(),
            data.len()
        );
        for (i, rec) in records.iter().enumerate() {
            let (a, b) = rec.byte_range;
            println!("=== record {}  bytes [{}-{}] ===", i, a, b);
            println!("{}", record_to_dump(&resolved, &struct_name, &rec.values, 0));
        }
    } else {
        let (values, consumed) = codec.read(&struct_name, &data)?;
        eprintln!(
            "{}: decoded {} of {} byte(s)",
            data_path.display(),
            consumed,
            data.len()
        );
        println!("{}", record_to_dump(&resolved, &struct_name, &values, 0));
    }
    Ok(())
}
