//! Decode buffers that hold several concatenated records of one type.
//!
//! Each successful decode reports its exact byte extent, which is how the
//! next record is located. The first failing record aborts the whole stream;
//! no partial results are returned.

use crate::codec::{Codec, CodecError};
use crate::value::Value;
use std::collections::HashMap;

/// One record out of a stream, with its byte range in the source buffer.
#[derive(Debug)]
pub struct DecodedRecord {
    pub values: HashMap<String, Value>,
    pub byte_range: (usize, usize),
}

/// A stream failure, locating the record that could not be processed.
#[derive(Debug, thiserror::Error)]
#[error("record {index} at offset {offset}: {source}")]
pub struct StreamError {
    pub index: usize,
    pub offset: usize,
    #[source]
    pub source: CodecError,
}

/// Decode every record in `bytes` until the buffer is exhausted.
pub fn decode_records(
    codec: &Codec,
    struct_name: &str,
    bytes: &[u8],
) -> Result<Vec<DecodedRecord>, StreamError> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        match codec.read(struct_name, &bytes[offset..]) {
            Ok((values, consumed)) => {
                if consumed == 0 {
                    // A zero-length record can never drain the buffer.
                    break;
                }
                out.push(DecodedRecord {
                    values,
                    byte_range: (offset, offset + consumed),
                });
                offset += consumed;
            }
            Err(source) => {
                return Err(StreamError {
                    index: out.len(),
                    offset,
                    source,
                });
            }
        }
    }
    Ok(out)
}

/// Encode records back to back into one buffer.
pub fn encode_records(
    codec: &Codec,
    struct_name: &str,
    records: &[HashMap<String, Value>],
) -> Result<Vec<u8>, StreamError> {
    let mut out = Vec::new();
    for (index, values) in records.iter().enumerate() {
        let offset = out.len();
        let encoded = codec.write(struct_name, values).map_err(|source| StreamError {
            index,
            offset,
            source,
        })?;
        out.extend(encoded);
    }
    Ok(out)
}
