//! Canonical CBOR encoding for ledger records and transactions.
//!
//! Encoding follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 seconds)
//!
//! A record on the ledger is `discriminator (8 bytes) || canonical map`.
//! Decoding re-encodes the parsed map and rejects any input whose bytes
//! differ, so every record has exactly one valid encoding.

use ciborium::value::{Integer, Value};

use crate::crypto::Identity;
use crate::error::CoreError;
use crate::record::RecordKind;

/// Length of a record discriminator, in bytes.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Encode a CBOR Value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Frame a record body behind its discriminator.
pub fn encode_record(kind: RecordKind, body: &Value) -> Result<Vec<u8>, CoreError> {
    let mut buf = kind.discriminator().to_vec();
    encode_value_to(&mut buf, body)?;
    Ok(buf)
}

/// Check the discriminator and parse the canonical body of a record.
pub fn decode_record(kind: RecordKind, bytes: &[u8]) -> Result<Value, CoreError> {
    if bytes.len() < DISCRIMINATOR_LEN {
        return Err(CoreError::MalformedRecord("too short".into()));
    }
    let (tag, body) = bytes.split_at(DISCRIMINATOR_LEN);
    let expected = kind.discriminator();
    if tag != expected {
        return Err(CoreError::DiscriminatorMismatch {
            expected: hex::encode(expected),
            actual: hex::encode(tag),
        });
    }

    let value: Value =
        ciborium::from_reader(body).map_err(|e| CoreError::DecodingError(e.to_string()))?;

    if encode_canonical(&value)? != body {
        return Err(CoreError::NonCanonical);
    }
    Ok(value)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        _ => {
            return Err(CoreError::MalformedRecord(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n = i128::from(i);

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

/// Build a map with small integer keys.
pub fn int_map(entries: Vec<(u64, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Integer(k.into()), v))
            .collect(),
    )
}

/// Typed field access over a map with integer keys.
pub struct MapReader<'a> {
    entries: &'a [(Value, Value)],
}

impl<'a> MapReader<'a> {
    pub fn new(value: &'a Value) -> Result<Self, CoreError> {
        match value {
            Value::Map(entries) => Ok(Self { entries }),
            _ => Err(CoreError::MalformedRecord("expected map".into())),
        }
    }

    fn get(&self, key: u64) -> Result<&'a Value, CoreError> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
            .ok_or_else(|| CoreError::MalformedRecord(format!("missing field {}", key)))
    }

    fn integer(&self, key: u64) -> Result<i128, CoreError> {
        match self.get(key)? {
            Value::Integer(i) => Ok(i128::from(*i)),
            _ => Err(CoreError::MalformedRecord(format!("field {} is not an integer", key))),
        }
    }

    pub fn u64(&self, key: u64) -> Result<u64, CoreError> {
        u64::try_from(self.integer(key)?)
            .map_err(|_| CoreError::MalformedRecord(format!("field {} out of range", key)))
    }

    pub fn u32(&self, key: u64) -> Result<u32, CoreError> {
        u32::try_from(self.integer(key)?)
            .map_err(|_| CoreError::MalformedRecord(format!("field {} out of range", key)))
    }

    pub fn i64(&self, key: u64) -> Result<i64, CoreError> {
        i64::try_from(self.integer(key)?)
            .map_err(|_| CoreError::MalformedRecord(format!("field {} out of range", key)))
    }

    pub fn text(&self, key: u64) -> Result<&'a str, CoreError> {
        match self.get(key)? {
            Value::Text(s) => Ok(s),
            _ => Err(CoreError::MalformedRecord(format!("field {} is not text", key))),
        }
    }

    pub fn identity(&self, key: u64) -> Result<Identity, CoreError> {
        match self.get(key)? {
            Value::Bytes(b) => {
                let arr: [u8; 32] = b.as_slice().try_into().map_err(|_| {
                    CoreError::MalformedRecord(format!("field {} is not 32 bytes", key))
                })?;
                Ok(Identity(arr))
            }
            _ => Err(CoreError::MalformedRecord(format!("field {} is not bytes", key))),
        }
    }
}
