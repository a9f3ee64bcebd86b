//! Canonical JSON for hashing and signing
//!
//! Ensures a deterministic string representation of every message: object
//! keys are sorted recursively and the output is compact. Both gateways hash
//! the same canonical form, so hashes and signature pre-images agree
//! byte-for-byte regardless of struct field order.

use crate::{messages::OdapMessage, Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Serialize any value to canonical JSON
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&sorted(value))?)
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let entries: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sorted(v))).collect();
            Value::Object(entries.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

/// SHA-256 of arbitrary bytes, hex-encoded
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash of the canonical JSON of a value
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(hash_hex(canonical_json(value)?.as_bytes()))
}

/// Hash of a complete (signed) message, used as the chaining token
pub fn message_hash<M: OdapMessage>(message: &M) -> Result<String> {
    canonical_hash(message)
}

/// Signature pre-image: canonical JSON of the message with its own
/// signature field blanked. The caller's message is left untouched.
pub fn signing_payload<M: OdapMessage>(message: &M) -> Result<String> {
    let mut value = serde_json::to_value(message)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| Error::NotAnObject(M::MESSAGE_TYPE.to_string()))?;
    obj.insert(
        M::SIGNATURE_FIELD.to_string(),
        Value::String(String::new()),
    );
    Ok(serde_json::to_string(&sorted(value))?)
}
