//! Canonical serialization and digest.
//!
//! The canonical form is compact `serde_json` with every object's keys
//! sorted at every depth, so the same record always yields the same bytes
//! on every platform whatever feature set `serde_json` was built with.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::fingerprint::types::Fingerprint;

/// Length of a rendered digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

pub fn canonical_value(fingerprint: &Fingerprint) -> Result<Value> {
  Ok(sort_keys(serde_json::to_value(fingerprint)?))
}

pub fn canonical_json(fingerprint: &Fingerprint) -> Result<String> {
  Ok(serde_json::to_string(&canonical_value(fingerprint)?)?)
}

pub fn canonical_bytes(fingerprint: &Fingerprint) -> Result<Vec<u8>> {
  Ok(serde_json::to_vec(&canonical_value(fingerprint)?)?)
}

fn sort_keys(value: Value) -> Value {
  match value {
    Value::Object(object) => {
      let mut entries: Vec<(String, Value)> = object.into_iter().collect();
      entries.sort_by(|a, b| a.0.cmp(&b.0));
      let mut sorted = Map::new();
      for (key, value) in entries {
        sorted.insert(key, sort_keys(value));
      }
      Value::Object(sorted)
    }
    Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
    other => other,
  }
}

/// SHA-256 of `bytes` as lowercase hex without separators.
pub fn digest_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

pub fn hash_fingerprint(fingerprint: &Fingerprint) -> Result<String> {
  let bytes = canonical_bytes(fingerprint)?;
  Ok(digest_hex(&bytes))
}
