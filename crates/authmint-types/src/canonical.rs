//! Canonical serialization for everything that gets hashed or signed.
//!
//! Receipts, evidence, and proof steps are verified across process and
//! implementation boundaries, so their byte representation must be
//! deterministic. The rules (a practical subset of RFC 8785, JSON
//! Canonicalization Scheme):
//!
//! - Object keys sorted lexicographically, at every nesting level
//! - No insignificant whitespace
//! - Timestamps as UTC ISO-8601 with a `Z` suffix, microsecond precision
//! - Hashes as lowercase hex
//!
//! The conformance vector in the tests below is pinned; if it ever changes,
//! every receipt signed by an older build stops verifying.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::Result;

/// Render a JSON value in canonical form: sorted keys, compact separators.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json's string escaping is stable across versions.
            out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(
                    &serde_json::to_string(key).expect("string serialization is infallible"),
                );
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

/// SHA-256 of raw bytes, lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over the canonical rendering of a JSON value.
#[must_use]
pub fn hash_value(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// SHA-256 over the canonical rendering of any serializable value.
///
/// # Errors
/// Returns [`crate::AuthmintError::Serialization`] if the value cannot be
/// represented as JSON.
pub fn hash_of<T: Serialize>(value: &T) -> Result<String> {
    Ok(hash_value(&serde_json::to_value(value)?))
}

/// Serde `with`-module for `DateTime<Utc>` in the canonical wire format:
/// ISO-8601, UTC, `Z` suffix, microsecond precision.
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    /// Format a timestamp in the canonical wire form.
    #[must_use]
    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }

    /// Same format, for `Option<DateTime<Utc>>` fields.
    pub mod opt {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            ser: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => ser.serialize_some(&super::format(dt)),
                None => ser.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            de: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw: Option<String> = Option::deserialize(de)?;
            raw.map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(D::Error::custom)
            })
            .transpose()
        }
    }
}
