//! Data types for the KVdb client

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A value to store under a key
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Sent verbatim
    Text(String),
    /// Raw bytes, never implicitly JSON-encoded
    Binary(Bytes),
    /// Structured data; objects and arrays are sent as JSON
    Json(serde_json::Value),
}

impl Value {
    /// Convert any serializable type into a structured value
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Value::Json(serde_json::to_value(value)?))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(Bytes::from(b))
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Binary(Bytes::copy_from_slice(b))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Binary(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

/// A decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The body parsed as JSON
    Json(serde_json::Value),
    /// The raw body text
    Text(String),
    /// A body that is neither JSON nor valid UTF-8
    Binary(Bytes),
}

impl Payload {
    /// Returns the text if the body was not decoded as JSON
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the raw bytes of a text or binary body
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Text(s) => Some(s.as_bytes()),
            Payload::Binary(b) => Some(b.as_ref()),
            Payload::Json(_) => None,
        }
    }

    /// Returns the JSON value if the body was decoded
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if the body was decoded as JSON
    pub fn is_json(&self) -> bool {
        matches!(self, Payload::Json(_))
    }

    /// Convert into a JSON value, wrapping text as a JSON string and bytes as an array
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Payload::Json(v) => v,
            Payload::Text(s) => serde_json::Value::String(s),
            Payload::Binary(b) => b.iter().copied().map(serde_json::Value::from).collect(),
        }
    }

    /// Deserialize a decoded body into `T`
    pub fn deserialize<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.into_json())?)
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Json(v) => write!(f, "{}", v),
            Payload::Text(s) => f.write_str(s),
            Payload::Binary(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// Options for [`crate::Client::get`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Try to parse a text body as JSON, keeping the text if that fails
    pub parse_json: bool,
}

/// Options for [`crate::Client::set`] and [`crate::Client::update`]
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Force JSON encoding of the value
    pub json: bool,
    /// Explicit `content-type`, overriding the inferred one
    pub content_type: Option<String>,
    /// Seconds until the key expires
    pub ttl: Option<u64>,
}

/// Options for [`crate::Client::increment`] and [`crate::Client::decrement`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterOptions {
    /// Seconds until the key expires
    pub ttl: Option<u64>,
}

/// Options for [`crate::Client::list`]
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Include stored values alongside keys
    pub values: bool,
    /// Output format requested from the server (default: `json`); `None` omits it
    pub format: Option<String>,
    /// Maximum number of entries
    pub limit: Option<u64>,
    /// Number of entries to skip
    pub skip: Option<u64>,
    /// Only keys starting with this prefix
    pub prefix: Option<String>,
    /// Reverse key order
    pub reverse: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            values: false,
            format: Some("json".to_string()),
            limit: None,
            skip: None,
            prefix: None,
            reverse: false,
        }
    }
}

impl ListOptions {
    /// True when the server is asked for JSON output
    pub fn wants_json(&self) -> bool {
        self.format.as_deref() == Some("json")
    }
}

/// A single operation inside a transaction
///
/// Deserializes from the wire form, `{"set": k, "value": v, "ttl": n}` or
/// `{"delete": k}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "TxnOpRepr")]
pub enum TxnOp {
    /// Store `value` under `key`
    Set {
        /// Target key
        key: String,
        /// Value placed verbatim in the JSON payload
        value: serde_json::Value,
        /// Seconds until the key expires
        ttl: Option<u64>,
    },
    /// Remove `key`
    Delete {
        /// Target key
        key: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TxnOpRepr {
    Set {
        set: String,
        value: serde_json::Value,
        #[serde(default)]
        ttl: Option<u64>,
    },
    Delete {
        delete: String,
    },
}

impl From<TxnOpRepr> for TxnOp {
    fn from(repr: TxnOpRepr) -> Self {
        match repr {
            TxnOpRepr::Set { set, value, ttl } => TxnOp::Set { key: set, value, ttl },
            TxnOpRepr::Delete { delete } => TxnOp::Delete { key: delete },
        }
    }
}

impl TxnOp {
    /// Shorthand for a set without ttl
    pub fn set(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        TxnOp::Set {
            key: key.into(),
            value: value.into(),
            ttl: None,
        }
    }

    /// Shorthand for a delete
    pub fn delete(key: impl Into<String>) -> Self {
        TxnOp::Delete { key: key.into() }
    }

    /// Returns the key this operation targets
    pub fn key(&self) -> &str {
        match self {
            TxnOp::Set { key, .. } => key,
            TxnOp::Delete { key } => key,
        }
    }
}

/// Options for [`crate::Client::create_access_token`]
#[derive(Debug, Clone, Default)]
pub struct AccessTokenOptions {
    /// Restrict the token to keys with this prefix
    pub prefix: Option<String>,
    /// Comma separated permissions, e.g. `read,write`
    pub permissions: Option<String>,
    /// Seconds until the token expires
    pub ttl: Option<u64>,
}

/// Bucket policy fields, used on creation and on update
#[derive(Debug, Clone, Default)]
pub struct BucketPolicy {
    /// Key granting full access
    pub secret_key: Option<String>,
    /// Key granting write access
    pub write_key: Option<String>,
    /// Key granting read access
    pub read_key: Option<String>,
    /// Key used to sign access tokens
    pub signing_key: Option<String>,
    /// Default ttl in seconds for new keys
    pub default_ttl: Option<u64>,
}

/// Options for [`crate::Client::create_bucket`]
#[derive(Debug, Clone, Default)]
pub struct CreateBucketOptions {
    /// Service endpoint (default: https://kvdb.io)
    pub base_url: Option<String>,
    /// Initial policy
    pub policy: BucketPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from("v"), Value::Text("v".to_string()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Binary(Bytes::from_static(&[1, 2])));
        assert_eq!(Value::from(json!({"a": 1})), Value::Json(json!({"a": 1})));
    }

    #[test]
    fn test_value_json_from_serializable() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
            age: u32,
        }
        let value = Value::json(&User { name: "ann", age: 7 }).unwrap();
        assert_eq!(value, Value::Json(json!({"name": "ann", "age": 7})));
    }

    #[test]
    fn test_payload_accessors() {
        let text = Payload::Text("hi".to_string());
        assert_eq!(text.as_text(), Some("hi"));
        assert!(!text.is_json());
        assert_eq!(text.into_json(), json!("hi"));

        let data = Payload::Json(json!([1, 2]));
        assert!(data.as_text().is_none());
        assert_eq!(data.to_string(), "[1,2]");
        let items: Vec<u32> = data.deserialize().unwrap();
        assert_eq!(items, vec![1, 2]);

        let raw = Payload::Binary(Bytes::from_static(&[0, 255]));
        assert_eq!(raw.as_bytes(), Some(&[0u8, 255][..]));
        assert!(raw.as_text().is_none());
        assert_eq!(raw.into_json(), json!([0, 255]));
    }

    #[test]
    fn test_list_options_default_format() {
        let options = ListOptions::default();
        assert!(options.wants_json());
        let options = ListOptions { format: None, ..Default::default() };
        assert!(!options.wants_json());
    }

    #[test]
    fn test_txn_op_from_wire_form() {
        let ops: Vec<TxnOp> = serde_json::from_str(
            r#"[{"set": "a", "value": {"n": 1}, "ttl": 60}, {"delete": "b"}, {"set": "c", "value": "x"}]"#,
        )
        .unwrap();
        assert_eq!(
            ops,
            vec![
                TxnOp::Set { key: "a".to_string(), value: json!({"n": 1}), ttl: Some(60) },
                TxnOp::delete("b"),
                TxnOp::set("c", "x"),
            ]
        );

        let bad: std::result::Result<Vec<TxnOp>, _> = serde_json::from_str(r#"[{"get": "a"}]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_txn_op_key() {
        assert_eq!(TxnOp::set("a", "1").key(), "a");
        assert_eq!(TxnOp::delete("b").key(), "b");
    }
}
