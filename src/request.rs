//! Request construction: URLs, credentials and bodies
//!
//! Everything here is pure; [`crate::Client`] wires these pieces together and hands
//! the result to a [`crate::Transport`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::config::{AuthMode, ClientConfig};
use crate::error::{Error, Result};
use crate::transport::HttpRequest;
use crate::types::{AccessTokenOptions, BucketPolicy, ListOptions, SetOptions, TxnOp, Value};

/// `content-type` for JSON bodies
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// `content-type` for form bodies
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
/// `content-type` for counter deltas
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Characters allowed unencoded in URI path segments per RFC 3986.
/// `/` is kept so keys can carry their own hierarchy.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@')
    .remove(b'/');

/// A bucket id is a single segment, so `/` is encoded too.
const BUCKET_SEGMENT: &AsciiSet = &PATH_SEGMENT.add(b'/');

/// Unreserved set of a single query component.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Validate a key and strip its leading slashes.
///
/// # Errors
/// Returns `Error::Validation` for keys that are blank or consist only of slashes.
pub fn normalize_key(key: &str) -> Result<&str> {
    let stripped = key.trim_start_matches('/');
    if key.trim().is_empty() || stripped.is_empty() {
        return Err(Error::Validation("key must be a non-empty string".to_string()));
    }
    Ok(stripped)
}

/// Percent-encode a normalized key for use in a URI path.
fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, PATH_SEGMENT).to_string()
}

fn encode_bucket(bucket: &str) -> String {
    utf8_percent_encode(bucket, BUCKET_SEGMENT).to_string()
}

fn ttl_query(ttl: Option<u64>) -> String {
    ttl.map(|t| format!("?ttl={}", t)).unwrap_or_default()
}

/// `{base}/{bucket}/{key}[?ttl=N]`
pub fn key_url(config: &ClientConfig, key: &str, ttl: Option<u64>) -> Result<String> {
    let key = normalize_key(key)?;
    Ok(format!(
        "{}/{}{}",
        bucket_url(config),
        encode_key(key),
        ttl_query(ttl)
    ))
}

/// `{base}/{bucket}`
pub fn bucket_url(config: &ClientConfig) -> String {
    format!("{}/{}", config.base_url, encode_bucket(&config.bucket))
}

/// `{base}/{bucket}/` followed by `?{query}` when the query is not empty
pub fn list_url(config: &ClientConfig, query: &str) -> String {
    if query.is_empty() {
        format!("{}/", bucket_url(config))
    } else {
        format!("{}/?{}", bucket_url(config), query)
    }
}

/// `{base}/{bucket}/tokens/`
pub fn tokens_url(config: &ClientConfig) -> String {
    format!("{}/tokens/", bucket_url(config))
}

/// The `Authorization` header value for a credential, if the mode uses one.
pub fn auth_header(mode: AuthMode, token: Option<&str>) -> Option<String> {
    let token = token.filter(|t| !t.is_empty())?;
    match mode {
        AuthMode::Basic => Some(format!("Basic {}", STANDARD.encode(format!("{}:", token)))),
        AuthMode::Bearer => Some(format!("Bearer {}", token)),
        AuthMode::Query => None,
    }
}

/// Append `access_token=...` in query mode; other modes return the URL unchanged.
pub fn append_access_token(url: &str, mode: AuthMode, token: Option<&str>) -> String {
    match token.filter(|t| !t.is_empty()) {
        Some(token) if mode == AuthMode::Query => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!(
                "{}{}access_token={}",
                url,
                separator,
                utf8_percent_encode(token, QUERY_COMPONENT)
            )
        }
        _ => url.to_string(),
    }
}

/// Attach the configured credential. Runs after every other URL and header step.
pub fn authorize(config: &ClientConfig, mut request: HttpRequest) -> HttpRequest {
    let token = config.token.as_deref();
    if let Some(value) = auth_header(config.auth_mode, token) {
        request = request.header("authorization", value);
    }
    request.url = append_access_token(&request.url, config.auth_mode, token);
    request
}

/// A serialized request body
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// Wire bytes
    pub bytes: Bytes,
    /// `content-type` to send, `None` leaves it to the transport
    pub content_type: Option<String>,
}

/// Encode a value for set/update.
///
/// An explicit `json` flag wins, then objects and arrays are JSON-encoded
/// implicitly; everything else goes out as its plain text form. Binary data is
/// only JSON-encoded when the flag asks for it.
pub fn serialize_value(value: &Value, options: &SetOptions) -> Result<Body> {
    let explicit_type = options.content_type.clone().filter(|ct| !ct.is_empty());
    let implicit_json = matches!(value, Value::Json(v) if v.is_object() || v.is_array());

    if options.json || implicit_json {
        let bytes = match value {
            Value::Text(s) => serde_json::to_vec(s)?,
            Value::Binary(b) => serde_json::to_vec(b.as_ref())?,
            Value::Json(v) => serde_json::to_vec(v)?,
        };
        return Ok(Body {
            bytes: Bytes::from(bytes),
            content_type: Some(explicit_type.unwrap_or_else(|| CONTENT_TYPE_JSON.to_string())),
        });
    }

    let bytes = match value {
        Value::Text(s) => Bytes::from(s.clone()),
        Value::Binary(b) => b.clone(),
        Value::Json(serde_json::Value::String(s)) => Bytes::from(s.clone()),
        Value::Json(v) => Bytes::from(v.to_string()),
    };
    Ok(Body {
        bytes,
        content_type: explicit_type,
    })
}

/// Signed delta body: `+N` for non-negative amounts, `-N` otherwise.
pub fn increment_body(amount: i64) -> String {
    if amount >= 0 {
        format!("+{}", amount)
    } else {
        amount.to_string()
    }
}

/// Delta sent by a decrement, always non-positive.
pub fn decrement_amount(amount: i64) -> i64 {
    -amount.saturating_abs()
}

/// Query string for a list request; empty when nothing is set.
pub fn list_query(options: &ListOptions) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if options.values {
        query.append_pair("values", "true");
    }
    if let Some(format) = options.format.as_deref().filter(|f| !f.is_empty()) {
        query.append_pair("format", format);
    }
    if let Some(limit) = options.limit {
        query.append_pair("limit", &limit.to_string());
    }
    if let Some(skip) = options.skip {
        query.append_pair("skip", &skip.to_string());
    }
    if let Some(prefix) = options.prefix.as_deref().filter(|p| !p.is_empty()) {
        query.append_pair("prefix", prefix);
    }
    if options.reverse {
        query.append_pair("reverse", "true");
    }
    query.finish()
}

#[derive(Serialize)]
struct TxnBody<'a> {
    txn: Vec<WireOp<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireOp<'a> {
    Set {
        set: &'a str,
        value: &'a serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        ttl: Option<u64>,
    },
    Delete {
        delete: &'a str,
    },
}

/// `{"txn":[...]}` with operations in caller order.
pub fn transaction_body(operations: &[TxnOp]) -> Result<Bytes> {
    let txn = operations
        .iter()
        .map(|op| match op {
            TxnOp::Set { key, value, ttl } => WireOp::Set {
                set: key,
                value,
                ttl: *ttl,
            },
            TxnOp::Delete { key } => WireOp::Delete { delete: key },
        })
        .collect();
    Ok(Bytes::from(serde_json::to_vec(&TxnBody { txn })?))
}

fn append_opt(form: &mut form_urlencoded::Serializer<'_, String>, name: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        form.append_pair(name, value);
    }
}

/// Form body for a new access token.
pub fn access_token_form(options: &AccessTokenOptions) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    append_opt(&mut form, "prefix", options.prefix.as_deref());
    append_opt(&mut form, "permissions", options.permissions.as_deref());
    if let Some(ttl) = options.ttl {
        form.append_pair("ttl", &ttl.to_string());
    }
    form.finish()
}

/// Form body for bucket creation (`email` set) or a policy update.
pub fn policy_form(email: Option<&str>, policy: &BucketPolicy) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    append_opt(&mut form, "email", email);
    append_opt(&mut form, "secret_key", policy.secret_key.as_deref());
    append_opt(&mut form, "write_key", policy.write_key.as_deref());
    append_opt(&mut form, "read_key", policy.read_key.as_deref());
    append_opt(&mut form, "signing_key", policy.signing_key.as_deref());
    if let Some(ttl) = policy.default_ttl {
        form.append_pair("default_ttl", &ttl.to_string());
    }
    form.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(mode: AuthMode, token: Option<&str>) -> ClientConfig {
        ClientConfig {
            bucket: "b1".to_string(),
            token: token.map(str::to_string),
            auth_mode: mode,
            base_url: "https://h".to_string(),
        }
    }

    #[test]
    fn test_normalize_key_strips_leading_slashes() {
        assert_eq!(normalize_key("/a/b").unwrap(), "a/b");
        assert_eq!(normalize_key("a/b").unwrap(), "a/b");
        assert_eq!(normalize_key("///a").unwrap(), "a");
    }

    #[test]
    fn test_normalize_key_idempotent() {
        for key in ["/a/b", "a/b", "//x//y/", "users:email:a@b.c", " spaced "] {
            let once = normalize_key(key).unwrap();
            assert_eq!(normalize_key(once).unwrap(), once);
        }
    }

    #[test]
    fn test_normalize_key_rejects_blank() {
        assert!(matches!(normalize_key(""), Err(Error::Validation(_))));
        assert!(matches!(normalize_key("   "), Err(Error::Validation(_))));
        assert!(matches!(normalize_key("///"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_key_url() {
        let cfg = config(AuthMode::Basic, None);
        assert_eq!(key_url(&cfg, "/k", None).unwrap(), "https://h/b1/k");
        assert_eq!(key_url(&cfg, "k", Some(60)).unwrap(), "https://h/b1/k?ttl=60");
        assert_eq!(key_url(&cfg, "a b#c", None).unwrap(), "https://h/b1/a%20b%23c");
        assert_eq!(key_url(&cfg, "dir/sub:key", None).unwrap(), "https://h/b1/dir/sub:key");
    }

    #[test]
    fn test_bucket_urls() {
        let cfg = config(AuthMode::Basic, None);
        assert_eq!(bucket_url(&cfg), "https://h/b1");
        assert_eq!(list_url(&cfg, ""), "https://h/b1/");
        assert_eq!(list_url(&cfg, "format=json"), "https://h/b1/?format=json");
        assert_eq!(tokens_url(&cfg), "https://h/b1/tokens/");
    }

    #[test]
    fn test_bucket_id_is_encoded() {
        let mut cfg = config(AuthMode::Query, Some("tok"));
        cfg.bucket = "my bucket?x/y".to_string();
        assert_eq!(bucket_url(&cfg), "https://h/my%20bucket%3Fx%2Fy");
        assert_eq!(key_url(&cfg, "k", Some(5)).unwrap(), "https://h/my%20bucket%3Fx%2Fy/k?ttl=5");

        let url = append_access_token(&list_url(&cfg, ""), cfg.auth_mode, cfg.token.as_deref());
        assert_eq!(url, "https://h/my%20bucket%3Fx%2Fy/?access_token=tok");
    }

    #[test]
    fn test_auth_header_modes() {
        assert_eq!(
            auth_header(AuthMode::Basic, Some("tok")),
            Some(format!("Basic {}", STANDARD.encode("tok:")))
        );
        assert_eq!(auth_header(AuthMode::Basic, Some("tok")).unwrap(), "Basic dG9rOg==");
        assert_eq!(auth_header(AuthMode::Bearer, Some("tok")).unwrap(), "Bearer tok");
        assert_eq!(auth_header(AuthMode::Query, Some("tok")), None);
    }

    #[test]
    fn test_auth_header_without_token() {
        assert_eq!(auth_header(AuthMode::Basic, None), None);
        assert_eq!(auth_header(AuthMode::Bearer, Some("")), None);
    }

    #[test]
    fn test_append_access_token() {
        assert_eq!(
            append_access_token("https://h/b/k", AuthMode::Query, Some("tok")),
            "https://h/b/k?access_token=tok"
        );
        assert_eq!(
            append_access_token("https://h/b/k?ttl=5", AuthMode::Query, Some("tok")),
            "https://h/b/k?ttl=5&access_token=tok"
        );
        assert_eq!(
            append_access_token("https://h/b/k", AuthMode::Query, Some("a b&c")),
            "https://h/b/k?access_token=a%20b%26c"
        );
        assert_eq!(append_access_token("https://h/b/k", AuthMode::Bearer, Some("tok")), "https://h/b/k");
        assert_eq!(append_access_token("https://h/b/k", AuthMode::Query, None), "https://h/b/k");
    }

    #[test]
    fn test_authorize_is_last_step() {
        let cfg = config(AuthMode::Query, Some("tok"));
        let request = HttpRequest::new(http::Method::GET, list_url(&cfg, "format=json"));
        let request = authorize(&cfg, request);
        assert_eq!(request.url, "https://h/b1/?format=json&access_token=tok");
        assert!(request.header_value("authorization").is_none());

        let cfg = config(AuthMode::Bearer, Some("tok"));
        let request = HttpRequest::new(http::Method::GET, "https://h/b1/k")
            .header("Authorization", "Bearer caller");
        let request = authorize(&cfg, request);
        assert_eq!(request.header_value("authorization"), Some("Bearer tok"));
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn test_serialize_structured_value_as_json() {
        let body = serialize_value(&Value::Json(json!({"a": 1})), &SetOptions::default()).unwrap();
        assert_eq!(body.bytes, Bytes::from_static(br#"{"a":1}"#));
        assert_eq!(body.content_type.as_deref(), Some(CONTENT_TYPE_JSON));

        let body = serialize_value(&Value::Json(json!([1, 2])), &SetOptions::default()).unwrap();
        assert_eq!(body.bytes, Bytes::from_static(b"[1,2]"));
    }

    #[test]
    fn test_serialize_text_verbatim() {
        let body = serialize_value(&Value::from("v"), &SetOptions::default()).unwrap();
        assert_eq!(body.bytes, Bytes::from_static(b"v"));
        assert_eq!(body.content_type, None);
    }

    #[test]
    fn test_serialize_json_flag_forces_encoding() {
        let options = SetOptions { json: true, ..Default::default() };
        let body = serialize_value(&Value::from("v"), &options).unwrap();
        assert_eq!(body.bytes, Bytes::from_static(b"\"v\""));
        assert_eq!(body.content_type.as_deref(), Some(CONTENT_TYPE_JSON));
    }

    #[test]
    fn test_serialize_binary_never_implicit_json() {
        let body = serialize_value(&Value::from(vec![0u8, 159, 146]), &SetOptions::default()).unwrap();
        assert_eq!(body.bytes, Bytes::from_static(&[0, 159, 146]));
        assert_eq!(body.content_type, None);
    }

    #[test]
    fn test_serialize_json_scalars_as_text() {
        let options = SetOptions::default();
        let body = serialize_value(&Value::Json(json!("plain")), &options).unwrap();
        assert_eq!(body.bytes, Bytes::from_static(b"plain"));
        assert_eq!(body.content_type, None);

        let body = serialize_value(&Value::Json(json!(42)), &options).unwrap();
        assert_eq!(body.bytes, Bytes::from_static(b"42"));
    }

    #[test]
    fn test_serialize_content_type_override() {
        let options = SetOptions {
            content_type: Some("application/vnd.custom+json".to_string()),
            ..Default::default()
        };
        let body = serialize_value(&Value::Json(json!({"a": 1})), &options).unwrap();
        assert_eq!(body.content_type.as_deref(), Some("application/vnd.custom+json"));

        let options = SetOptions {
            content_type: Some("text/csv".to_string()),
            ..Default::default()
        };
        let body = serialize_value(&Value::from("a,b"), &options).unwrap();
        assert_eq!(body.content_type.as_deref(), Some("text/csv"));
    }

    #[test]
    fn test_increment_body_sign() {
        assert_eq!(increment_body(3), "+3");
        assert_eq!(increment_body(0), "+0");
        assert_eq!(increment_body(-3), "-3");
    }

    #[test]
    fn test_decrement_matches_negative_increment() {
        assert_eq!(increment_body(decrement_amount(2)), increment_body(-2));
        assert_eq!(increment_body(decrement_amount(-2)), "-2");
        assert_eq!(increment_body(decrement_amount(0)), "+0");
    }

    #[test]
    fn test_list_query() {
        assert_eq!(list_query(&ListOptions::default()), "format=json");
        let options = ListOptions {
            values: true,
            format: Some("json".to_string()),
            limit: Some(10),
            skip: Some(5),
            prefix: Some("users:".to_string()),
            reverse: true,
        };
        assert_eq!(
            list_query(&options),
            "values=true&format=json&limit=10&skip=5&prefix=users%3A&reverse=true"
        );
        let options = ListOptions { format: None, ..Default::default() };
        assert_eq!(list_query(&options), "");
    }

    #[test]
    fn test_transaction_body_preserves_order() {
        let ops = vec![
            TxnOp::Set {
                key: "A".to_string(),
                value: json!("user 1"),
                ttl: Some(30),
            },
            TxnOp::delete("B"),
        ];
        let body = transaction_body(&ops).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            parsed,
            json!({"txn": [{"set": "A", "value": "user 1", "ttl": 30}, {"delete": "B"}]})
        );

        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.find("\"A\"").unwrap() < text.find("\"B\"").unwrap());
    }

    #[test]
    fn test_transaction_body_omits_absent_ttl() {
        let body = transaction_body(&[TxnOp::set("k", json!({"n": 1}))]).unwrap();
        assert_eq!(body, Bytes::from_static(br#"{"txn":[{"set":"k","value":{"n":1}}]}"#));
    }

    #[test]
    fn test_access_token_form() {
        assert_eq!(access_token_form(&AccessTokenOptions::default()), "");
        let options = AccessTokenOptions {
            prefix: Some("users:".to_string()),
            permissions: Some("read,write".to_string()),
            ttl: Some(3600),
        };
        assert_eq!(
            access_token_form(&options),
            "prefix=users%3A&permissions=read%2Cwrite&ttl=3600"
        );
    }

    #[test]
    fn test_policy_form() {
        let policy = BucketPolicy {
            secret_key: Some("s3cret".to_string()),
            read_key: Some(String::new()),
            default_ttl: Some(86400),
            ..Default::default()
        };
        assert_eq!(
            policy_form(Some("me@example.com"), &policy),
            "email=me%40example.com&secret_key=s3cret&default_ttl=86400"
        );
        assert_eq!(policy_form(None, &BucketPolicy::default()), "");
    }
}
