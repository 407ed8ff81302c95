//! Response classification and decoding

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::transport::HttpResponse;
use crate::types::Payload;

/// Turn any non-2xx response into `Error::Request`, leaving the body undecoded.
pub fn check_status(response: HttpResponse) -> Result<HttpResponse> {
    if response.status.is_success() {
        return Ok(response);
    }
    Err(Error::Request {
        status: response.status.as_u16(),
        status_text: response.status_text,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}

/// Parse `text` as JSON, keeping the text when it is not valid JSON.
pub fn parse_lenient(text: String) -> Payload {
    match serde_json::from_str(&text) {
        Ok(value) => Payload::Json(value),
        Err(_) => Payload::Text(text),
    }
}

/// Decode a body according to its content type.
///
/// JSON is parsed leniently and `text/*` is always text. Any other body is text
/// when it is valid UTF-8 and raw bytes otherwise.
pub fn decode_body(content_type: Option<&str>, body: Bytes) -> Payload {
    match content_type {
        Some(ct) if ct.contains("application/json") => {
            parse_lenient(String::from_utf8_lossy(&body).into_owned())
        }
        Some(ct) if ct.trim_start().starts_with("text/") => {
            Payload::Text(String::from_utf8_lossy(&body).into_owned())
        }
        _ => match String::from_utf8(body.to_vec()) {
            Ok(text) => Payload::Text(text),
            Err(_) => Payload::Binary(body),
        },
    }
}

/// Classify, then decode.
pub fn decode(response: HttpResponse) -> Result<Payload> {
    let response = check_status(response)?;
    Ok(decode_body(response.content_type.as_deref(), response.body))
}

/// Classify, then return the raw body text.
pub fn decode_text(response: HttpResponse) -> Result<String> {
    let response = check_status(response)?;
    Ok(String::from_utf8_lossy(&response.body).into_owned())
}

/// Re-parse a text payload as JSON; decoded payloads pass through.
pub fn force_json(payload: Payload) -> Payload {
    match payload {
        Payload::Text(text) => parse_lenient(text),
        other => other,
    }
}
