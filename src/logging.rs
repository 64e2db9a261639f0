//! Middleware for logging requests and responses.

use axum::{
    body::Body,
    extract::Request,
    http::{StatusCode, request, response},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::Error;

/// Bodies longer than this many bytes are truncated in `info` logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

const REDACTED: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Passwords and session tokens are redacted in both.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            return Error::InvalidRequest(format!("Could not read request body: {error}"))
                .into_response();
        }
    };
    log_request(&parts, &redact_secrets(&String::from_utf8_lossy(&body_bytes)));

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    log_response(&parts, &redact_secrets(&String::from_utf8_lossy(&body_bytes)));

    Response::from_parts(parts, Body::from(body_bytes))
}

/// Replace the value of every JSON field that holds a password or a token.
///
/// Malformed JSON may still carry a password, so only its length is kept.
/// An empty body stays empty.
fn redact_secrets(body_text: &str) -> String {
    if body_text.is_empty() {
        return String::new();
    }

    match serde_json::from_str::<Value>(body_text) {
        Ok(mut json) => {
            redact_value(&mut json);
            json.to_string()
        }
        Err(_) => format!("<{} bytes, not JSON>", body_text.len()),
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if is_secret_field(key) {
                    *field = Value::String(REDACTED.to_owned());
                } else {
                    redact_value(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}

fn is_secret_field(name: &str) -> bool {
    let name = name.to_ascii_lowercase();

    name.contains("password") || name == "token"
}

/// The longest prefix of `text` that fits in `limit` bytes without splitting a character.
fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    &text[..end]
}

fn log_request(parts: &request::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {} {}\nbody: {}...",
            parts.method,
            parts.uri,
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!(
            "Received request: {} {}\nbody: {body:?}",
            parts.method,
            parts.uri
        );
    }
}

fn log_response(parts: &response::Parts, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {}\nbody: {}...",
            parts.status,
            truncate(body, LOG_BODY_LENGTH_LIMIT)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {}\nbody: {body:?}", parts.status);
    }
}
