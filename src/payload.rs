//! Inbound webhook payloads and their interpretation

use axum::body::Bytes;
use axum::http::request::Parts;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::net::SocketAddr;
use uuid::Uuid;

/// Format used for the acknowledgment timestamp and log lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Snapshot of one received webhook call
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub id: Uuid,
    pub method: String,
    pub url: String,
    pub client_ip: Option<String>,
    /// Header name/value pairs in the order they were received
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub received_at: DateTime<Local>,
}

impl InboundEvent {
    /// Build an event from the request head and its fully read body.
    /// `X-Forwarded-For` takes precedence over the peer address for the client IP.
    pub fn from_parts(parts: &Parts, body: Bytes, peer: Option<SocketAddr>) -> Self {
        let headers: Vec<(String, String)> = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let client_ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .or_else(|| peer.map(|addr| addr.ip().to_string()));

        Self {
            id: Uuid::now_v7(),
            method: parts.method.to_string(),
            url: parts.uri.to_string(),
            client_ip,
            headers,
            body,
            received_at: Local::now(),
        }
    }

    /// Value of the first header matching `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn timestamp(&self) -> String {
        self.received_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// How an inbound body was understood
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPayload {
    /// Body decoded into a JSON value tree
    Structured(Value),
    /// Body that is not JSON, decoded as UTF-8 with replacement
    RawText(String),
    /// Body declared as JSON by its content type that failed to decode
    Unparseable { text: String, error: String },
}

impl ParsedPayload {
    pub fn is_structured(&self) -> bool {
        matches!(self, ParsedPayload::Structured(_))
    }
}

/// Message forwarded to the notification service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage(String);

impl NotificationMessage {
    /// Returns None for an empty message, which is never forwarded
    pub fn new(message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        if message.is_empty() {
            None
        } else {
            Some(Self(message))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns true for `application/json` and `application/*+json` media types.
/// Parameters such as `charset` are ignored.
pub fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    media_type == "application/json"
        || (media_type.starts_with("application/") && media_type.ends_with("+json"))
}

/// Classify a body as structured JSON or raw text.
///
/// Every non-empty body is tried as JSON, whatever its content type. A decode
/// failure is never an error: it falls back to the body text, tagged as
/// `Unparseable` only when the sender claimed it was JSON.
pub fn interpret(content_type: Option<&str>, body: &[u8]) -> ParsedPayload {
    if body.is_empty() {
        return ParsedPayload::RawText(String::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value) => ParsedPayload::Structured(value),
        Err(e) => {
            let text = String::from_utf8_lossy(body).into_owned();
            if content_type.is_some_and(is_json_content_type) {
                ParsedPayload::Unparseable {
                    text,
                    error: e.to_string(),
                }
            } else {
                ParsedPayload::RawText(text)
            }
        }
    }
}

/// Pull `data.message` out of a structured payload.
/// Missing paths, non-string values and empty strings all yield None.
pub fn extract_message(payload: &ParsedPayload) -> Option<NotificationMessage> {
    let ParsedPayload::Structured(value) = payload else {
        return None;
    };

    value
        .get("data")
        .and_then(|d| d.get("message"))
        .and_then(|m| m.as_str())
        .and_then(|m| NotificationMessage::new(m))
}
