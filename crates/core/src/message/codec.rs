//! Text encoding of messages.
//!
//! `pytroll:/<subject> <type> <sender> <time> <version> [<mime> <payload>]`,
//! one message per line.

use chrono::NaiveDateTime;
use serde_json::Value;

use super::error::MessageError;
use super::types::{Message, MessageKind};

/// Prefix of every encoded message.
pub const MAGIC: &str = "pytroll:/";

/// Protocol version written by this runner.
pub const PROTOCOL_VERSION: &str = "v1.01";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Encodes a message into its single-line wire form.
pub fn encode(message: &Message) -> String {
    let mut out = format!(
        "{}{} {} {} {} {}",
        MAGIC,
        message.subject,
        message.kind,
        message.sender,
        message.time.format(TIME_FORMAT),
        message.version
    );

    match &message.data {
        Value::Null => {}
        Value::String(text) => {
            out.push_str(" text/ascii ");
            out.push_str(text);
        }
        data => {
            out.push_str(" application/json ");
            out.push_str(&data.to_string());
        }
    }

    out
}

/// Decodes a single-line wire message.
pub fn decode(raw: &str) -> Result<Message, MessageError> {
    let raw = raw.trim_end_matches(['\r', '\n']);
    let body = raw
        .strip_prefix(MAGIC)
        .ok_or_else(|| MessageError::BadMagic(raw.chars().take(32).collect()))?;

    let mut parts = body.splitn(7, ' ');
    let mut next = |field: &'static str| {
        parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(MessageError::MissingHeader { field })
    };

    let subject = next("subject")?.to_string();
    let kind = MessageKind::parse(next("type")?);
    let sender = next("sender")?.to_string();
    let time_str = next("time")?;
    let version = next("version")?.to_string();

    let time = NaiveDateTime::parse_from_str(time_str, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| MessageError::InvalidTime(time_str.to_string()))?;

    let data = match parts.next() {
        None => Value::Null,
        Some("application/json") => serde_json::from_str(parts.next().unwrap_or("null"))?,
        Some("text/ascii") => Value::String(parts.next().unwrap_or_default().to_string()),
        Some(other) => return Err(MessageError::UnsupportedMime(other.to_string())),
    };

    Ok(Message {
        subject,
        kind,
        sender,
        time,
        version,
        data,
    })
}
