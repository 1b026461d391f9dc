//! Typed view of an inbound file-arrival notification.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use std::path::PathBuf;

use super::error::MessageError;
use super::types::{Message, MessageKind};

/// Host and path parts of a notification `uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUri {
    pub scheme: Option<String>,
    /// Empty for local URIs such as `file:///data/x` or bare paths.
    pub host: String,
    pub path: PathBuf,
}

impl FileUri {
    /// Splits `scheme://host/path` (or a bare path) into its parts.
    pub fn parse(uri: &str) -> Self {
        let (scheme, rest) = match uri.split_once("://") {
            Some((scheme, rest)) => (Some(scheme.to_string()), rest),
            None => (None, uri),
        };

        let (authority, path) = if scheme.is_some() {
            match rest.find('/') {
                Some(idx) => (&rest[..idx], &rest[idx..]),
                None => (rest, ""),
            }
        } else {
            ("", rest)
        };

        // Drop credentials and port, keep the bare host name.
        let host = authority.rsplit('@').next().unwrap_or_default();
        let host = match host.rsplit_once(':') {
            Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
            _ => host,
        };

        let path = urlencoding::decode(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());

        Self {
            scheme,
            host: host.to_string(),
            path: PathBuf::from(path),
        }
    }

    /// File name component of the path.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// The fields of a file notification this runner relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct FileNotification {
    pub kind: MessageKind,
    pub platform_name: String,
    /// `sensor` may be a string or a list on the wire; always a list here.
    pub sensors: Vec<String>,
    pub orbit_number: u32,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub uri: FileUri,
    pub uid: Option<String>,
}

impl FileNotification {
    /// Extracts the notification fields from a decoded message.
    pub fn from_message(message: &Message) -> Result<Self, MessageError> {
        let platform_name = message
            .field("platform_name")
            .and_then(Value::as_str)
            .ok_or(MessageError::MissingField {
                field: "platform_name",
            })?
            .to_string();

        let orbit_number = message
            .field("orbit_number")
            .and_then(|v| match v {
                Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .ok_or(MessageError::MissingField {
                field: "orbit_number",
            })?;

        let start_time = message
            .field("start_time")
            .and_then(Value::as_str)
            .and_then(parse_time)
            .ok_or(MessageError::MissingField {
                field: "start_time",
            })?;

        let end_time = message
            .field("end_time")
            .and_then(Value::as_str)
            .and_then(parse_time);

        let uri = message
            .field("uri")
            .and_then(Value::as_str)
            .map(FileUri::parse)
            .ok_or(MessageError::MissingField { field: "uri" })?;

        let sensors = match message.field("sensor") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            kind: message.kind.clone(),
            platform_name,
            sensors,
            orbit_number,
            start_time,
            end_time,
            uri,
            uid: message
                .field("uid")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }
}

/// Parses ISO-8601 timestamps with or without offset and fraction.
pub fn parse_time(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}
