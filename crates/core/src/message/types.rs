use chrono::{NaiveDateTime, Utc};
use serde_json::Value;
use std::fmt;

use super::codec::PROTOCOL_VERSION;

/// Message type token of the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    File,
    Dataset,
    Collection,
    Other(String),
}

impl MessageKind {
    pub fn parse(token: &str) -> Self {
        match token {
            "file" => Self::File,
            "dataset" => Self::Dataset,
            "collection" => Self::Collection,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Dataset => "dataset",
            Self::Collection => "collection",
            Self::Other(s) => s,
        }
    }

    /// Whether the message announces data files.
    pub fn carries_files(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub subject: String,
    pub kind: MessageKind,
    /// `user@host` of the emitting process.
    pub sender: String,
    pub time: NaiveDateTime,
    pub version: String,
    pub data: Value,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(
        subject: impl Into<String>,
        kind: MessageKind,
        sender: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            subject: subject.into(),
            kind,
            sender: sender.into(),
            time: Utc::now().naive_utc(),
            version: PROTOCOL_VERSION.to_string(),
            data,
        }
    }

    /// Looks up a top-level data field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}
