//! Completion messages announcing level-1 products.

use serde_json::{json, Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use super::types::{Message, MessageKind};

/// Processing level of a published product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductLevel {
    L1A,
    L1B,
}

impl ProductLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1A => "1A",
            Self::L1B => "1B",
        }
    }
}

impl fmt::Display for ProductLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn file_entry(path: &Path) -> (String, String) {
    let uri = format!("file://{}", path.display());
    let uid = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (uri, uid)
}

/// Builds the message announcing `files` at `level`.
///
/// The inbound data is copied and overridden. A level-1A product is a single
/// `file` message; level-1B products (or several files) form a `dataset`
/// message whose top-level `uri`/`uid` are replaced by a `dataset` list.
pub fn completion_message(
    input: &Value,
    files: &[PathBuf],
    level: ProductLevel,
    station: &str,
    sender: &str,
) -> Message {
    let mut data: Map<String, Value> = input.as_object().cloned().unwrap_or_default();

    let kind = match files {
        [single] if level == ProductLevel::L1A => {
            let (uri, uid) = file_entry(single);
            data.insert("uri".into(), Value::String(uri));
            data.insert("uid".into(), Value::String(uid));
            MessageKind::File
        }
        _ => {
            data.remove("uri");
            data.remove("uid");
            let dataset: Vec<Value> = files
                .iter()
                .map(|f| {
                    let (uri, uid) = file_entry(f);
                    json!({ "uri": uri, "uid": uid })
                })
                .collect();
            data.insert("dataset".into(), Value::Array(dataset));
            MessageKind::Dataset
        }
    };

    data.insert("format".into(), json!("EOS"));
    data.insert("data_processing_level".into(), json!(level.as_str()));
    data.insert("type".into(), json!("HDF4"));
    data.insert("sensor".into(), json!("modis"));

    let subject = format!("/EOS/{}/{}/polar/direct_readout", level, station);
    Message::new(subject, kind, sender, Value::Object(data))
}
