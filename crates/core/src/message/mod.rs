//! Posttroll-style messages: the wire codec, the typed view of inbound
//! file notifications and the completion messages published downstream.

mod codec;
mod error;
mod notification;
mod outbound;
mod types;

pub use codec::{decode, encode, MAGIC, PROTOCOL_VERSION};
pub use error::MessageError;
pub use notification::{parse_time, FileNotification, FileUri};
pub use outbound::{completion_message, ProductLevel};
pub use types::{Message, MessageKind};
