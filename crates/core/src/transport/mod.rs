//! Message transport.
//!
//! Messages travel as newline-delimited text lines over TCP. Inbound
//! notifications come from a [`MessageSource`]; completion messages leave
//! through a [`MessageSink`].

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{TcpPublisher, TcpSubscriber};

use async_trait::async_trait;

use crate::message::Message;

/// Events produced by a message source.
#[derive(Debug)]
pub enum SourceEvent {
    /// A decoded message.
    Message(Message),
    /// The source has no more messages.
    Closed,
}

/// Where inbound messages come from.
///
/// Implementations handle decoding and reconnection internally.
#[async_trait]
pub trait MessageSource: Send + 'static {
    /// Waits for the next message.
    async fn next_message(&mut self) -> Result<SourceEvent, TransportError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

/// Where completion messages go.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), TransportError>;

    /// Human-readable name for logging.
    fn sink_name(&self) -> &str;
}
