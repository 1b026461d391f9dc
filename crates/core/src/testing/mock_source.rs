//! Mock message source for testing.

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::message::Message;
use crate::transport::{MessageSource, SourceEvent, TransportError};

/// Source replaying a fixed list of messages, then reporting closed.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    messages: VecDeque<Message>,
}

impl ScriptedSource {
    pub fn new(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
        }
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn next_message(&mut self) -> Result<SourceEvent, TransportError> {
        Ok(match self.messages.pop_front() {
            Some(message) => SourceEvent::Message(message),
            None => SourceEvent::Closed,
        })
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}
