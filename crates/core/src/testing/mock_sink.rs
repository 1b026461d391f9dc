//! Mock message sink for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::message::Message;
use crate::transport::{MessageSink, TransportError};

/// Sink that keeps every message it is given.
///
/// Can be told to fail its first `n` sends to exercise error paths.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Arc<RwLock<Vec<Message>>>,
    failures_left: Arc<RwLock<usize>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose first `n` sends fail.
    pub fn failing_first(n: usize) -> Self {
        Self {
            messages: Arc::default(),
            failures_left: Arc::new(RwLock::new(n)),
        }
    }

    /// Get all recorded messages.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Get the number of recorded messages.
    pub async fn count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        {
            let mut left = self.failures_left.write().await;
            if *left > 0 {
                *left -= 1;
                return Err(TransportError::Closed);
            }
        }
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "recording"
    }
}
