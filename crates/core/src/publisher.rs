//! Completion message publishing.
//!
//! Pipelines hand messages to a [`PublishHandle`]; a single [`Publisher`]
//! task drains the queue into the configured sink so that a slow consumer
//! never stalls a pipeline.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::message::{Message, ProductLevel};
use crate::metrics::MESSAGES_PUBLISHED;
use crate::transport::MessageSink;

/// A message queued for publishing.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub level: ProductLevel,
    pub message: Message,
}

/// Handle for queueing completion messages.
///
/// This is cheaply cloneable and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct PublishHandle {
    tx: mpsc::Sender<Outbound>,
}

impl PublishHandle {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }

    /// Queues a message. Waits while the queue is full; logs and drops the
    /// message if the publisher has stopped.
    pub async fn publish(&self, level: ProductLevel, message: Message) {
        debug!("Queueing {} message {}", level, message.subject);
        if let Err(e) = self.tx.send(Outbound { level, message }).await {
            error!("Failed to queue completion message: {}", e);
        }
    }
}

/// Background task writing queued messages to a sink.
pub struct Publisher {
    rx: mpsc::Receiver<Outbound>,
    sink: Arc<dyn MessageSink>,
}

impl Publisher {
    pub fn new(rx: mpsc::Receiver<Outbound>, sink: Arc<dyn MessageSink>) -> Self {
        Self { rx, sink }
    }

    /// Sends messages until every handle is dropped and the queue is empty.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Publisher started on {}", self.sink.sink_name());

        while let Some(outbound) = self.rx.recv().await {
            match self.sink.send(&outbound.message).await {
                Ok(()) => {
                    info!(
                        "Published {} {}",
                        outbound.message.kind, outbound.message.subject
                    );
                    MESSAGES_PUBLISHED
                        .with_label_values(&[outbound.level.as_str()])
                        .inc();
                }
                Err(e) => error!("Failed to publish {}: {}", outbound.message.subject, e),
            }
        }

        info!("Publisher shutting down");
    }
}

/// Creates a publishing queue.
///
/// Returns the handle to clone into pipelines and the publisher to spawn
/// with `tokio::spawn(publisher.run())`.
pub fn create_publisher(sink: Arc<dyn MessageSink>, capacity: usize) -> (PublishHandle, Publisher) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PublishHandle::new(tx), Publisher::new(rx, sink))
}
