//! TCP transport: one subscriber connection per upstream address, one
//! listening socket fanning completion messages out to every subscriber.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{MessageSink, MessageSource, SourceEvent, TransportError};
use crate::message::{decode, encode, Message};
use crate::metrics::SUBSCRIBERS;

// ============================================================================
// Subscriber
// ============================================================================

/// Reads messages from an upstream publisher, reconnecting when the
/// connection drops.
pub struct TcpSubscriber {
    address: String,
    reconnect_delay: Duration,
    lines: Option<Lines<BufReader<OwnedReadHalf>>>,
    name: String,
}

impl TcpSubscriber {
    pub fn new(address: impl Into<String>, reconnect_delay: Duration) -> Self {
        let address = address.into();
        Self {
            name: format!("tcp://{}", address),
            address,
            reconnect_delay,
            lines: None,
        }
    }

    async fn connect(&mut self) {
        loop {
            match TcpStream::connect(&self.address).await {
                Ok(stream) => {
                    info!("Subscribed to {}", self.address);
                    let (read, _write) = stream.into_split();
                    self.lines = Some(BufReader::new(read).lines());
                    return;
                }
                Err(e) => {
                    warn!(
                        "Cannot connect to {}: {}, retrying in {:?}",
                        self.address, e, self.reconnect_delay
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl MessageSource for TcpSubscriber {
    async fn next_message(&mut self) -> Result<SourceEvent, TransportError> {
        loop {
            let lines = match self.lines.as_mut() {
                Some(lines) => lines,
                None => {
                    self.connect().await;
                    continue;
                }
            };

            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode(&line) {
                        Ok(message) => return Ok(SourceEvent::Message(message)),
                        Err(e) => debug!("Skipping undecodable line from {}: {}", self.address, e),
                    }
                }
                Ok(None) => {
                    warn!("Connection to {} closed", self.address);
                    self.lines = None;
                    tokio::time::sleep(self.reconnect_delay).await;
                }
                Err(e) => {
                    warn!("Read from {} failed: {}", self.address, e);
                    self.lines = None;
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Accepts subscriber connections and writes every published message to
/// each of them.
pub struct TcpPublisher {
    sender: broadcast::Sender<Arc<str>>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl TcpPublisher {
    /// Binds `address` and starts accepting subscribers.
    pub async fn bind(address: &str, capacity: usize) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| TransportError::Bind {
                address: address.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let (sender, _) = broadcast::channel(capacity.max(1));
        info!("Publishing on {}", local_addr);

        let accept_task = tokio::spawn(accept_loop(listener, sender.clone()));
        Ok(Self {
            sender,
            local_addr,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of subscribers currently connected.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Drop for TcpPublisher {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, sender: broadcast::Sender<Arc<str>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("Subscriber connected from {}", peer);
                let rx = sender.subscribe();
                tokio::spawn(serve_subscriber(stream, peer, rx));
            }
            Err(e) => {
                warn!("Failed to accept subscriber: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn serve_subscriber(
    mut stream: TcpStream,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<Arc<str>>,
) {
    SUBSCRIBERS.inc();
    loop {
        match rx.recv().await {
            Ok(line) => {
                let written = async {
                    stream.write_all(line.as_bytes()).await?;
                    stream.write_all(b"\n").await?;
                    stream.flush().await
                };
                if let Err(e) = written.await {
                    debug!("Subscriber {} went away: {}", peer, e);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Subscriber {} lagged, skipped {} messages", peer, n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    SUBSCRIBERS.dec();
    info!("Subscriber {} disconnected", peer);
}

#[async_trait]
impl MessageSink for TcpPublisher {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let line: Arc<str> = encode(message).into();
        // No receivers just means nobody is listening right now.
        if self.sender.send(line).is_err() {
            debug!("No subscribers for {}", message.subject);
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "tcp"
    }
}
