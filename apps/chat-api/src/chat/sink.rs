//! The per-connection send capability.

use tokio::sync::mpsc;

use crate::error::DeliveryError;

/// Delivers serialized payloads to one client connection.
///
/// Implementations must not block: rooms call `send` while fanning out to
/// every member.
pub trait MessageSink: Send + Sync {
    fn send(&self, payload: &str) -> Result<(), DeliveryError>;
}

/// Sink backed by an unbounded channel drained by the connection's writer
/// task. Fails once the writer has gone away.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| DeliveryError::Closed)
    }
}
