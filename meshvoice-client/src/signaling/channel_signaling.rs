use async_trait::async_trait;
use meshvoice_core::ClientToServer;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::signaling::SignalingOutput;

/// Queues outbound relay messages for a transport task to serialize and send.
#[derive(Clone)]
pub struct ChannelSignaling {
    tx: mpsc::UnboundedSender<ClientToServer>,
}

impl ChannelSignaling {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientToServer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SignalingOutput for ChannelSignaling {
    async fn send(&self, message: ClientToServer) {
        debug!("Sending {} to relay", message.event_name());
        if let Err(e) = self.tx.send(message) {
            error!("Relay channel closed, dropping {}", e.0.event_name());
        }
    }
}
