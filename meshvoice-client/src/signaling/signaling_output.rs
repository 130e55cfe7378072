use async_trait::async_trait;
use meshvoice_core::ClientToServer;

/// The relay connection, as seen by the mesh. Whatever carries messages to
/// the server (a websocket, a socket.io client, a test hub) implements this.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send(&self, message: ClientToServer);
}
