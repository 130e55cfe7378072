use meshvoice_core::{ParticipantId, RoomId, ServerToClient};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::MeshConfig;
use crate::negotiation::{MeshCollaborators, MeshEvent, NegotiationController};
use crate::session::SessionCommand;
use crate::transport::TransportEvent;

const COMMAND_CHANNEL_CAPACITY: usize = 100;
const TRANSPORT_CHANNEL_CAPACITY: usize = 256;

/// Event loop of one room membership.
///
/// Relay messages and UI commands come in through [`SessionCommand`];
/// connection callbacks through the transport channel. Both are handled on
/// this loop one at a time, in arrival order.
pub struct MeshSession {
    controller: Arc<NegotiationController>,
    command_rx: mpsc::Receiver<SessionCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
}

impl MeshSession {
    /// Returns the session, the sender that feeds it, and the application
    /// event stream.
    pub fn new(
        local_id: ParticipantId,
        room_id: RoomId,
        config: MeshConfig,
        collaborators: MeshCollaborators,
    ) -> (
        Self,
        mpsc::Sender<SessionCommand>,
        mpsc::UnboundedReceiver<MeshEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let controller = Arc::new(NegotiationController::new(
            local_id,
            room_id,
            config,
            collaborators,
            transport_tx,
            event_tx,
        ));

        let session = Self {
            controller,
            command_rx,
            transport_rx,
        };
        (session, command_tx, event_rx)
    }

    pub fn controller(&self) -> Arc<NegotiationController> {
        self.controller.clone()
    }

    pub async fn run(mut self) {
        info!(
            "Mesh session for room {} started",
            self.controller.room_id()
        );
        self.controller.join().await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Leave) => break,
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Leaving room.");
                            break;
                        }
                    }
                }

                evt = self.transport_rx.recv() => {
                    match evt {
                        Some(e) => self.controller.handle_transport_event(e).await,
                        None => {
                            warn!("Transport channel closed unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        self.controller.leave().await;
        info!("Mesh session finished");
    }

    async fn handle_command(&self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Signal(message) => self.controller.handle_signal(message).await,
            SessionCommand::RawSignal(text) => {
                match serde_json::from_str::<ServerToClient>(&text) {
                    Ok(message) => self.controller.handle_signal(message).await,
                    Err(e) => warn!("Invalid relay message: {:?}", e),
                }
            }
            SessionCommand::SetMicMuted(muted) => self.controller.set_mic_muted(muted).await,
            SessionCommand::ToggleMic => self.controller.toggle_microphone().await,
            SessionCommand::SetSpeakerMuted(muted) => {
                self.controller.set_speaker_muted(muted).await
            }
            SessionCommand::Leave => self.controller.leave().await,
        }
    }
}
