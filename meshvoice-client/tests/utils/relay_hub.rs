use async_trait::async_trait;
use meshvoice_client::{
    AudioCapture, ChannelPlayback, ConnectionFactory, MeshCollaborators, MeshConfig, MeshEvent,
    MeshSession, NegotiationController, SessionCommand, SignalingOutput,
};
use meshvoice_core::{ClientToServer, Participant, ParticipantId, RoomId, ServerToClient};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

struct Member {
    id: ParticipantId,
    commands: mpsc::Sender<SessionCommand>,
    joined: bool,
}

/// In-memory stand-in for the signaling server: stamps `from_user_id`,
/// routes directed messages, and broadcasts membership changes. Messages
/// are delivered as JSON text, the way a socket would hand them over.
#[derive(Default)]
pub struct RelayHub {
    members: Mutex<Vec<Member>>,
}

/// One client connected to the hub, with its session running.
pub struct HubClient {
    pub id: ParticipantId,
    pub commands: mpsc::Sender<SessionCommand>,
    pub controller: Arc<NegotiationController>,
    pub events: mpsc::UnboundedReceiver<MeshEvent>,
    pub task: JoinHandle<()>,
}

impl RelayHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn spawn_client(
        self: &Arc<Self>,
        id: ParticipantId,
        room_id: RoomId,
        config: MeshConfig,
        connections: Arc<dyn ConnectionFactory>,
        capture: Arc<dyn AudioCapture>,
    ) -> HubClient {
        let (playback, _frames) = ChannelPlayback::new();
        let collaborators = MeshCollaborators {
            signaling: Arc::new(HubSignaling {
                from: id.clone(),
                hub: self.clone(),
            }),
            connections,
            capture,
            playback: Arc::new(playback),
        };

        let (session, commands, events) =
            MeshSession::new(id.clone(), room_id, config, collaborators);
        let controller = session.controller();

        self.members.lock().await.push(Member {
            id: id.clone(),
            commands: commands.clone(),
            joined: false,
        });
        let task = tokio::spawn(session.run());

        HubClient {
            id,
            commands,
            controller,
            events,
            task,
        }
    }

    pub async fn joined_count(&self) -> usize {
        self.members.lock().await.iter().filter(|m| m.joined).count()
    }

    async fn deliver(&self, targets: Vec<mpsc::Sender<SessionCommand>>, message: ServerToClient) {
        let Ok(json) = serde_json::to_string(&message) else {
            tracing::error!("[RelayHub] failed to encode {:?}", message);
            return;
        };
        for target in targets {
            let _ = target.send(SessionCommand::RawSignal(json.clone())).await;
        }
    }

    async fn route(&self, from: &ParticipantId, message: ClientToServer) {
        tracing::debug!("[RelayHub] {} from {}", message.event_name(), from);

        let (targets, outbound) = {
            let mut members = self.members.lock().await;
            let others = |members: &Vec<Member>| -> Vec<mpsc::Sender<SessionCommand>> {
                members
                    .iter()
                    .filter(|m| m.joined && &m.id != from)
                    .map(|m| m.commands.clone())
                    .collect()
            };
            let directed = |members: &Vec<Member>, target: &ParticipantId| {
                members
                    .iter()
                    .filter(|m| m.joined && &m.id == target)
                    .map(|m| m.commands.clone())
                    .collect::<Vec<_>>()
            };

            match message {
                ClientToServer::JoinRoom { room_id } => {
                    for member in members.iter_mut().filter(|m| &m.id == from) {
                        member.joined = true;
                    }
                    let users: Vec<Participant> = members
                        .iter()
                        .filter(|m| m.joined)
                        .map(|m| Participant::new(m.id.clone(), format!("user-{}", m.id)))
                        .collect();
                    let own = directed(&*members, from);
                    let broadcast = others(&*members);
                    drop(members);

                    self.deliver(
                        own,
                        ServerToClient::RoomUsersList {
                            room_id: Some(room_id.clone()),
                            users,
                        },
                    )
                    .await;
                    (
                        broadcast,
                        ServerToClient::JoinedRoom {
                            room_id: Some(room_id),
                            user: Participant::new(from.clone(), format!("user-{from}")),
                        },
                    )
                }
                ClientToServer::LeaveRoom { room_id } => {
                    let broadcast = others(&*members);
                    for member in members.iter_mut().filter(|m| &m.id == from) {
                        member.joined = false;
                    }
                    (
                        broadcast,
                        ServerToClient::LeftRoom {
                            room_id: Some(room_id),
                            user_id: from.clone(),
                        },
                    )
                }
                ClientToServer::Offer {
                    room_id,
                    target_user_id,
                    offer,
                } => (
                    directed(&*members, &target_user_id),
                    ServerToClient::Offer {
                        room_id: Some(room_id),
                        from_user_id: from.clone(),
                        offer,
                    },
                ),
                ClientToServer::Answer {
                    room_id,
                    target_user_id,
                    answer,
                } => (
                    directed(&*members, &target_user_id),
                    ServerToClient::Answer {
                        room_id: Some(room_id),
                        from_user_id: from.clone(),
                        answer,
                    },
                ),
                ClientToServer::IceCandidate {
                    room_id,
                    target_user_id,
                    candidate,
                } => (
                    directed(&*members, &target_user_id),
                    ServerToClient::IceCandidate {
                        room_id: Some(room_id),
                        from_user_id: from.clone(),
                        candidate,
                    },
                ),
                ClientToServer::UserMicMuted { room_id } => (
                    others(&*members),
                    ServerToClient::UserMicMuted {
                        room_id: Some(room_id),
                        user_id: from.clone(),
                    },
                ),
                ClientToServer::UserMicEnabled { room_id, user_id } => (
                    others(&*members),
                    ServerToClient::UserMicEnabled {
                        room_id: Some(room_id),
                        user_id,
                    },
                ),
            }
        };

        self.deliver(targets, outbound).await;
    }
}

/// The per-client signaling output wired into the hub.
pub struct HubSignaling {
    from: ParticipantId,
    hub: Arc<RelayHub>,
}

#[async_trait]
impl SignalingOutput for HubSignaling {
    async fn send(&self, message: ClientToServer) {
        self.hub.route(&self.from, message).await;
    }
}
