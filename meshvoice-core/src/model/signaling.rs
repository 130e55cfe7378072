use crate::model::participant::{Participant, ParticipantId};
use crate::model::room::RoomId;
use crate::model::session::{IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Messages the client hands to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ClientToServer {
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    Offer {
        room_id: RoomId,
        target_user_id: ParticipantId,
        offer: SessionDescription,
    },
    Answer {
        room_id: RoomId,
        target_user_id: ParticipantId,
        answer: SessionDescription,
    },
    IceCandidate {
        room_id: RoomId,
        target_user_id: ParticipantId,
        candidate: IceCandidate,
    },
    UserMicMuted {
        room_id: RoomId,
    },
    UserMicEnabled {
        room_id: RoomId,
        user_id: ParticipantId,
    },
}

impl ClientToServer {
    /// Event name as used by socket-style relays.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice_candidate",
            Self::UserMicMuted { .. } => "user_mic_muted",
            Self::UserMicEnabled { .. } => "user_mic_enabled",
        }
    }

    /// Recipient of a directed signal, `None` for room-wide messages.
    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            Self::Offer { target_user_id, .. }
            | Self::Answer { target_user_id, .. }
            | Self::IceCandidate { target_user_id, .. } => Some(target_user_id),
            _ => None,
        }
    }
}

/// Messages the relay delivers to the client. `from_user_id` is stamped by
/// the relay, never by the sending client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case")]
pub enum ServerToClient {
    RoomUsersList {
        #[serde(default)]
        room_id: Option<RoomId>,
        users: Vec<Participant>,
    },
    JoinedRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
        user: Participant,
    },
    LeftRoom {
        #[serde(default)]
        room_id: Option<RoomId>,
        user_id: ParticipantId,
    },
    Offer {
        #[serde(default)]
        room_id: Option<RoomId>,
        from_user_id: ParticipantId,
        offer: SessionDescription,
    },
    Answer {
        #[serde(default)]
        room_id: Option<RoomId>,
        from_user_id: ParticipantId,
        answer: SessionDescription,
    },
    IceCandidate {
        #[serde(default)]
        room_id: Option<RoomId>,
        from_user_id: ParticipantId,
        candidate: IceCandidate,
    },
    UserMicMuted {
        #[serde(default)]
        room_id: Option<RoomId>,
        user_id: ParticipantId,
    },
    UserMicEnabled {
        #[serde(default)]
        room_id: Option<RoomId>,
        user_id: ParticipantId,
    },
}
