use meshvoice_core::ParticipantId;

use crate::transport::ConnectionState;

/// Notifications for the application layer (roster icons, error banners).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    PeerAdded(ParticipantId),
    PeerRemoved(ParticipantId),
    /// The microphone could not be opened; the session stays receive-only.
    MediaAccessDenied(String),
    NegotiationFailed {
        participant: ParticipantId,
        reason: String,
    },
    NegotiationTimedOut(ParticipantId),
    ConnectionStateChanged {
        participant: ParticipantId,
        state: ConnectionState,
    },
    RemoteMicChanged {
        participant: ParticipantId,
        muted: bool,
    },
    LocalMicChanged {
        muted: bool,
    },
}
