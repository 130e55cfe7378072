use bytes::Bytes;
use meshvoice_core::{IceCandidate, ParticipantId};
use tokio::sync::mpsc;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

use crate::peer::EntryId;

/// RTP payloads of one inbound audio track.
#[derive(Debug)]
pub struct InboundAudio {
    pub track_id: String,
    pub packets: mpsc::Receiver<Bytes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl From<RTCPeerConnectionState> for ConnectionState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => Self::New,
            RTCPeerConnectionState::Connecting => Self::Connecting,
            RTCPeerConnectionState::Connected => Self::Connected,
            RTCPeerConnectionState::Disconnected => Self::Disconnected,
            RTCPeerConnectionState::Failed => Self::Failed,
            RTCPeerConnectionState::Closed => Self::Closed,
        }
    }
}

/// Events a media connection raises for the session loop.
///
/// Every event is stamped with the entry it came from; the session drops it
/// when that entry has since been replaced or closed.
#[derive(Debug)]
pub enum TransportEvent {
    /// A local candidate was discovered and must be trickled to the peer.
    CandidateGenerated(ParticipantId, EntryId, IceCandidate),

    /// The peer started sending audio.
    RemoteAudio(ParticipantId, EntryId, InboundAudio),

    StateChanged(ParticipantId, EntryId, ConnectionState),
}

impl TransportEvent {
    pub fn source(&self) -> (&ParticipantId, EntryId) {
        match self {
            Self::CandidateGenerated(participant, entry, _)
            | Self::RemoteAudio(participant, entry, _)
            | Self::StateChanged(participant, entry, _) => (participant, *entry),
        }
    }
}
