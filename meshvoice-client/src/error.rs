use meshvoice_core::ParticipantId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("microphone access denied: {0}")]
    MediaAccessDenied(String),

    #[error("negotiation with {participant} failed: {reason}")]
    Negotiation {
        participant: ParticipantId,
        reason: String,
    },

    #[error("candidate queue for {participant} exceeded {limit} entries")]
    CandidateOverflow {
        participant: ParticipantId,
        limit: usize,
    },

    #[error("refusing to open a connection to the local participant")]
    LocalParticipant,

    #[error("connection to {0} is closed")]
    PeerClosed(ParticipantId),

    #[error("no local description after applying it")]
    MissingLocalDescription,

    #[error("invalid session description: {0}")]
    Sdp(String),

    #[error(transparent)]
    WebRtc(#[from] webrtc::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MeshError {
    /// Errors produced by work that outlived its entry. Callers drop these
    /// silently instead of reporting a failure.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::PeerClosed(_))
    }
}

pub type Result<T> = std::result::Result<T, MeshError>;
