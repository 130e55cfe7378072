mod participant;
mod room;
mod session;
mod signaling;

pub use participant::{Participant, ParticipantId};
pub use room::RoomId;
pub use session::{IceCandidate, SdpKind, SessionDescription};
pub use signaling::{ClientToServer, IceServerConfig, ServerToClient};
