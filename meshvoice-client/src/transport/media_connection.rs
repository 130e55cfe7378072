use async_trait::async_trait;
use meshvoice_core::{IceCandidate, ParticipantId, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::media::LocalAudioTrack;
use crate::peer::EntryId;
use crate::transport::TransportEvent;

/// One bidirectional media connection to a remote participant.
///
/// `create_offer` and `create_answer` both apply the description locally
/// before returning it.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Abandons an outstanding local offer, returning to the stable state.
    async fn rollback_local_offer(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn add_audio_track(&self, track: Arc<LocalAudioTrack>) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds connections and wires their callbacks into the session's
/// transport channel.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(
        &self,
        participant: &ParticipantId,
        entry: EntryId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn MediaConnection>>;
}
