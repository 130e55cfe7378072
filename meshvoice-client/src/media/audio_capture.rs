use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{MeshError, Result};
use crate::media::LocalAudioTrack;

/// Access to the microphone. Opening may fail when the device is missing or
/// the user refuses permission; the session then stays receive-only.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn open(&self) -> Result<Arc<LocalAudioTrack>>;
}

/// Hands out an Opus track that the application feeds with encoded frames.
pub struct StaticTrackCapture {
    track_id: String,
    stream_id: String,
}

impl StaticTrackCapture {
    pub fn new(track_id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            stream_id: stream_id.into(),
        }
    }
}

impl Default for StaticTrackCapture {
    fn default() -> Self {
        Self::new("microphone", "meshvoice")
    }
}

#[async_trait]
impl AudioCapture for StaticTrackCapture {
    async fn open(&self) -> Result<Arc<LocalAudioTrack>> {
        Ok(Arc::new(LocalAudioTrack::opus(
            self.track_id.clone(),
            self.stream_id.clone(),
        )))
    }
}

/// A capture device that always refuses.
pub struct DeniedCapture {
    reason: String,
}

impl DeniedCapture {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AudioCapture for DeniedCapture {
    async fn open(&self) -> Result<Arc<LocalAudioTrack>> {
        Err(MeshError::MediaAccessDenied(self.reason.clone()))
    }
}
