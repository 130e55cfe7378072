use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use crate::error::Result;

/// The captured microphone source, shared by reference with every peer
/// connection it is attached to.
///
/// Muting flips the `enabled` flag; every connection sees the change at once
/// because they all hold the same track. A fresh track starts disabled.
pub struct LocalAudioTrack {
    track: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
}

impl LocalAudioTrack {
    pub fn opus(track_id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        let track = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            track_id.into(),
            stream_id.into(),
        );

        Self {
            track: Arc::new(track),
            enabled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn rtc_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.track.clone()
    }

    /// Pushes one encoded frame to every bound connection. Returns `false`
    /// when the frame was dropped because the track is disabled.
    pub async fn write_sample(&self, sample: &Sample) -> Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        self.track.write_sample(sample).await?;
        Ok(true)
    }
}
