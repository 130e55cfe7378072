use std::sync::Arc;
use tracing::debug;

use crate::media::LocalAudioTrack;
use crate::peer::PeerRegistry;

/// Session-wide microphone and speaker state.
///
/// Holds the captured track once capture succeeds. Mic mute only toggles the
/// track's enabled flag; it never re-opens the device.
pub struct LocalMediaState {
    track: Option<Arc<LocalAudioTrack>>,
    mic_muted: bool,
    speaker_muted: bool,
    capture_denied: bool,
}

impl LocalMediaState {
    pub fn new() -> Self {
        Self {
            track: None,
            mic_muted: true,
            speaker_muted: false,
            capture_denied: false,
        }
    }

    pub fn mic_muted(&self) -> bool {
        self.mic_muted
    }

    pub fn speaker_muted(&self) -> bool {
        self.speaker_muted
    }

    pub fn capture_denied(&self) -> bool {
        self.capture_denied
    }

    pub fn local_track(&self) -> Option<Arc<LocalAudioTrack>> {
        self.track.clone()
    }

    pub fn install_track(&mut self, track: Arc<LocalAudioTrack>) {
        track.set_enabled(!self.mic_muted);
        self.track = Some(track);
        self.capture_denied = false;
    }

    pub fn mark_capture_denied(&mut self) {
        self.capture_denied = true;
    }

    /// The track a freshly created connection should carry: withheld while
    /// the microphone is muted or no capture exists.
    pub fn track_for_new_peer(&self) -> Option<Arc<LocalAudioTrack>> {
        if self.mic_muted {
            return None;
        }
        self.track.clone()
    }

    /// Returns `true` when the flag actually changed.
    pub fn set_mic_muted(&mut self, muted: bool) -> bool {
        if self.mic_muted == muted {
            return false;
        }
        self.mic_muted = muted;
        if let Some(track) = &self.track {
            track.set_enabled(!muted);
        }
        true
    }

    /// Returns `true` when the flag actually changed.
    pub fn set_speaker_muted(&mut self, muted: bool) -> bool {
        if self.speaker_muted == muted {
            return false;
        }
        self.speaker_muted = muted;
        true
    }

    /// Drops the capture on room exit. The next session starts muted.
    pub fn release(&mut self) {
        if let Some(track) = self.track.take() {
            track.set_enabled(false);
            debug!("Released local audio track {}", track.id());
        }
        self.mic_muted = true;
    }
}

impl Default for LocalMediaState {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the speaker flag to every bound playback sink.
pub async fn apply_speaker_mute(registry: &PeerRegistry, muted: bool) {
    registry
        .for_each(|entry| async move { entry.set_speaker_muted(muted).await })
        .await;
}
