use bytes::Bytes;
use meshvoice_core::ParticipantId;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::transport::InboundAudio;

/// Local playback of one remote participant's audio.
pub trait PlaybackSink: Send + Sync {
    fn set_muted(&self, muted: bool);

    /// Points the sink at a new inbound source, dropping the previous one.
    fn rebind(&self, source: InboundAudio);

    fn release(&self);
}

/// Creates a playback sink the first time a remote participant's audio arrives.
pub trait AudioPlayback: Send + Sync {
    fn bind(
        &self,
        participant: &ParticipantId,
        source: InboundAudio,
        muted: bool,
    ) -> Box<dyn PlaybackSink>;
}

#[derive(Debug, Clone)]
pub struct PlaybackFrame {
    pub from: ParticipantId,
    pub payload: Bytes,
}

/// Forwards every inbound frame to the application, which owns the audio
/// device. Frames received while muted are discarded.
#[derive(Clone)]
pub struct ChannelPlayback {
    out: mpsc::UnboundedSender<PlaybackFrame>,
}

impl ChannelPlayback {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlaybackFrame>) {
        let (out, rx) = mpsc::unbounded_channel();
        (Self { out }, rx)
    }
}

impl AudioPlayback for ChannelPlayback {
    fn bind(
        &self,
        participant: &ParticipantId,
        source: InboundAudio,
        muted: bool,
    ) -> Box<dyn PlaybackSink> {
        let sink = ChannelSink {
            participant: participant.clone(),
            muted: Arc::new(AtomicBool::new(muted)),
            out: self.out.clone(),
            pump: Mutex::new(None),
        };
        sink.rebind(source);
        Box::new(sink)
    }
}

struct ChannelSink {
    participant: ParticipantId,
    muted: Arc<AtomicBool>,
    out: mpsc::UnboundedSender<PlaybackFrame>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelSink {
    fn replace_pump(&self, pump: Option<JoinHandle<()>>) {
        let previous = match self.pump.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, pump),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), pump),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl PlaybackSink for ChannelSink {
    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn rebind(&self, mut source: InboundAudio) {
        let muted = self.muted.clone();
        let out = self.out.clone();
        let from = self.participant.clone();

        let pump = tokio::spawn(async move {
            while let Some(payload) = source.packets.recv().await {
                if muted.load(Ordering::SeqCst) {
                    continue;
                }
                let frame = PlaybackFrame {
                    from: from.clone(),
                    payload,
                };
                if out.send(frame).is_err() {
                    break;
                }
            }
        });

        self.replace_pump(Some(pump));
    }

    fn release(&self) {
        self.replace_pump(None);
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        self.release();
    }
}
