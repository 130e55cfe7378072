use meshvoice_core::{IceCandidate, ParticipantId, SessionDescription};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::error::{MeshError, Result};
use crate::media::{AudioPlayback, LocalAudioTrack, PlaybackSink};
use crate::peer::{Admission, CandidateBuffer, QueueFull};
use crate::transport::{InboundAudio, MediaConnection};

/// Generation of a registry entry. A participant that leaves and rejoins
/// gets a fresh entry with a higher id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Created,
    DescriptionPending,
    DescriptionApplied,
    Closed,
}

/// How an offer that arrives while our own offer is outstanding is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlareRole {
    /// Keep our offer and drop theirs.
    Impolite,
    /// Roll our offer back and answer theirs. Offer again afterwards if the
    /// discarded offer carried our audio.
    Polite,
    /// Apply theirs regardless and let the connection reject it.
    Unresolved,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TrackAttach {
    AlreadyAttached,
    /// Attached before any exchange; the first offer or answer carries it.
    Attached,
    /// Attached after the exchange; a fresh offer is needed.
    NeedsOffer,
    /// Attached while our offer awaits its answer; the fresh offer follows
    /// that answer.
    Deferred,
}

#[derive(Debug)]
pub enum OfferOutcome {
    Answered {
        answer: SessionDescription,
        renegotiate: bool,
    },
    /// Dropped by the collision rule.
    Ignored,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AnswerOutcome {
    Applied { renegotiate: bool },
    /// Nothing was awaiting an answer.
    Ignored,
}

struct Negotiation {
    candidates: CandidateBuffer,
    offered: bool,
    awaiting_answer: bool,
    renegotiate: bool,
    audio_sender: Option<Weak<LocalAudioTrack>>,
}

impl Negotiation {
    fn has_live_sender(&self) -> bool {
        self.audio_sender
            .as_ref()
            .is_some_and(|sender| sender.strong_count() > 0)
    }
}

/// One remote participant's connection and its negotiation state.
///
/// Every negotiation step runs under the entry's own lock, so a candidate
/// that arrives while a description is being applied waits for it. `close`
/// never takes that lock; steps still in flight notice the closed flag after
/// their next await and give up with [`MeshError::PeerClosed`].
pub struct PeerEntry {
    participant_id: ParticipantId,
    id: EntryId,
    connection: Arc<dyn MediaConnection>,
    negotiation: Mutex<Negotiation>,
    playback: Mutex<Option<Box<dyn PlaybackSink>>>,
    closed: AtomicBool,
    deadline: StdMutex<Option<AbortHandle>>,
}

impl PeerEntry {
    pub fn new(
        participant_id: ParticipantId,
        id: EntryId,
        connection: Arc<dyn MediaConnection>,
        candidate_queue_limit: usize,
    ) -> Self {
        Self {
            participant_id,
            id,
            connection,
            negotiation: Mutex::new(Negotiation {
                candidates: CandidateBuffer::new(candidate_queue_limit),
                offered: false,
                awaiting_answer: false,
                renegotiate: false,
                audio_sender: None,
            }),
            playback: Mutex::new(None),
            closed: AtomicBool::new(false),
            deadline: StdMutex::new(None),
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> PeerState {
        if self.is_closed() {
            return PeerState::Closed;
        }
        let negotiation = self.negotiation.lock().await;
        if negotiation.candidates.is_ready() {
            PeerState::DescriptionApplied
        } else if negotiation.offered {
            PeerState::DescriptionPending
        } else {
            PeerState::Created
        }
    }

    pub async fn has_remote_description(&self) -> bool {
        self.negotiation.lock().await.candidates.is_ready()
    }

    pub async fn is_awaiting_answer(&self) -> bool {
        self.negotiation.lock().await.awaiting_answer
    }

    pub async fn queued_candidates(&self) -> usize {
        self.negotiation.lock().await.candidates.len()
    }

    /// Whether the local track is attached and still alive.
    pub async fn has_audio(&self) -> bool {
        self.negotiation.lock().await.has_live_sender()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(MeshError::PeerClosed(self.participant_id.clone()));
        }
        Ok(())
    }

    /// A connection call that fails after `close` reports the closure, not
    /// whatever the torn-down connection said.
    fn closed_or(&self, e: MeshError) -> MeshError {
        if self.is_closed() {
            MeshError::PeerClosed(self.participant_id.clone())
        } else {
            e
        }
    }

    pub async fn attach_local_track(&self, track: Arc<LocalAudioTrack>) -> Result<TrackAttach> {
        let mut negotiation = self.negotiation.lock().await;
        self.ensure_open()?;

        if negotiation.has_live_sender() {
            return Ok(TrackAttach::AlreadyAttached);
        }

        self.connection
            .add_audio_track(track.clone())
            .await
            .map_err(|e| self.closed_or(e))?;
        self.ensure_open()?;
        negotiation.audio_sender = Some(Arc::downgrade(&track));

        let outcome = if negotiation.awaiting_answer {
            negotiation.renegotiate = true;
            TrackAttach::Deferred
        } else if negotiation.candidates.is_ready() {
            TrackAttach::NeedsOffer
        } else {
            TrackAttach::Attached
        };
        debug!(
            "Attached local audio to {} ({}): {:?}",
            self.participant_id, self.id, outcome
        );
        Ok(outcome)
    }

    /// Builds and applies a local offer. Supersedes whatever was negotiated
    /// before.
    pub async fn create_offer(&self) -> Result<SessionDescription> {
        let mut negotiation = self.negotiation.lock().await;
        self.ensure_open()?;

        let offer = self
            .connection
            .create_offer()
            .await
            .map_err(|e| self.closed_or(e))?;
        self.ensure_open()?;

        negotiation.offered = true;
        negotiation.awaiting_answer = true;
        negotiation.renegotiate = false;
        Ok(offer)
    }

    pub async fn accept_offer(
        &self,
        offer: SessionDescription,
        role: GlareRole,
    ) -> Result<OfferOutcome> {
        let mut negotiation = self.negotiation.lock().await;
        self.ensure_open()?;

        if negotiation.awaiting_answer {
            match role {
                GlareRole::Impolite => {
                    info!(
                        "Offer collision with {}: keeping our own offer",
                        self.participant_id
                    );
                    return Ok(OfferOutcome::Ignored);
                }
                GlareRole::Polite => {
                    info!(
                        "Offer collision with {}: rolling back our own offer",
                        self.participant_id
                    );
                    self.connection
                        .rollback_local_offer()
                        .await
                        .map_err(|e| self.closed_or(e))?;
                    self.ensure_open()?;
                    negotiation.awaiting_answer = false;
                    // Only a discarded offer that carried our track has to be redone.
                    let carried_track = negotiation.has_live_sender();
                    negotiation.renegotiate |= carried_track;
                }
                GlareRole::Unresolved => {
                    warn!(
                        "Offer collision with {}: both sides are offering",
                        self.participant_id
                    );
                }
            }
        }

        self.connection
            .set_remote_description(offer)
            .await
            .map_err(|e| self.closed_or(e))?;
        self.ensure_open()?;
        self.flush_candidates(&mut negotiation).await?;

        let answer = self
            .connection
            .create_answer()
            .await
            .map_err(|e| self.closed_or(e))?;
        self.ensure_open()?;

        Ok(OfferOutcome::Answered {
            answer,
            renegotiate: std::mem::take(&mut negotiation.renegotiate),
        })
    }

    pub async fn accept_answer(&self, answer: SessionDescription) -> Result<AnswerOutcome> {
        let mut negotiation = self.negotiation.lock().await;
        self.ensure_open()?;

        if !negotiation.awaiting_answer {
            debug!(
                "Ignoring answer from {}: no offer outstanding",
                self.participant_id
            );
            return Ok(AnswerOutcome::Ignored);
        }

        self.connection
            .set_remote_description(answer)
            .await
            .map_err(|e| self.closed_or(e))?;
        self.ensure_open()?;
        negotiation.awaiting_answer = false;
        self.flush_candidates(&mut negotiation).await?;

        Ok(AnswerOutcome::Applied {
            renegotiate: std::mem::take(&mut negotiation.renegotiate),
        })
    }

    /// Opens the candidate buffer and applies everything it held, in order.
    /// A rejected candidate is logged and skipped.
    async fn flush_candidates(&self, negotiation: &mut Negotiation) -> Result<()> {
        let first_apply = !negotiation.candidates.is_ready();
        let queued = negotiation.candidates.flush();
        if first_apply {
            self.cancel_deadline();
            debug!(
                "Remote description applied for {}; flushing {} candidates",
                self.participant_id,
                queued.len()
            );
        }

        for candidate in queued {
            if let Err(e) = self.connection.add_ice_candidate(candidate).await {
                self.ensure_open()?;
                warn!(
                    "Failed to apply queued candidate for {}: {}",
                    self.participant_id, e
                );
            }
            self.ensure_open()?;
        }
        Ok(())
    }

    pub async fn handle_inbound_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let mut negotiation = self.negotiation.lock().await;
        self.ensure_open()?;

        match negotiation.candidates.admit(candidate) {
            Ok(Admission::Apply(candidate)) => self
                .connection
                .add_ice_candidate(candidate)
                .await
                .map_err(|e| self.closed_or(e)),
            Ok(Admission::Queued) => {
                debug!(
                    "Buffered candidate for {} ({} queued)",
                    self.participant_id,
                    negotiation.candidates.len()
                );
                Ok(())
            }
            Err(QueueFull { limit }) => Err(MeshError::CandidateOverflow {
                participant: self.participant_id.clone(),
                limit,
            }),
        }
    }

    /// Routes inbound audio to playback, creating the sink on first use.
    pub async fn bind_remote_audio(
        &self,
        source: InboundAudio,
        playback: &dyn AudioPlayback,
        speaker_muted: bool,
    ) {
        let mut sink = self.playback.lock().await;
        if self.is_closed() {
            return;
        }
        match sink.as_ref() {
            Some(existing) => existing.rebind(source),
            None => *sink = Some(playback.bind(&self.participant_id, source, speaker_muted)),
        }
    }

    pub async fn has_playback(&self) -> bool {
        self.playback.lock().await.is_some()
    }

    pub async fn set_speaker_muted(&self, muted: bool) {
        if let Some(sink) = self.playback.lock().await.as_ref() {
            sink.set_muted(muted);
        }
    }

    pub fn arm_deadline(&self, handle: AbortHandle) {
        let previous = match self.deadline.lock() {
            Ok(mut slot) => slot.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Detaches the deadline without aborting it. Called by the deadline
    /// task itself before it closes the entry.
    pub fn disarm_deadline(&self) -> Option<AbortHandle> {
        match self.deadline.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn cancel_deadline(&self) {
        if let Some(handle) = self.disarm_deadline() {
            handle.abort();
        }
    }

    /// Releases the connection and playback. Returns `false` when the entry
    /// was already closed.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.cancel_deadline();

        if let Some(sink) = self.playback.lock().await.take() {
            sink.release();
        }
        if let Err(e) = self.connection.close().await {
            warn!("Error closing connection to {}: {}", self.participant_id, e);
        }

        info!("Closed connection to {} ({})", self.participant_id, self.id);
        true
    }
}
