use dashmap::DashMap;
use meshvoice_core::{
    ClientToServer, IceCandidate, Participant, ParticipantId, RoomId, ServerToClient,
    SessionDescription,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MeshConfig;
use crate::error::MeshError;
use crate::media::{
    AudioCapture, AudioPlayback, LocalAudioTrack, LocalMediaState, apply_speaker_mute,
};
use crate::negotiation::{InitiatorPolicy, MeshEvent};
use crate::peer::{
    AnswerOutcome, GlareRole, OfferOutcome, PeerEntry, PeerRegistry, PeerState, TrackAttach,
};
use crate::signaling::SignalingOutput;
use crate::transport::{ConnectionFactory, TransportEvent};

/// External collaborators the controller drives.
#[derive(Clone)]
pub struct MeshCollaborators {
    pub signaling: Arc<dyn SignalingOutput>,
    pub connections: Arc<dyn ConnectionFactory>,
    pub capture: Arc<dyn AudioCapture>,
    pub playback: Arc<dyn AudioPlayback>,
}

/// Runs the offer/answer protocol against every remote participant of one
/// room and reacts to local microphone changes.
pub struct NegotiationController {
    local_id: ParticipantId,
    room_id: RoomId,
    config: MeshConfig,
    registry: PeerRegistry,
    media: Mutex<LocalMediaState>,
    signaling: Arc<dyn SignalingOutput>,
    capture: Arc<dyn AudioCapture>,
    playback: Arc<dyn AudioPlayback>,
    pending_initiations: DashMap<ParticipantId, JoinHandle<()>>,
    events: mpsc::UnboundedSender<MeshEvent>,
    left: AtomicBool,
}

impl NegotiationController {
    pub fn new(
        local_id: ParticipantId,
        room_id: RoomId,
        config: MeshConfig,
        collaborators: MeshCollaborators,
        transport_tx: mpsc::Sender<TransportEvent>,
        events: mpsc::UnboundedSender<MeshEvent>,
    ) -> Self {
        let registry = PeerRegistry::new(
            local_id.clone(),
            collaborators.connections,
            transport_tx,
            config.candidate_queue_limit,
        );

        Self {
            local_id,
            room_id,
            config,
            registry,
            media: Mutex::new(LocalMediaState::new()),
            signaling: collaborators.signaling,
            capture: collaborators.capture,
            playback: collaborators.playback,
            pending_initiations: DashMap::new(),
            events,
            left: AtomicBool::new(false),
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub async fn mic_muted(&self) -> bool {
        self.media.lock().await.mic_muted()
    }

    pub async fn speaker_muted(&self) -> bool {
        self.media.lock().await.speaker_muted()
    }

    fn has_left(&self) -> bool {
        self.left.load(Ordering::SeqCst)
    }

    fn emit(&self, event: MeshEvent) {
        let _ = self.events.send(event);
    }

    pub async fn join(&self) {
        info!("Joining room {} as {}", self.room_id, self.local_id);
        self.signaling
            .send(ClientToServer::JoinRoom {
                room_id: self.room_id.clone(),
            })
            .await;
    }

    /// Opens the microphone ahead of the first unmute. The track stays
    /// disabled until the user unmutes.
    pub async fn start_capture(&self) {
        let mut media = self.media.lock().await;
        if media.local_track().is_some() || media.capture_denied() {
            return;
        }
        self.open_capture(&mut media).await;
    }

    async fn open_capture(&self, media: &mut LocalMediaState) -> Option<Arc<LocalAudioTrack>> {
        match self.capture.open().await {
            Ok(track) => {
                info!("Microphone captured ({})", track.id());
                media.install_track(track.clone());
                Some(track)
            }
            Err(e) => {
                warn!("Microphone unavailable, continuing receive-only: {}", e);
                media.mark_capture_denied();
                self.emit(MeshEvent::MediaAccessDenied(e.to_string()));
                None
            }
        }
    }

    pub async fn handle_signal(self: &Arc<Self>, message: ServerToClient) {
        if self.has_left() {
            debug!("Ignoring relay message after leaving the room");
            return;
        }

        match message {
            ServerToClient::RoomUsersList { users, .. } => self.on_roster(users).await,
            ServerToClient::JoinedRoom { user, .. } => {
                info!("{} joined the room", user.id);
                self.participant_discovered(&user.id).await;
            }
            ServerToClient::LeftRoom { user_id, .. } => {
                info!("{} left the room", user_id);
                self.participant_left(&user_id).await;
            }
            ServerToClient::Offer {
                from_user_id,
                offer,
                ..
            } => self.handle_offer(&from_user_id, offer).await,
            ServerToClient::Answer {
                from_user_id,
                answer,
                ..
            } => self.handle_answer(&from_user_id, answer).await,
            ServerToClient::IceCandidate {
                from_user_id,
                candidate,
                ..
            } => self.handle_remote_candidate(&from_user_id, candidate).await,
            ServerToClient::UserMicMuted { user_id, .. } => {
                self.emit(MeshEvent::RemoteMicChanged {
                    participant: user_id,
                    muted: true,
                });
            }
            ServerToClient::UserMicEnabled { user_id, .. } => {
                self.emit(MeshEvent::RemoteMicChanged {
                    participant: user_id,
                    muted: false,
                });
            }
        }
    }

    pub async fn on_roster(self: &Arc<Self>, users: Vec<Participant>) {
        debug!("Roster with {} participants", users.len());
        for user in users {
            if user.id == self.local_id {
                continue;
            }
            self.participant_discovered(&user.id).await;
        }
    }

    /// A remote participant is present. The designated initiator offers
    /// after the settle delay; the other side builds its entry now and
    /// waits for that offer.
    pub async fn participant_discovered(self: &Arc<Self>, participant: &ParticipantId) {
        if participant == &self.local_id || self.has_left() {
            return;
        }

        if !self
            .config
            .initiator_policy
            .should_initiate(&self.local_id, participant)
        {
            debug!("Waiting for {} to offer", participant);
            let _ = self.ensure_entry(participant).await;
            return;
        }

        if self.registry.contains(participant)
            || self
                .pending_initiations
                .get(participant)
                .is_some_and(|pending| !pending.is_finished())
        {
            debug!("Already connecting to {}", participant);
            return;
        }

        let controller = Arc::downgrade(self);
        let target = participant.clone();
        let delay = self.config.initiate_delay();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(controller) = controller.upgrade() else {
                return;
            };
            controller.initiate(&target).await;
        });

        if let Some(previous) = self.pending_initiations.insert(participant.clone(), handle) {
            previous.abort();
        }
    }

    pub async fn participant_left(&self, participant: &ParticipantId) {
        if let Some((_, pending)) = self.pending_initiations.remove(participant) {
            pending.abort();
        }
        if self.registry.remove(participant).await {
            self.emit(MeshEvent::PeerRemoved(participant.clone()));
        }
    }

    async fn ensure_entry(self: &Arc<Self>, participant: &ParticipantId) -> Option<Arc<PeerEntry>> {
        let track = self.media.lock().await.track_for_new_peer();
        let attached = track.is_some();
        match self.registry.get_or_create(participant, track).await {
            Ok((entry, created)) => {
                if created {
                    self.on_entry_created(&entry);
                    if !attached {
                        self.attach_if_unmuted(&entry).await;
                    }
                }
                Some(entry)
            }
            Err(e) => {
                self.report_failure(participant, e);
                None
            }
        }
    }

    fn on_entry_created(self: &Arc<Self>, entry: &Arc<PeerEntry>) {
        self.emit(MeshEvent::PeerAdded(entry.participant_id().clone()));

        let Some(timeout) = self.config.negotiation_timeout() else {
            return;
        };
        let controller = Arc::downgrade(self);
        let weak_entry = Arc::downgrade(entry);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let (Some(controller), Some(entry)) = (controller.upgrade(), weak_entry.upgrade())
            else {
                return;
            };
            entry.disarm_deadline();
            controller.negotiation_deadline_passed(&entry).await;
        });
        entry.arm_deadline(handle.abort_handle());
    }

    async fn negotiation_deadline_passed(&self, entry: &Arc<PeerEntry>) {
        if entry.is_closed() || entry.has_remote_description().await {
            return;
        }
        warn!(
            "Negotiation with {} did not complete in time, closing",
            entry.participant_id()
        );
        if self.registry.remove_entry(entry).await {
            let participant = entry.participant_id().clone();
            self.emit(MeshEvent::NegotiationTimedOut(participant.clone()));
            self.emit(MeshEvent::PeerRemoved(participant));
        }
    }

    /// Sends the first offer to `participant` unless a negotiation with it
    /// is already under way.
    pub async fn initiate(self: &Arc<Self>, participant: &ParticipantId) {
        if self.has_left() {
            return;
        }
        let Some(entry) = self.ensure_entry(participant).await else {
            return;
        };
        if entry.state().await != PeerState::Created {
            debug!("Negotiation with {} already under way", participant);
            return;
        }
        self.send_offer(&entry).await;
    }

    async fn send_offer(&self, entry: &Arc<PeerEntry>) {
        let offer = match entry.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                self.report_failure(entry.participant_id(), e);
                return;
            }
        };
        if !self.registry.is_current(entry) {
            debug!("Dropping offer for replaced entry {}", entry.id());
            return;
        }

        info!("Sending offer to {}", entry.participant_id());
        self.signaling
            .send(ClientToServer::Offer {
                room_id: self.room_id.clone(),
                target_user_id: entry.participant_id().clone(),
                offer,
            })
            .await;
    }

    fn glare_role(&self, remote: &ParticipantId) -> GlareRole {
        match self.config.initiator_policy {
            InitiatorPolicy::Always => GlareRole::Unresolved,
            policy if policy.wins_collision(&self.local_id, remote) => GlareRole::Impolite,
            _ => GlareRole::Polite,
        }
    }

    pub async fn handle_offer(self: &Arc<Self>, from: &ParticipantId, offer: SessionDescription) {
        let Some(entry) = self.ensure_entry(from).await else {
            return;
        };
        info!("Received offer from {}", from);

        match entry.accept_offer(offer, self.glare_role(from)).await {
            Ok(OfferOutcome::Answered {
                answer,
                renegotiate,
            }) => {
                if !self.registry.is_current(&entry) {
                    return;
                }
                info!("Sending answer to {}", from);
                self.signaling
                    .send(ClientToServer::Answer {
                        room_id: self.room_id.clone(),
                        target_user_id: from.clone(),
                        answer,
                    })
                    .await;
                if renegotiate {
                    self.send_offer(&entry).await;
                }
            }
            Ok(OfferOutcome::Ignored) => {}
            Err(e) => self.report_failure(from, e),
        }
    }

    pub async fn handle_answer(&self, from: &ParticipantId, answer: SessionDescription) {
        let Some(entry) = self.registry.get(from) else {
            debug!("Dropping answer from {}: no connection", from);
            return;
        };

        match entry.accept_answer(answer).await {
            Ok(AnswerOutcome::Applied { renegotiate }) => {
                info!("Applied answer from {}", from);
                if renegotiate && self.registry.is_current(&entry) {
                    self.send_offer(&entry).await;
                }
            }
            Ok(AnswerOutcome::Ignored) => {}
            Err(e) => self.report_failure(from, e),
        }
    }

    pub async fn handle_remote_candidate(&self, from: &ParticipantId, candidate: IceCandidate) {
        let Some(entry) = self.registry.get(from) else {
            debug!("Dropping candidate from {}: no connection", from);
            return;
        };

        match entry.handle_inbound_candidate(candidate).await {
            Ok(()) => {}
            Err(e @ MeshError::CandidateOverflow { .. }) => {
                warn!("{}", e);
                self.fail_peer(&entry, e.to_string()).await;
            }
            Err(e) if e.is_stale() => {}
            Err(e) => warn!("Failed to apply candidate from {}: {}", from, e),
        }
    }

    pub async fn handle_transport_event(&self, event: TransportEvent) {
        let (participant, id) = {
            let (participant, id) = event.source();
            (participant.clone(), id)
        };
        let Some(entry) = self.registry.current(&participant, id) else {
            debug!("Dropping transport event from stale {} ({})", participant, id);
            return;
        };

        match event {
            TransportEvent::CandidateGenerated(_, _, candidate) => {
                self.signaling
                    .send(ClientToServer::IceCandidate {
                        room_id: self.room_id.clone(),
                        target_user_id: participant,
                        candidate,
                    })
                    .await;
            }
            TransportEvent::RemoteAudio(_, _, source) => {
                let muted = self.media.lock().await.speaker_muted();
                debug!("Binding playback for {} ({})", participant, source.track_id);
                entry
                    .bind_remote_audio(source, self.playback.as_ref(), muted)
                    .await;
            }
            TransportEvent::StateChanged(_, _, state) => {
                self.emit(MeshEvent::ConnectionStateChanged { participant, state });
            }
        }
    }

    /// Closes one peer after an unrecoverable problem. Other peers are
    /// untouched.
    async fn fail_peer(&self, entry: &Arc<PeerEntry>, reason: String) {
        let participant = entry.participant_id().clone();
        if let Some((_, pending)) = self.pending_initiations.remove(&participant) {
            pending.abort();
        }
        if self.registry.remove_entry(entry).await {
            self.emit(MeshEvent::NegotiationFailed {
                participant: participant.clone(),
                reason,
            });
            self.emit(MeshEvent::PeerRemoved(participant));
        }
    }

    /// Logs and reports a failed step. The entry keeps its last valid state.
    fn report_failure(&self, participant: &ParticipantId, e: MeshError) {
        if e.is_stale() {
            debug!("Discarding result for closed connection to {}", participant);
            return;
        }
        error!("Negotiation with {} failed: {}", participant, e);
        self.emit(MeshEvent::NegotiationFailed {
            participant: participant.clone(),
            reason: e.to_string(),
        });
    }

    pub async fn set_mic_muted(&self, muted: bool) {
        if self.has_left() {
            return;
        }
        let mut media = self.media.lock().await;

        if !muted && media.local_track().is_none() {
            if media.capture_denied() {
                warn!("Microphone access was denied for this session");
                self.emit(MeshEvent::MediaAccessDenied(
                    "microphone unavailable for this session".to_owned(),
                ));
                return;
            }
            if self.open_capture(&mut media).await.is_none() {
                return;
            }
        }

        if !media.set_mic_muted(muted) {
            return;
        }
        let track = media.local_track();
        drop(media);

        info!("Microphone {}", if muted { "muted" } else { "enabled" });
        self.emit(MeshEvent::LocalMicChanged { muted });

        if muted {
            self.signaling
                .send(ClientToServer::UserMicMuted {
                    room_id: self.room_id.clone(),
                })
                .await;
            return;
        }

        self.signaling
            .send(ClientToServer::UserMicEnabled {
                room_id: self.room_id.clone(),
                user_id: self.local_id.clone(),
            })
            .await;

        if let Some(track) = track {
            self.registry
                .for_each(|entry| {
                    let track = track.clone();
                    async move { self.attach_and_renegotiate(&entry, track).await }
                })
                .await;
        }
    }

    pub async fn toggle_microphone(&self) {
        let muted = self.mic_muted().await;
        self.set_mic_muted(!muted).await;
    }

    /// Catches an unmute whose fan-out ran while the entry was still being
    /// built and so never saw it.
    async fn attach_if_unmuted(&self, entry: &Arc<PeerEntry>) {
        let track = self.media.lock().await.track_for_new_peer();
        if let Some(track) = track {
            debug!("Microphone came on while connecting to {}", entry.participant_id());
            self.attach_and_renegotiate(entry, track).await;
        }
    }

    async fn attach_and_renegotiate(&self, entry: &Arc<PeerEntry>, track: Arc<LocalAudioTrack>) {
        match entry.attach_local_track(track).await {
            Ok(TrackAttach::NeedsOffer) => {
                debug!("Renegotiating with {} to add audio", entry.participant_id());
                self.send_offer(entry).await;
            }
            Ok(_) => {}
            Err(e) => self.report_failure(entry.participant_id(), e),
        }
    }

    pub async fn set_speaker_muted(&self, muted: bool) {
        let changed = self.media.lock().await.set_speaker_muted(muted);
        if changed {
            info!("Speaker {}", if muted { "muted" } else { "enabled" });
            apply_speaker_mute(&self.registry, muted).await;
        }
    }

    /// Tears every connection down and leaves the room. Messages that
    /// arrive afterwards are ignored.
    pub async fn leave(&self) {
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }

        let pending: Vec<ParticipantId> = self
            .pending_initiations
            .iter()
            .map(|pending| pending.key().clone())
            .collect();
        for participant in pending {
            if let Some((_, handle)) = self.pending_initiations.remove(&participant) {
                handle.abort();
            }
        }

        let participants = self.registry.participants();
        self.registry.remove_all().await;
        for participant in participants {
            self.emit(MeshEvent::PeerRemoved(participant));
        }

        self.media.lock().await.release();

        info!("Leaving room {}", self.room_id);
        self.signaling
            .send(ClientToServer::LeaveRoom {
                room_id: self.room_id.clone(),
            })
            .await;
    }
}
