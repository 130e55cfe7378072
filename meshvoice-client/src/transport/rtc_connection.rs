use async_trait::async_trait;
use meshvoice_core::{IceCandidate, IceServerConfig, ParticipantId, SdpKind, SessionDescription};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_remote::TrackRemote;

use crate::config::MeshConfig;
use crate::error::{MeshError, Result};
use crate::media::LocalAudioTrack;
use crate::peer::EntryId;
use crate::transport::{ConnectionFactory, InboundAudio, MediaConnection, TransportEvent};

/// Inbound RTP payloads held per track before playback drains them.
const INBOUND_AUDIO_BUFFER: usize = 64;
const RTP_READ_BUFFER: usize = 1500;

/// Creates webrtc-rs backed connections.
#[derive(Clone)]
pub struct RtcConnectionFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl RtcConnectionFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }

    pub fn from_config(config: &MeshConfig) -> Self {
        Self::new(config.ice_servers.clone())
    }
}

#[async_trait]
impl ConnectionFactory for RtcConnectionFactory {
    async fn create(
        &self,
        participant: &ParticipantId,
        entry: EntryId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn MediaConnection>> {
        let connection =
            RtcConnection::new(participant.clone(), entry, &self.ice_servers, events).await?;
        Ok(Arc::new(connection))
    }
}

pub struct RtcConnection {
    participant_id: ParticipantId,
    entry: EntryId,
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcConnection {
    /// Builds the peer connection. Candidate discovery starts with the first
    /// local description; every event lands in `event_tx`.
    pub async fn new(
        participant_id: ParticipantId,
        entry: EntryId,
        ice_servers: &[IceServerConfig],
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = event_tx.clone();
        let uid_state = participant_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let uid = uid_state.clone();

                Box::pin(async move {
                    info!("Peer connection state for {} ({}): {:?}", uid, entry, s);
                    let _ = tx
                        .send(TransportEvent::StateChanged(uid, entry, s.into()))
                        .await;
                })
            },
        ));

        let ice_tx = event_tx.clone();
        let uid_ice = participant_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let uid = uid_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_mline_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(uid, entry, candidate))
                    .await;
            })
        }));

        let track_tx = event_tx;
        let uid_track = participant_id.clone();
        peer_connection.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let tx = track_tx.clone();
            let uid = uid_track.clone();

            Box::pin(async move {
                if track.kind() != RTPCodecType::Audio {
                    return;
                }
                debug!("Inbound audio track {} from {}", track.id(), uid);

                let (packets_tx, packets_rx) = mpsc::channel(INBOUND_AUDIO_BUFFER);
                let inbound = InboundAudio {
                    track_id: track.id(),
                    packets: packets_rx,
                };

                // The handler must return promptly, so the read loop gets its own task.
                tokio::spawn(async move {
                    let mut buf = vec![0u8; RTP_READ_BUFFER];
                    while let Ok((packet, _)) = track.read(&mut buf).await {
                        if let Err(TrySendError::Closed(_)) = packets_tx.try_send(packet.payload) {
                            break;
                        }
                    }
                });

                let _ = tx
                    .send(TransportEvent::RemoteAudio(uid, entry, inbound))
                    .await;
            })
        }));

        Ok(Self {
            participant_id,
            entry,
            peer_connection,
        })
    }

    /// Offers from a muted participant still need an audio section, or the
    /// remote side could never send its own audio back.
    async fn ensure_audio_receiver(&self) -> Result<()> {
        let transceivers = self.peer_connection.get_transceivers().await;
        if transceivers
            .iter()
            .any(|t| t.kind() == RTPCodecType::Audio)
        {
            return Ok(());
        }

        self.peer_connection
            .add_transceiver_from_kind(
                RTPCodecType::Audio,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await?;
        Ok(())
    }

    async fn applied_local_description(&self) -> Result<SessionDescription> {
        let local = self
            .peer_connection
            .local_description()
            .await
            .ok_or(MeshError::MissingLocalDescription)?;
        from_rtc(local)
    }
}

#[async_trait]
impl MediaConnection for RtcConnection {
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.ensure_audio_receiver().await?;
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection.set_local_description(offer).await?;
        self.applied_local_description().await
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection.set_local_description(answer).await?;
        self.applied_local_description().await
    }

    async fn rollback_local_offer(&self) -> Result<()> {
        let Some(pending) = self.peer_connection.pending_local_description().await else {
            return Ok(());
        };
        // The rollback description has no public constructor.
        let rollback: RTCSessionDescription =
            serde_json::from_value(json!({ "type": "rollback", "sdp": pending.sdp }))?;
        self.peer_connection.set_local_description(rollback).await?;
        debug!("Rolled back local offer to {} ({})", self.participant_id, self.entry);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn add_audio_track(&self, track: Arc<LocalAudioTrack>) -> Result<()> {
        let sender = self.peer_connection.add_track(track.rtc_track()).await?;

        // RTCP has to be drained for the interceptors to work.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; RTP_READ_BUFFER];
            while let Ok((_, _)) = sender.read(&mut rtcp_buf).await {}
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp)?,
    };
    Ok(rtc)
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription> {
    match description.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(description.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(description.sdp)),
        other => Err(MeshError::Sdp(format!("unexpected local description {other}"))),
    }
}
