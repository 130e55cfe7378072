use dashmap::DashMap;
use futures::future::join_all;
use meshvoice_core::ParticipantId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use crate::error::{MeshError, Result};
use crate::media::LocalAudioTrack;
use crate::peer::{EntryId, PeerEntry};
use crate::transport::{ConnectionFactory, TransportEvent};

/// Remote participant id → its live connection entry.
///
/// Creation and removal are serialized by one registry-wide lock, held from
/// the existence check until the map write, so two overlapping discoveries of
/// the same participant can never build two connections.
pub struct PeerRegistry {
    local_id: ParticipantId,
    entries: DashMap<ParticipantId, Arc<PeerEntry>>,
    create_lock: Mutex<()>,
    next_id: AtomicU64,
    factory: Arc<dyn ConnectionFactory>,
    transport_tx: mpsc::Sender<TransportEvent>,
    candidate_queue_limit: usize,
}

impl PeerRegistry {
    pub fn new(
        local_id: ParticipantId,
        factory: Arc<dyn ConnectionFactory>,
        transport_tx: mpsc::Sender<TransportEvent>,
        candidate_queue_limit: usize,
    ) -> Self {
        Self {
            local_id,
            entries: DashMap::new(),
            create_lock: Mutex::new(()),
            next_id: AtomicU64::new(0),
            factory,
            transport_tx,
            candidate_queue_limit,
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    /// Returns the live entry for `participant`, creating it when absent.
    /// The flag is `true` when this call created it.
    pub async fn get_or_create(
        &self,
        participant: &ParticipantId,
        initial_track: Option<Arc<LocalAudioTrack>>,
    ) -> Result<(Arc<PeerEntry>, bool)> {
        if participant == &self.local_id {
            return Err(MeshError::LocalParticipant);
        }

        let _guard = self.create_lock.lock().await;
        if let Some(existing) = self.get(participant) {
            return Ok((existing, false));
        }

        let id = EntryId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let connection = self
            .factory
            .create(participant, id, self.transport_tx.clone())
            .await?;
        let entry = Arc::new(PeerEntry::new(
            participant.clone(),
            id,
            connection,
            self.candidate_queue_limit,
        ));

        if let Some(track) = initial_track {
            if let Err(e) = entry.attach_local_track(track).await {
                warn!("Could not attach local audio to {}: {}", participant, e);
            }
        }

        self.entries.insert(participant.clone(), entry.clone());
        info!("Created connection entry for {} ({})", participant, id);
        Ok((entry, true))
    }

    pub fn get(&self, participant: &ParticipantId) -> Option<Arc<PeerEntry>> {
        self.entries.get(participant).map(|entry| entry.value().clone())
    }

    /// The entry for `participant` only if it is still generation `id`.
    pub fn current(&self, participant: &ParticipantId, id: EntryId) -> Option<Arc<PeerEntry>> {
        self.get(participant)
            .filter(|entry| entry.id() == id && !entry.is_closed())
    }

    pub fn is_current(&self, entry: &PeerEntry) -> bool {
        self.current(entry.participant_id(), entry.id()).is_some()
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.entries.contains_key(participant)
    }

    /// Closes and drops the entry. Returns `false` when there was none.
    pub async fn remove(&self, participant: &ParticipantId) -> bool {
        let removed = {
            let _guard = self.create_lock.lock().await;
            self.entries.remove(participant)
        };
        let Some((_, entry)) = removed else {
            return false;
        };
        entry.close().await;
        true
    }

    /// Closes `entry` and drops it from the map if it is still the current
    /// generation for its participant.
    pub async fn remove_entry(&self, entry: &Arc<PeerEntry>) -> bool {
        let removed = {
            let _guard = self.create_lock.lock().await;
            self.entries
                .remove_if(entry.participant_id(), |_, current| current.id() == entry.id())
                .is_some()
        };
        entry.close().await;
        removed
    }

    pub fn entries(&self) -> Vec<Arc<PeerEntry>> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Runs `f` on a snapshot of the current entries, one at a time. Entries
    /// created while it runs are not visited.
    pub async fn for_each<F, Fut>(&self, mut f: F)
    where
        F: FnMut(Arc<PeerEntry>) -> Fut,
        Fut: Future<Output = ()>,
    {
        for entry in self.entries() {
            f(entry).await;
        }
    }

    pub fn participants(&self) -> Vec<ParticipantId> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub async fn remove_all(&self) {
        let drained: Vec<Arc<PeerEntry>> = {
            let _guard = self.create_lock.lock().await;
            let drained = self.entries();
            self.entries.clear();
            drained
        };
        join_all(drained.iter().map(|entry| entry.close())).await;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
