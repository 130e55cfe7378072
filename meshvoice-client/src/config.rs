use meshvoice_core::IceServerConfig;
use serde::Deserialize;
use std::time::Duration;

use crate::negotiation::InitiatorPolicy;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_3: &str = "stun:stun2.l.google.com:19302";

/// Settings for one mesh session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// Pause before offering to a newly discovered participant, giving local
    /// capture time to settle.
    pub initiate_delay_ms: u64,
    /// Deadline for reaching an applied remote description. `None` waits forever.
    pub negotiation_timeout_ms: Option<u64>,
    pub candidate_queue_limit: usize,
    pub initiator_policy: InitiatorPolicy,
}

impl MeshConfig {
    pub fn initiate_delay(&self) -> Duration {
        Duration::from_millis(self.initiate_delay_ms)
    }

    pub fn negotiation_timeout(&self) -> Option<Duration> {
        self.negotiation_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_initiate_delay(mut self, delay: Duration) -> Self {
        self.initiate_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_negotiation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.negotiation_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_candidate_queue_limit(mut self, limit: usize) -> Self {
        self.candidate_queue_limit = limit;
        self
    }

    pub fn with_initiator_policy(mut self, policy: InitiatorPolicy) -> Self {
        self.initiator_policy = policy;
        self
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServerConfig::stun(DEFAULT_STUN_ADDR),
                IceServerConfig::stun(DEFAULT_STUN_ADDR_2),
                IceServerConfig::stun(DEFAULT_STUN_ADDR_3),
            ],
            initiate_delay_ms: 1000,
            negotiation_timeout_ms: Some(30_000),
            candidate_queue_limit: 64,
            initiator_policy: InitiatorPolicy::default(),
        }
    }
}
