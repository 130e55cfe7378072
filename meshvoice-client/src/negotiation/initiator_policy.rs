use meshvoice_core::ParticipantId;
use serde::Deserialize;

/// Decides which side of a pair sends the first offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiatorPolicy {
    /// The lower participant id offers, the higher one waits for it. On a
    /// renegotiation collision the lower id keeps its offer.
    #[default]
    LowerIdInitiates,
    /// Every side offers to every participant it discovers. Two clients that
    /// discover each other at once both offer and collide.
    Always,
}

impl InitiatorPolicy {
    pub fn should_initiate(&self, local: &ParticipantId, remote: &ParticipantId) -> bool {
        match self {
            Self::LowerIdInitiates => local < remote,
            Self::Always => true,
        }
    }

    /// Whether `local` keeps its outstanding offer when `remote` offers too.
    pub fn wins_collision(&self, local: &ParticipantId, remote: &ParticipantId) -> bool {
        match self {
            Self::LowerIdInitiates => local < remote,
            Self::Always => false,
        }
    }
}
