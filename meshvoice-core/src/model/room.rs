use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::model::participant::RawId;

/// Room scope stamped on every outbound signal. The relay is trusted to
/// deliver only messages for the current room, so inbound copies are never
/// checked against it.
#[derive(Debug, Serialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
