pub use meshvoice_core::model::{ParticipantId, RoomId};

pub mod model {
    pub use meshvoice_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshvoice_client::*;
}
