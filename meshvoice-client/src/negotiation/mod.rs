mod initiator_policy;
mod mesh_event;
mod negotiation_controller;

pub use initiator_policy::*;
pub use mesh_event::*;
pub use negotiation_controller::*;
