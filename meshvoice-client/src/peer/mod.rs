mod candidate_buffer;
mod peer_entry;
mod peer_registry;

pub use candidate_buffer::*;
pub use peer_entry::*;
pub use peer_registry::*;
