mod channel_signaling;
mod signaling_output;

pub use channel_signaling::*;
pub use signaling_output::*;
