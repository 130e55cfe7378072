mod mesh_session;
mod session_command;

pub use mesh_session::*;
pub use session_command::*;
