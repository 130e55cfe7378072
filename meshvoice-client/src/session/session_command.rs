use meshvoice_core::ServerToClient;

/// Input to a running mesh session, from the relay connection or the UI.
#[derive(Debug)]
pub enum SessionCommand {
    /// A relay message that is already decoded.
    Signal(ServerToClient),

    /// A relay message as JSON text, straight off the wire.
    RawSignal(String),

    SetMicMuted(bool),

    ToggleMic,

    SetSpeakerMuted(bool),

    /// Leave the room and stop the session.
    Leave,
}
