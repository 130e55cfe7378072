mod audio_capture;
mod local_audio_track;
mod local_media;
mod playback;

pub use audio_capture::*;
pub use local_audio_track::*;
pub use local_media::*;
pub use playback::*;
