mod media_connection;
mod rtc_connection;
mod transport_event;

pub use media_connection::*;
pub use rtc_connection::*;
pub use transport_event::*;
