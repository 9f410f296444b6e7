use crate::Core::error::TransportError;
use std::time::Duration;

mod builder;
mod receiver;
mod sender;

pub use builder::ChannelBuilder;
pub use receiver::HostReceiver;
pub use sender::GuestSender;

pub mod Structs {
    pub mod Frame_Structs;
    pub use Frame_Structs::Frame; // re-export for stable path
}

pub use Structs::Frame;

/// Guest-to-host message path used by the components that push data to the
/// host on their own (async results, RTD updates).
pub trait Transport: Send + Sync {
    /// Hands a message to the host without waiting for a free slot.
    fn send(&self, payload: &[u8], msg_type: u32) -> Result<(), TransportError>;

    /// Hands a message to the host, waiting at most `timeout` for a free slot.
    fn send_timeout(
        &self,
        payload: &[u8],
        msg_type: u32,
        timeout: Duration,
    ) -> Result<(), TransportError>;
}
