use super::{GuestSender, HostReceiver};
use crate::Core::error::ConfigError;

pub struct ChannelBuilder {
    slots: usize,
    max_message_size: usize,
    channel_id: u32,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            slots: 1024,
            max_message_size: 1024 * 1024, // 1MB per message
            channel_id: 0,
        }
    }
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of concurrent request slots.
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_channel_id(mut self, channel_id: u32) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn build(self) -> Result<(GuestSender, HostReceiver), ConfigError> {
        if self.slots == 0 {
            return Err(ConfigError::Invalid("channel needs at least one slot"));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid("max_message_size must be greater than zero"));
        }
        let (tx, rx) = crossbeam_channel::bounded(self.slots);
        Ok((
            GuestSender::new(tx, self.channel_id, self.max_message_size),
            HostReceiver::new(rx, self.channel_id),
        ))
    }
}
