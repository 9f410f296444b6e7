// In src/Channel/sender.rs
use super::Structs::Frame_Structs::Frame;
use super::Transport;
use crate::Core::error::TransportError;
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The guest (plugin) side of a channel.
/// Each send occupies one of the channel's request slots until the host
/// receives it; a full channel reports [`TransportError::Busy`].
pub struct GuestSender {
    tx: Sender<Frame>,
    channel_id: u32,
    max_message_size: usize,
    sequence_counter: CachePadded<AtomicU64>,
}

impl GuestSender {
    pub(crate) fn new(tx: Sender<Frame>, channel_id: u32, max_message_size: usize) -> Self {
        Self {
            tx,
            channel_id,
            max_message_size,
            sequence_counter: CachePadded::new(AtomicU64::new(0)),
        }
    }

    fn frame(&self, payload: &[u8], msg_type: u32) -> Result<Frame, TransportError> {
        // Check message size before claiming a slot
        if payload.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: payload.len(),
                max: self.max_message_size,
            });
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        Ok(Frame {
            message_id: self.sequence_counter.fetch_add(1, Ordering::Relaxed),
            timestamp_ns: now,
            channel_id: self.channel_id,
            msg_type,
            sender_pid: std::process::id(),
            payload: payload.to_vec(),
        })
    }

    /// Sends a message without waiting for a free slot.
    ///
    /// # Returns
    /// * `Ok(())` if the message was handed to the channel
    /// * `Err(Busy)` if every slot is taken
    /// * `Err(MessageTooLarge)` if the payload exceeds the per-message cap
    /// * `Err(Disconnected)` if the host side has gone away
    pub fn send(&self, payload: &[u8], msg_type: u32) -> Result<(), TransportError> {
        let frame = self.frame(payload, msg_type)?;
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::Busy),
            Err(TrySendError::Disconnected(_)) => Err(TransportError::Disconnected),
        }
    }

    /// Sends a message, waiting up to `timeout` for a free slot.
    pub fn send_timeout(
        &self,
        payload: &[u8],
        msg_type: u32,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let frame = self.frame(payload, msg_type)?;
        match self.tx.send_timeout(frame, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(TransportError::Timeout(timeout)),
            Err(SendTimeoutError::Disconnected(_)) => Err(TransportError::Disconnected),
        }
    }

    /// Returns the channel ID for this sender
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// Returns the maximum message size that can be sent
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Number of messages sent but not yet received by the host.
    pub fn in_flight(&self) -> usize {
        self.tx.len()
    }
}

impl Transport for GuestSender {
    fn send(&self, payload: &[u8], msg_type: u32) -> Result<(), TransportError> {
        GuestSender::send(self, payload, msg_type)
    }

    fn send_timeout(
        &self,
        payload: &[u8],
        msg_type: u32,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        GuestSender::send_timeout(self, payload, msg_type, timeout)
    }
}
