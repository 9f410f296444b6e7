// src/Channel/receiver.rs

use super::Structs::Frame_Structs::Frame;
use crate::Core::error::TransportError;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// The host side of a channel.
/// Hosts embedding the runtime in-process (and tests) use this to observe
/// what the guest sent.
pub struct HostReceiver {
    rx: Receiver<Frame>,
    channel_id: u32,
}

impl HostReceiver {
    pub(crate) fn new(rx: Receiver<Frame>, channel_id: u32) -> Self {
        Self { rx, channel_id }
    }

    /// Receives a frame if one is available.
    ///
    /// # Returns
    /// * `Ok(Some(frame))` if a frame was received
    /// * `Ok(None)` if no frame is available
    /// * `Err(Disconnected)` if every sender has been dropped and the channel is drained
    pub fn receive(&self) -> Result<Option<Frame>, TransportError> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected),
        }
    }

    /// Receives a frame, blocking until one is available or the guest terminates.
    pub fn receive_blocking(&self) -> Result<Frame, TransportError> {
        self.rx.recv().map_err(|_| TransportError::Disconnected)
    }

    /// Receives a frame, waiting up to the specified timeout.
    ///
    /// # Returns
    /// * `Ok(Some(frame))` if a frame was received
    /// * `Ok(None)` if the timeout was reached
    /// * `Err(Disconnected)` if the guest has terminated
    pub fn receive_timeout(&self, timeout: Duration) -> Result<Option<Frame>, TransportError> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
        }
    }

    /// Takes every frame currently queued without blocking.
    pub fn drain(&self) -> Vec<Frame> {
        self.rx.try_iter().collect()
    }

    /// Returns the channel ID for this receiver
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }
}
