use std::time::Duration;
use thiserror::Error;

/// Errors raised by a [`Transport`](crate::Channel::Transport) when a message
/// could not be handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Every request slot is taken. The host will drain it; try again.
    #[error("channel busy: no free request slot")]
    Busy,

    #[error("message too large ({size} > {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("host side of the channel has terminated")]
    Disconnected,
}

impl TransportError {
    /// Transient errors clear up on their own and are worth a retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Busy | TransportError::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("failed to decode message: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("chunk window out of bounds for transfer {id}: offset {offset} + len {len} > total {total}")]
    OutOfBounds {
        id: u64,
        offset: usize,
        len: usize,
        total: usize,
    },

    #[error("chunk framing does not fit the response buffer ({size} > {capacity})")]
    FramingTooLarge { size: usize, capacity: usize },

    #[error("payload of {size} bytes exceeds the transfer limit of {max}")]
    TransferTooLarge { size: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum RtdError {
    #[error("RTD server not connected")]
    NotConnected,

    #[error("failed to send update to topic {topic_id}: {source}")]
    Send {
        topic_id: i32,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Wire(#[from] WireError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid runtime configuration: {0}")]
    Invalid(&'static str),
}

/// Returned when queueing onto a batcher whose worker has been shut down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("async result queue is closed")]
pub struct QueueClosed;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn runtime thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Error type returned by user-supplied event hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;
