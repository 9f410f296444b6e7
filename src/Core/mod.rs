pub mod config;
pub mod error;

pub use config::{RuntimeConfig, DEFAULT_CHUNK_SIZE};
pub use error::{
    ChunkError, ConfigError, HookError, QueueClosed, RtdError, RuntimeError, TransportError,
    WireError,
};
