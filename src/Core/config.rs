use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-message cap of the host channel is ~1MB; windows leave room for framing.
pub const DEFAULT_CHUNK_SIZE: usize = 950 * 1024;

/// Tunables for every runtime component.
///
/// Defaults match what the host side expects. All fields may be overridden
/// from whatever configuration source the embedding process uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Ranges covering more cells than this bypass per-cell buffering.
    pub batching_threshold: u64,
    /// Upper bound on rectangles carried by one meshed command.
    pub rects_per_command: usize,
    /// Window size for outbound chunked transfers.
    pub chunk_size: usize,
    pub async_queue_capacity: usize,
    pub async_max_batch: usize,
    /// Encoded async batches larger than this are sent as chunks.
    pub async_payload_cap: usize,
    pub send_retries: u32,
    /// First backoff delay; doubles on every failed attempt.
    pub retry_base_delay: Duration,
    pub sweep_interval: Duration,
    /// Idle time after which an unfinished transfer is dropped.
    pub transfer_ttl: Duration,
    pub rtd_send_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batching_threshold: 1024,
            rects_per_command: 32,
            chunk_size: DEFAULT_CHUNK_SIZE,
            async_queue_capacity: 1024,
            async_max_batch: 256,
            async_payload_cap: DEFAULT_CHUNK_SIZE,
            send_retries: 10,
            retry_base_delay: Duration::from_millis(5),
            sweep_interval: Duration::from_secs(30),
            transfer_ttl: Duration::from_secs(60),
            rtd_send_timeout: Duration::from_secs(1),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rects_per_command == 0 {
            return Err(ConfigError::Invalid("rects_per_command must be greater than zero"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be greater than zero"));
        }
        if self.async_queue_capacity == 0 {
            return Err(ConfigError::Invalid("async_queue_capacity must be greater than zero"));
        }
        if self.async_max_batch == 0 {
            return Err(ConfigError::Invalid("async_max_batch must be greater than zero"));
        }
        if self.send_retries == 0 {
            return Err(ConfigError::Invalid("send_retries must allow at least one attempt"));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid("sweep_interval must be non-zero"));
        }
        Ok(())
    }
}
