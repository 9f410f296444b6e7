use super::Structs::Runtime_Structs::{ChunkProgress, EvictionReport, Reply};
use crate::Core::config::RuntimeConfig;
use crate::Core::error::ChunkError;
use crate::Wire::codec;
use crate::Wire::msg_type;
use crate::Wire::Structs::Chunk;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Largest payload whose size and offsets fit the `u32` chunk header.
pub const MAX_TRANSFER: usize = u32::MAX as usize;

/// Inbound transfer being reassembled.
pub(crate) struct ChunkBuffer {
    pub(crate) data: Vec<u8>,
    pub(crate) received: usize,
    pub(crate) inner_type: u32,
    pub(crate) last_touched: Instant,
}

/// Outbound transfer waiting for the peer to pull its next window.
pub(crate) struct OutgoingChunk {
    pub(crate) data: Vec<u8>,
    pub(crate) offset: usize,
    pub(crate) inner_type: u32,
    pub(crate) last_touched: Instant,
}

/// Splits payloads that exceed one response into windows and reassembles
/// payloads the host sends in windows.
///
/// Both directions are keyed by a 64-bit transfer id and live in separate
/// tables with their own lock. Abandoned transfers are reaped by
/// [`evict_expired`](Self::evict_expired), usually from the thread started by
/// [`spawn_sweeper`](Self::spawn_sweeper).
pub struct ChunkManager {
    chunk_size: usize,
    ttl: Duration,
    max_transfer: usize,
    pub(crate) incoming: Mutex<HashMap<u64, ChunkBuffer>>,
    pub(crate) outgoing: Mutex<HashMap<u64, OutgoingChunk>>,
}

impl ChunkManager {
    pub fn new(chunk_size: usize, ttl: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            ttl,
            max_transfer: MAX_TRANSFER,
            incoming: Mutex::new(HashMap::new()),
            outgoing: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.chunk_size, config.transfer_ttl)
    }

    /// Lowers the outbound payload limit. Values above `u32::MAX` are clamped.
    pub fn with_max_transfer(mut self, max: usize) -> Self {
        self.max_transfer = max.min(MAX_TRANSFER);
        self
    }

    pub fn max_transfer(&self) -> usize {
        self.max_transfer
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Writes one inbound window at its declared offset.
    ///
    /// # Returns
    /// * `Ok(Partial)` while bytes are still missing
    /// * `Ok(Complete)` once `received >= total`; the transfer is removed
    /// * `Err(OutOfBounds)` if the window does not fit the declared total.
    ///   Nothing is written and nothing is counted.
    pub fn accept_chunk(&self, chunk: Chunk) -> Result<ChunkProgress, ChunkError> {
        let Chunk {
            id,
            total_size,
            offset,
            data,
            inner_type,
        } = chunk;
        let offset = offset as usize;
        let now = Instant::now();

        let mut incoming = self.incoming.lock();
        let buf = incoming.entry(id).or_insert_with(|| ChunkBuffer {
            data: vec![0u8; total_size as usize],
            received: 0,
            inner_type,
            last_touched: now,
        });
        buf.last_touched = now;

        let total = buf.data.len();
        let end = match offset.checked_add(data.len()) {
            Some(end) if end <= total => end,
            _ => {
                return Err(ChunkError::OutOfBounds {
                    id,
                    offset,
                    len: data.len(),
                    total,
                })
            }
        };

        buf.data[offset..end].copy_from_slice(&data);
        buf.received += data.len();

        if buf.received < total {
            return Ok(ChunkProgress::Partial {
                id,
                received: buf.received,
                total,
            });
        }

        let payload = std::mem::take(&mut buf.data);
        let inner_type = buf.inner_type;
        incoming.remove(&id);

        debug!("transfer {id} reassembled ({total} bytes)");
        Ok(ChunkProgress::Complete {
            inner_type,
            payload,
        })
    }

    /// Registers `payload` as a new outbound transfer and returns its first
    /// window, already counted as sent. The transfer id is random, non-zero
    /// and unique among live outbound transfers.
    ///
    /// Payloads longer than [`max_transfer`](Self::max_transfer) are refused
    /// since window offsets and totals travel as `u32`.
    pub fn start_outgoing(&self, payload: Vec<u8>, inner_type: u32) -> Result<Chunk, ChunkError> {
        if payload.len() > self.max_transfer {
            return Err(ChunkError::TransferTooLarge {
                size: payload.len(),
                max: self.max_transfer,
            });
        }

        let mut outgoing = self.outgoing.lock();

        let id = loop {
            let candidate = fastrand::u64(1..);
            if !outgoing.contains_key(&candidate) {
                break candidate;
            }
        };

        debug!(
            "transfer {id} registered: {} bytes in windows of {}",
            payload.len(),
            self.chunk_size
        );

        let mut transfer = OutgoingChunk {
            data: payload,
            offset: 0,
            inner_type,
            last_touched: Instant::now(),
        };
        let first = self.window(id, &transfer);
        transfer.offset = first.data.len();
        if transfer.offset < transfer.data.len() {
            outgoing.insert(id, transfer);
        }
        Ok(first)
    }

    /// Returns the next window of an outbound transfer, advancing its cursor.
    /// The transfer is removed together with its final window; unknown ids
    /// yield `None`.
    pub fn next_chunk(&self, id: u64) -> Option<Chunk> {
        let mut outgoing = self.outgoing.lock();
        let transfer = outgoing.get_mut(&id)?;

        let chunk = self.window(id, transfer);
        advance(&mut outgoing, &chunk);
        Some(chunk)
    }

    /// Returns the next window without moving the cursor. Pair with
    /// [`commit_chunk`](Self::commit_chunk) once the window has been handed
    /// to the peer.
    pub fn peek_chunk(&self, id: u64) -> Option<Chunk> {
        let mut outgoing = self.outgoing.lock();
        let transfer = outgoing.get_mut(&id)?;
        transfer.last_touched = Instant::now();
        Some(self.window(id, transfer))
    }

    /// Moves the cursor past a window obtained from
    /// [`peek_chunk`](Self::peek_chunk). Returns `false` if the transfer is
    /// gone or its cursor no longer sits at the window's offset.
    pub fn commit_chunk(&self, chunk: &Chunk) -> bool {
        advance(&mut self.outgoing.lock(), chunk)
    }

    /// Drops an outbound transfer before it is exhausted.
    pub fn cancel_outgoing(&self, id: u64) -> bool {
        self.outgoing.lock().remove(&id).is_some()
    }

    fn window(&self, id: u64, transfer: &OutgoingChunk) -> Chunk {
        let start = transfer.offset;
        let end = start.saturating_add(self.chunk_size).min(transfer.data.len());

        // start_outgoing keeps data.len() within u32
        Chunk {
            id,
            total_size: transfer.data.len() as u32,
            offset: start as u32,
            data: transfer.data[start..end].to_vec(),
            inner_type: transfer.inner_type,
        }
    }

    /// Writes `payload` into `resp` as a `msg_type` message if it fits,
    /// otherwise as the first [`Chunk`] of a new outbound transfer.
    ///
    /// Returns `None` when not even the chunk framing fits `resp`; the error
    /// is logged and the transfer discarded. The host gets no reply.
    pub fn send_or_chunk(&self, payload: Vec<u8>, resp: &mut [u8], msg_type: u32) -> Option<Reply> {
        if payload.len() <= resp.len() {
            resp[..payload.len()].copy_from_slice(&payload);
            return Some(Reply {
                len: payload.len(),
                msg_type,
            });
        }

        let first = match self.start_outgoing(payload, msg_type) {
            Ok(first) => first,
            Err(e) => {
                error!("dropping response: {e}");
                return None;
            }
        };
        let id = first.id;

        let encoded = match codec::encode(&first) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("failed to encode first window of transfer {id}: {e}");
                self.cancel_outgoing(id);
                return None;
            }
        };

        if encoded.len() > resp.len() {
            let err = ChunkError::FramingTooLarge {
                size: encoded.len(),
                capacity: resp.len(),
            };
            error!("dropping response for transfer {id}: {err}");
            self.cancel_outgoing(id);
            return None;
        }

        resp[..encoded.len()].copy_from_slice(&encoded);
        Some(Reply {
            len: encoded.len(),
            msg_type: msg_type::CHUNK,
        })
    }

    /// Removes every transfer not touched within the TTL.
    pub fn evict_expired(&self) -> EvictionReport {
        self.evict_idle_at(Instant::now())
    }

    /// Same as [`evict_expired`](Self::evict_expired) with an explicit clock.
    pub fn evict_idle_at(&self, now: Instant) -> EvictionReport {
        let ttl = self.ttl;
        let expired = |touched: Instant| now.saturating_duration_since(touched) > ttl;

        let incoming = {
            let mut table = self.incoming.lock();
            let before = table.len();
            table.retain(|_, buf| !expired(buf.last_touched));
            before - table.len()
        };

        let outgoing = {
            let mut table = self.outgoing.lock();
            let before = table.len();
            table.retain(|_, transfer| !expired(transfer.last_touched));
            before - table.len()
        };

        let report = EvictionReport { incoming, outgoing };
        if report.total() > 0 {
            warn!(
                "evicted {} stale inbound and {} stale outbound transfers",
                incoming, outgoing
            );
        }
        report
    }

    pub fn incoming_len(&self) -> usize {
        self.incoming.lock().len()
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.lock().len()
    }

    /// Starts a background thread that calls [`evict_expired`](Self::evict_expired)
    /// every `interval`. The thread holds only a weak reference and exits on
    /// its next tick once the manager is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> io::Result<JoinHandle<()>> {
        let weak: Weak<Self> = Arc::downgrade(self);

        thread::Builder::new()
            .name("xlpr-chunk-sweeper".into())
            .spawn(move || {
                info!("chunk sweeper started (every {interval:?})");
                loop {
                    thread::sleep(interval);
                    match weak.upgrade() {
                        Some(manager) => {
                            manager.evict_expired();
                        }
                        None => break,
                    }
                }
                info!("chunk sweeper stopped");
            })
    }
}

/// Moves a transfer's cursor past `chunk` and drops the transfer once its
/// last byte has gone out.
fn advance(outgoing: &mut HashMap<u64, OutgoingChunk>, chunk: &Chunk) -> bool {
    let Some(transfer) = outgoing.get_mut(&chunk.id) else {
        return false;
    };
    if transfer.offset != chunk.offset as usize {
        return false;
    }

    transfer.offset += chunk.data.len();
    transfer.last_touched = Instant::now();
    if transfer.offset >= transfer.data.len() {
        outgoing.remove(&chunk.id);
        debug!("transfer {} fully sent", chunk.id);
    }
    true
}
