use crate::Runtime::{AsyncBatcher, ChunkManager, CommandBatcher, RefCache, RtdManager, Runtime};
use std::fmt;

/// Debug function for CommandBatcher
///
/// Shows pending work only; cell values are not dumped.
pub fn debug_command_batcher(batcher: &CommandBatcher, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CommandBatcher")
        .field("buffered_cells", &batcher.buffered_cells())
        .field("queued_commands", &batcher.queued_commands())
        .finish_non_exhaustive()
}

/// Debug function for ChunkManager
///
/// Shows:
/// - Window size and TTL
/// - Number of live inbound and outbound transfers
pub fn debug_chunk_manager(manager: &ChunkManager, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChunkManager")
        .field("chunk_size", &manager.chunk_size())
        .field("ttl", &manager.ttl())
        .field("incoming", &manager.incoming_len())
        .field("outgoing", &manager.outgoing_len())
        .finish()
}

pub fn debug_ref_cache(cache: &RefCache, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RefCache")
        .field("entries", &cache.len())
        .finish()
}

/// Debug function for RtdManager
///
/// The transport itself is opaque; only whether one is attached is shown.
pub fn debug_rtd_manager(manager: &RtdManager, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RtdManager")
        .field("topics", &manager.topic_count())
        .field("connected", &manager.is_connected())
        .field("send_timeout", &manager.send_timeout())
        .finish()
}

pub fn debug_async_batcher(batcher: &AsyncBatcher, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AsyncBatcher")
        .field("capacity", &batcher.capacity)
        .field("max_batch", &batcher.max_batch)
        .field("pending", &batcher.pending())
        .field("closed", &batcher.is_closed())
        .finish()
}

pub fn debug_runtime(runtime: &Runtime, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Runtime")
        .field("commands", runtime.commands())
        .field("chunks", runtime.chunks())
        .field("ref_cache", runtime.ref_cache())
        .field("rtd", runtime.rtd())
        .field("async_results", runtime.async_results())
        .field("async_stats", &runtime.async_stats())
        .finish_non_exhaustive()
}
