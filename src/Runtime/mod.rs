mod async_batcher;
mod builder;
mod chunk_manager;
mod command_batcher;
mod debug;
mod handlers;
mod mesh;
mod ref_cache;
mod rtd;

pub use async_batcher::{AsyncBatcher, AsyncCounters, AsyncFlusher};
pub use builder::{Runtime, RuntimeBuilder};
pub use chunk_manager::{ChunkManager, MAX_TRANSFER};
pub use command_batcher::{CommandBatcher, QueuedCommand};
pub use handlers::{
    CycleHook, EventHooks, RtdConnectHook, RtdDisconnectHook, SystemHandler, UserDispatch,
};
pub use mesh::greedy_mesh;
pub use ref_cache::RefCache;
pub use rtd::{RtdManager, RtdValue};

pub mod Structs {
    pub mod Runtime_Structs;
    pub use Runtime_Structs::{AsyncStats, ChunkProgress, EvictionReport, Reply}; // re-export for stable path
}

pub use Structs::{AsyncStats, ChunkProgress, EvictionReport, Reply};
