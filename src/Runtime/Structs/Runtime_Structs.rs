// Plain result types handed back by the runtime components

/// A response written into the caller's buffer.
/// `len` bytes at the start of the buffer are valid; `msg_type` tells the host
/// how to decode them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub len: usize,
    pub msg_type: u32,
}

/// Result of feeding one inbound window to the reassembly table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkProgress {
    /// More windows are expected for this transfer.
    Partial { id: u64, received: usize, total: usize },
    /// Every byte has arrived; the transfer has been removed from the table.
    Complete { inner_type: u32, payload: Vec<u8> },
}

/// Transfers dropped by one eviction sweep.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub incoming: usize,
    pub outgoing: usize,
}

impl EvictionReport {
    pub fn total(&self) -> usize {
        self.incoming + self.outgoing
    }
}

/// Snapshot of the async batcher's delivery counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AsyncStats {
    pub batches_flushed: u64,
    pub results_delivered: u64,
    pub results_dropped: u64,
}
