pub mod codec;
pub mod scalar;

pub mod Structs {
    pub mod Message_Structs;
    pub use Message_Structs::*; // re-export for stable path
}

pub use codec::{decode, encode};
pub use scalar::{CellScalar, Grid, NumGrid, PlainScalar, ScalarValue};
pub use Structs::*;

/// Numeric message-type tags carried next to every payload on the channel.
pub mod msg_type {
    // System (0-127)
    pub const ACK: u32 = 2;

    // Runtime (128+)
    pub const BATCH_ASYNC_RESPONSE: u32 = 128;
    pub const CHUNK: u32 = 129;
    pub const SET_REF_CACHE: u32 = 130;
    pub const CALCULATION_ENDED: u32 = 131;
    pub const CALCULATION_CANCELED: u32 = 132;

    // RTD (133-139)
    pub const RTD_CONNECT: u32 = 133;
    pub const RTD_DISCONNECT: u32 = 134;
    pub const RTD_UPDATE: u32 = 135;
    pub const RTD_HEARTBEAT: u32 = 136;

    /// First tag available to generated user functions.
    pub const USER_START: u32 = 140;
}
