// Envelope for one message crossing the channel

/// Transport-level metadata plus the encoded message body.
///
/// The body is opaque to the channel; `msg_type` tells the receiving side how
/// to decode it (see [`crate::Wire::msg_type`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub message_id: u64,
    pub timestamp_ns: u64,
    pub channel_id: u32,
    pub msg_type: u32,
    pub sender_pid: u32,
    pub payload: Vec<u8>,
}
