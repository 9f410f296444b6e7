use super::chunk_manager::ChunkManager;
use super::command_batcher::CommandBatcher;
use super::ref_cache::RefCache;
use super::rtd::RtdManager;
use super::Structs::Runtime_Structs::{ChunkProgress, Reply};
use crate::Core::error::{ChunkError, HookError};
use crate::Wire::codec;
use crate::Wire::msg_type;
use crate::Wire::Structs::{
    Ack, Chunk, RtdConnectRequest, RtdConnectResponse, RtdDisconnectRequest, SetRefCacheRequest,
};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

pub type CycleHook = Arc<dyn Fn() -> Result<(), HookError> + Send + Sync>;
pub type RtdConnectHook = Arc<dyn Fn(&RtdConnectRequest) -> Result<(), HookError> + Send + Sync>;
pub type RtdDisconnectHook =
    Arc<dyn Fn(&RtdDisconnectRequest) -> Result<(), HookError> + Send + Sync>;

/// Callback for message types the runtime does not handle itself. Also
/// receives payloads reassembled from chunks.
pub type UserDispatch<'a> = dyn FnMut(u32, &[u8], &mut [u8]) -> Option<Reply> + 'a;

/// User callbacks run around system messages. Errors and panics are logged.
#[derive(Clone, Default)]
pub struct EventHooks {
    pub on_calculation_ended: Option<CycleHook>,
    pub on_calculation_canceled: Option<CycleHook>,
    pub on_rtd_connect: Option<RtdConnectHook>,
    pub on_rtd_disconnect: Option<RtdDisconnectHook>,
}

impl EventHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs synchronously before pending commands are flushed, so commands it
    /// schedules go out with this cycle.
    pub fn with_calculation_ended<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_calculation_ended = Some(Arc::new(hook));
        self
    }

    pub fn with_calculation_canceled<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_calculation_canceled = Some(Arc::new(hook));
        self
    }

    pub fn with_rtd_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RtdConnectRequest) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_rtd_connect = Some(Arc::new(hook));
        self
    }

    pub fn with_rtd_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RtdDisconnectRequest) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_rtd_disconnect = Some(Arc::new(hook));
        self
    }
}

/// Turns inbound system messages into component calls and replies.
///
/// Every handler writes its reply into the caller's buffer and returns
/// `Some(Reply)`, or returns `None` when the host gets no reply. Malformed
/// payloads are logged and answered with `None`.
pub struct SystemHandler {
    commands: Arc<CommandBatcher>,
    chunks: Arc<ChunkManager>,
    ref_cache: Arc<RefCache>,
    rtd: Arc<RtdManager>,
    hooks: EventHooks,
}

impl SystemHandler {
    pub fn new(
        commands: Arc<CommandBatcher>,
        chunks: Arc<ChunkManager>,
        ref_cache: Arc<RefCache>,
        rtd: Arc<RtdManager>,
        hooks: EventHooks,
    ) -> Self {
        Self {
            commands,
            chunks,
            ref_cache,
            rtd,
            hooks,
        }
    }

    /// Routes one inbound message. Tags the runtime does not own go to `user`.
    pub fn dispatch(
        &self,
        msg_type: u32,
        data: &[u8],
        resp: &mut [u8],
        user: &mut UserDispatch<'_>,
    ) -> Option<Reply> {
        match msg_type {
            msg_type::ACK => self.handle_ack(data, resp),
            msg_type::CHUNK => self.handle_chunk(
                data,
                resp,
                &mut |inner: u32, payload: &[u8], resp: &mut [u8]| {
                    self.dispatch(inner, payload, resp, &mut *user)
                },
            ),
            msg_type::SET_REF_CACHE => self.handle_set_ref_cache(data, resp),
            msg_type::CALCULATION_ENDED => self.handle_calculation_ended(resp),
            msg_type::CALCULATION_CANCELED => self.handle_calculation_canceled(),
            msg_type::RTD_CONNECT => self.handle_rtd_connect(data, resp),
            msg_type::RTD_DISCONNECT => self.handle_rtd_disconnect(data),
            msg_type::RTD_HEARTBEAT => None,
            other => user(other, data, resp),
        }
    }

    /// The host pulls the next window of an outbound transfer. The cursor only
    /// moves once the window has been written to `resp`, so a failed reply
    /// leaves it for the next ack.
    pub fn handle_ack(&self, data: &[u8], resp: &mut [u8]) -> Option<Reply> {
        let ack: Ack = decode_or_log(data, "ack")?;
        let Some(chunk) = self.chunks.peek_chunk(ack.id) else {
            debug!("ack for unknown transfer {}", ack.id);
            return None;
        };
        let reply = write_message(&chunk, resp, msg_type::CHUNK)?;
        self.chunks.commit_chunk(&chunk);
        Some(reply)
    }

    /// Feeds one inbound window. A completed transfer is handed to `redispatch`
    /// with its original message type; partial ones are acknowledged.
    pub fn handle_chunk(
        &self,
        data: &[u8],
        resp: &mut [u8],
        redispatch: &mut UserDispatch<'_>,
    ) -> Option<Reply> {
        let chunk: Chunk = decode_or_log(data, "chunk")?;
        let id = chunk.id;

        match self.chunks.accept_chunk(chunk) {
            Ok(ChunkProgress::Partial { id, .. }) => {
                write_message(&Ack { id, ok: true }, resp, msg_type::ACK)
            }
            Ok(ChunkProgress::Complete {
                inner_type,
                payload,
            }) => redispatch(inner_type, &payload, resp),
            Err(e) => {
                warn!("{e}");
                write_message(&Ack { id, ok: false }, resp, msg_type::ACK)
            }
        }
    }

    pub fn handle_set_ref_cache(&self, data: &[u8], resp: &mut [u8]) -> Option<Reply> {
        let req: SetRefCacheRequest = decode_or_log(data, "set-ref-cache request")?;
        self.ref_cache.set(req.key, &req.payload);
        write_message(&Ack { id: 0, ok: true }, resp, msg_type::ACK)
    }

    /// Replies at once; the connect hook runs on its own thread.
    pub fn handle_rtd_connect(&self, data: &[u8], resp: &mut [u8]) -> Option<Reply> {
        let req: RtdConnectRequest = decode_or_log(data, "RTD connect request")?;
        debug!("RTD connect for topic {}", req.topic_id);

        if let Some(hook) = self.hooks.on_rtd_connect.clone() {
            run_hook_in_background("rtd-connect", move || hook(&req));
        }
        write_message(&RtdConnectResponse {}, resp, msg_type::RTD_CONNECT)
    }

    pub fn handle_rtd_disconnect(&self, data: &[u8]) -> Option<Reply> {
        let req: RtdDisconnectRequest = decode_or_log(data, "RTD disconnect request")?;
        self.rtd.unsubscribe(req.topic_id);

        if let Some(hook) = self.hooks.on_rtd_disconnect.clone() {
            run_hook_in_background("rtd-disconnect", move || hook(&req));
        }
        None
    }

    /// Ends the cycle: clears the ref cache, runs the cycle-end hook, then
    /// replies with every pending command (chunked if needed).
    pub fn handle_calculation_ended(&self, resp: &mut [u8]) -> Option<Reply> {
        self.ref_cache.clear();

        if let Some(hook) = &self.hooks.on_calculation_ended {
            run_hook("calculation-ended", || hook());
        }

        match self.commands.flush_commands() {
            Ok(Some(payload)) => {
                self.chunks
                    .send_or_chunk(payload, resp, msg_type::CALCULATION_ENDED)
            }
            Ok(None) => None,
            Err(e) => {
                error!("failed to encode cycle-end commands: {e}");
                None
            }
        }
    }

    /// Aborts the cycle: pending commands and cached refs are dropped.
    pub fn handle_calculation_canceled(&self) -> Option<Reply> {
        self.commands.clear();
        self.ref_cache.clear();

        if let Some(hook) = self.hooks.on_calculation_canceled.clone() {
            run_hook_in_background("calculation-canceled", move || hook());
        }
        None
    }
}

fn decode_or_log<T: DeserializeOwned>(data: &[u8], what: &str) -> Option<T> {
    match codec::decode(data) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!("malformed {what}: {e}");
            None
        }
    }
}

fn write_message<T: Serialize>(msg: &T, resp: &mut [u8], msg_type: u32) -> Option<Reply> {
    let encoded = match codec::encode(msg) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("failed to encode reply: {e}");
            return None;
        }
    };
    if encoded.len() > resp.len() {
        let err = ChunkError::FramingTooLarge {
            size: encoded.len(),
            capacity: resp.len(),
        };
        error!("dropping reply of type {msg_type}: {err}");
        return None;
    }
    resp[..encoded.len()].copy_from_slice(&encoded);
    Some(Reply {
        len: encoded.len(),
        msg_type,
    })
}

fn run_hook<F>(name: &str, hook: F)
where
    F: FnOnce() -> Result<(), HookError>,
{
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{name} hook failed: {e}"),
        Err(payload) => error!("{name} hook panicked: {}", panic_message(payload.as_ref())),
    }
}

fn run_hook_in_background<F>(name: &'static str, hook: F)
where
    F: FnOnce() -> Result<(), HookError> + Send + 'static,
{
    let spawned = thread::Builder::new()
        .name(format!("xlpr-{name}"))
        .spawn(move || run_hook(name, hook));
    if let Err(e) = spawned {
        error!("failed to spawn {name} hook thread: {e}");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
