use crate::Channel::Transport;
use crate::Core::config::RuntimeConfig;
use crate::Core::error::RtdError;
use crate::Wire::codec;
use crate::Wire::msg_type;
use crate::Wire::scalar::ScalarValue;
use crate::Wire::Structs::RtdUpdate;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A value pushed to RTD topics.
#[derive(Clone, Debug, PartialEq)]
pub enum RtdValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    /// Textual form of anything without a dedicated wire kind.
    Text(String),
}

impl RtdValue {
    /// Wraps any displayable value as its textual form.
    pub fn display(value: impl fmt::Display) -> Self {
        RtdValue::Text(value.to_string())
    }

    pub fn into_scalar(self) -> ScalarValue {
        match self {
            RtdValue::Str(s) | RtdValue::Text(s) => ScalarValue::Str(s),
            RtdValue::Bool(b) => ScalarValue::Bool(b),
            RtdValue::Int(i) => match i32::try_from(i) {
                Ok(small) => ScalarValue::Int(small),
                Err(_) => ScalarValue::Num(i as f64),
            },
            RtdValue::Float(f) => ScalarValue::Num(f),
            RtdValue::Timestamp(ts) => {
                ScalarValue::Str(ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }
}

impl From<String> for RtdValue {
    fn from(v: String) -> Self {
        RtdValue::Str(v)
    }
}

impl From<&str> for RtdValue {
    fn from(v: &str) -> Self {
        RtdValue::Str(v.to_owned())
    }
}

impl From<bool> for RtdValue {
    fn from(v: bool) -> Self {
        RtdValue::Bool(v)
    }
}

macro_rules! rtd_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for RtdValue {
            fn from(v: $t) -> Self {
                RtdValue::Int(v as i64)
            }
        })*
    };
}

rtd_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<isize> for RtdValue {
    fn from(v: isize) -> Self {
        RtdValue::Int(v as i64)
    }
}

impl From<u64> for RtdValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => RtdValue::Int(i),
            Err(_) => RtdValue::Float(v as f64),
        }
    }
}

impl From<f32> for RtdValue {
    fn from(v: f32) -> Self {
        RtdValue::Float(v as f64)
    }
}

impl From<f64> for RtdValue {
    fn from(v: f64) -> Self {
        RtdValue::Float(v)
    }
}

impl From<DateTime<Utc>> for RtdValue {
    fn from(v: DateTime<Utc>) -> Self {
        RtdValue::Timestamp(v)
    }
}

impl From<SystemTime> for RtdValue {
    fn from(v: SystemTime) -> Self {
        RtdValue::Timestamp(v.into())
    }
}

/// Key to topic bindings. An id is bound to at most one key.
#[derive(Default)]
pub(crate) struct TopicTable {
    pub(crate) key_to_ids: HashMap<String, HashSet<i32>>,
    pub(crate) id_to_key: HashMap<i32, String>,
}

impl TopicTable {
    fn unbind(&mut self, id: i32) -> Option<String> {
        let key = self.id_to_key.remove(&id)?;
        if let Some(ids) = self.key_to_ids.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.key_to_ids.remove(&key);
            }
        }
        Some(key)
    }
}

/// Fans values published under a key out to every RTD topic bound to it.
///
/// Each send waits at most `send_timeout` for a channel slot. Failures are
/// returned to the publisher; nothing is retried.
pub struct RtdManager {
    send_timeout: Duration,
    pub(crate) topics: RwLock<TopicTable>,
    pub(crate) transport: RwLock<Option<Arc<dyn Transport>>>,
}

impl RtdManager {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            send_timeout,
            topics: RwLock::new(TopicTable::default()),
            transport: RwLock::new(None),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.rtd_send_timeout)
    }

    pub fn attach_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write() = Some(transport);
        info!("RTD transport attached");
    }

    pub fn detach_transport(&self) -> Option<Arc<dyn Transport>> {
        let previous = self.transport.write().take();
        if previous.is_some() {
            info!("RTD transport detached");
        }
        previous
    }

    pub fn is_connected(&self) -> bool {
        self.transport.read().is_some()
    }

    /// Binds `topic_id` to `key`, dropping any binding it had to another key.
    pub fn subscribe(&self, key: impl Into<String>, topic_id: i32) {
        let key = key.into();
        let mut topics = self.topics.write();

        if topics.id_to_key.get(&topic_id) != Some(&key) {
            topics.unbind(topic_id);
        }
        topics
            .key_to_ids
            .entry(key.clone())
            .or_default()
            .insert(topic_id);
        debug!("topic {topic_id} bound to {key:?}");
        topics.id_to_key.insert(topic_id, key);
    }

    /// Removes `topic_id` from its key. Returns the key it was bound to.
    pub fn unsubscribe(&self, topic_id: i32) -> Option<String> {
        let key = self.topics.write().unbind(topic_id);
        if let Some(key) = &key {
            debug!("topic {topic_id} unbound from {key:?}");
        }
        key
    }

    /// Sends `value` to every topic bound to `key`.
    ///
    /// # Returns
    /// * `Ok(())` if every topic got the update, or if none is bound
    /// * `Err(NotConnected)` if topics are bound but no transport is attached
    /// * `Err(Send)` on the first failed send; later topics are skipped
    pub fn publish(&self, key: &str, value: impl Into<RtdValue>) -> Result<(), RtdError> {
        // Read lock is held across the sends so bindings cannot change mid fan-out
        let topics = self.topics.read();
        let mut ids: Vec<i32> = match topics.key_to_ids.get(key) {
            Some(ids) if !ids.is_empty() => ids.iter().copied().collect(),
            _ => return Ok(()),
        };
        ids.sort_unstable();

        let transport = self.transport.read().clone().ok_or(RtdError::NotConnected)?;
        let value = value.into().into_scalar();

        for id in ids {
            self.send_with(transport.as_ref(), id, value.clone())?;
        }
        Ok(())
    }

    /// Sends `value` to one topic without consulting the bindings.
    pub fn send_update(&self, topic_id: i32, value: impl Into<RtdValue>) -> Result<(), RtdError> {
        let transport = self.transport.read().clone().ok_or(RtdError::NotConnected)?;
        self.send_with(transport.as_ref(), topic_id, value.into().into_scalar())
    }

    fn send_with(&self, transport: &dyn Transport, topic_id: i32, value: ScalarValue) -> Result<(), RtdError> {
        let payload = codec::encode(&RtdUpdate { topic_id, value })?;
        transport
            .send_timeout(&payload, msg_type::RTD_UPDATE, self.send_timeout)
            .map_err(|source| RtdError::Send { topic_id, source })
    }

    /// Topics bound to `key`, ascending.
    pub fn subscribers(&self, key: &str) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .topics
            .read()
            .key_to_ids
            .get(key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn key_for(&self, topic_id: i32) -> Option<String> {
        self.topics.read().id_to_key.get(&topic_id).cloned()
    }

    /// Number of bound topics.
    pub fn topic_count(&self) -> usize {
        self.topics.read().id_to_key.len()
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }
}
