use parking_lot::RwLock;
use std::collections::HashMap;

/// Cycle-scoped byte store keyed by string.
///
/// Values are copied on the way in and on the way out, so neither the
/// caller's buffer nor a returned value aliases the stored bytes.
#[derive(Default)]
pub struct RefCache {
    pub(crate) entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl RefCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: &[u8]) {
        self.entries.write().insert(key.into(), value.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
