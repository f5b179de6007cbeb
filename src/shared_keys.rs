//
// shared_keys.rs
//
// A thread-safe mapping between strings and small non-negative integers, used
// to abbreviate frequently repeated dictionary keys. Concurrency is
// provided by `dashmap` for the forward string->int table, with a
// `parking_lot::Mutex` serializing the rare append path, mirroring the
// reference implementation's single mutex guarding a hash table plus a
// reverse vector.
//

use crate::error::{Error, Result};
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Maximum number of keys a table will hold.
pub const MAX_COUNT: usize = 2048;

/// Default maximum length of a string that will be considered for sharing.
pub const DEFAULT_MAX_KEY_LENGTH: usize = 16;

/// A Dict key that may be either a string or a shared small integer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyT {
    Int(i32),
    String(Arc<str>),
}

impl KeyT {
    pub fn is_shared(&self) -> bool {
        matches!(self, KeyT::Int(_))
    }
}

/// Tracks a set of dictionary keys abbreviated to small integers.
///
/// Encoders configured with a `SharedKeys` instance abbreviate eligible string keys to
/// integers as they are written; readers consult the same table (via [`crate::value::Context`])
/// to expand an integer key back to its original string.
pub struct SharedKeys {
    by_string: DashMap<Box<str>, i32>,
    by_key: RwLock<Vec<Arc<str>>>,
    add_lock: Mutex<()>,
    max_key_length: AtomicUsize,
    in_transaction: AtomicBool,
}

impl Default for SharedKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedKeys {
    pub fn new() -> Self {
        SharedKeys {
            by_string: DashMap::new(),
            by_key: RwLock::new(Vec::new()),
            add_lock: Mutex::new(()),
            max_key_length: AtomicUsize::new(DEFAULT_MAX_KEY_LENGTH),
            in_transaction: AtomicBool::new(true),
        }
    }

    pub fn with_state_data(data: &[u8]) -> Result<Self> {
        let keys = Self::new();
        keys.load_from(data)?;
        Ok(keys)
    }

    pub fn set_max_key_length(&self, max: usize) {
        self.max_key_length.store(max, Ordering::Relaxed);
    }

    pub fn count(&self) -> usize {
        self.by_key.read().len()
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::Relaxed)
    }

    /// Maps a string to its integer key, if one is already assigned. Never mutates the table.
    pub fn encode(&self, s: &str) -> Option<i32> {
        self.by_string.get(s).map(|e| *e)
    }

    /// Maps a string to an integer, registering a new mapping if the string qualifies and
    /// there is room. Returns `None` if the string cannot be shared.
    pub fn encode_and_add(&self, s: &str) -> Option<i32> {
        if let Some(key) = self.encode(s) {
            return Some(key);
        }
        if !self.could_add(s) {
            return None;
        }
        let _guard = self.add_lock.lock();
        // Re-check under the lock: another thread may have added it, or filled the table.
        if let Some(key) = self.encode(s) {
            return Some(key);
        }
        if !self.could_add(s) {
            return None;
        }
        Some(self.add_locked(s))
    }

    fn add_locked(&self, s: &str) -> i32 {
        let mut by_key = self.by_key.write();
        let key = by_key.len() as i32;
        let shared: Arc<str> = Arc::from(s);
        by_key.push(shared.clone());
        self.by_string.insert(Box::from(s), key);
        key
    }

    pub fn could_add(&self, s: &str) -> bool {
        self.count() < MAX_COUNT
            && s.len() <= self.max_key_length.load(Ordering::Relaxed)
            && Self::is_eligible_to_encode(s)
    }

    /// Default eligibility rule: alphanumeric, `_` and `-` only, matching the reference
    /// implementation's default `isEligibleToEncode`.
    fn is_eligible_to_encode(s: &str) -> bool {
        !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    /// Decodes an integer key back to its string, if registered.
    pub fn decode(&self, key: i32) -> Option<Arc<str>> {
        if key < 0 {
            return None;
        }
        self.by_key.read().get(key as usize).cloned()
    }

    pub fn is_unknown_key(&self, key: i32) -> bool {
        key < 0 || key as usize >= self.count()
    }

    /// A snapshot of the current int->string mapping, indexed by key.
    pub fn by_key(&self) -> Vec<Arc<str>> {
        self.by_key.read().clone()
    }

    /// Reverts the mapping to an earlier state, discarding keys >= `count`. Used to roll back
    /// an aborted encoding transaction.
    pub fn revert_to_count(&self, count: usize) {
        let _guard = self.add_lock.lock();
        let mut by_key = self.by_key.write();
        if count >= by_key.len() {
            return;
        }
        for s in by_key.drain(count..) {
            self.by_string.remove(s.as_ref());
        }
    }

    /// Loads additional keys from a previously-encoded state document. The document is
    /// expected to decode to an array of strings, each appended in order; this mirrors the
    /// reference implementation's `SharedKeys::loadFrom(const Value*)`. Returns whether any new
    /// keys were added.
    pub fn load_from_value(&self, state: &Value<'_>) -> Result<bool> {
        let array = state
            .as_array()
            .ok_or_else(|| Error::SharedKeysStateError("shared keys state is not an array".into()))?;
        let _guard = self.add_lock.lock();
        let before = self.count();
        for item in array.iter() {
            let s = item
                .as_string()
                .ok_or_else(|| Error::SharedKeysStateError("shared keys entry is not a string".into()))?;
            if self.by_string.contains_key(s) {
                continue;
            }
            self.add_locked(s);
        }
        Ok(self.count() > before)
    }

    /// Loads additional keys from an encoded TVF document's raw bytes.
    pub fn load_from(&self, state_data: &[u8]) -> Result<bool> {
        let root = Value::from_data(state_data)
            .ok_or_else(|| Error::SharedKeysStateError("state data is not a valid document".into()))?;
        self.load_from_value(&root)
    }

    /// Encodes the current table as a standalone TVF document (an array of strings, in key
    /// order), suitable for persistence and later reloading via [`SharedKeys::load_from`].
    pub fn state_data(&self) -> Vec<u8> {
        let mut enc = crate::writer::Encoder::new();
        let keys = self.by_key();
        enc.begin_array(keys.len() as u32).expect("fresh encoder never fails to open a container");
        for key in &keys {
            enc.write_string(key).expect("fresh encoder never fails to write a string");
        }
        enc.end_array().expect("array opened above is balanced here");
        enc.finish().expect("fresh encoder always has exactly one root")
    }
}

impl std::fmt::Debug for SharedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeys").field("count", &self.count()).finish()
    }
}

/// A [`SharedKeys`] table whose contents can be persisted to and refreshed from external
/// transactional storage. Implementors supply the actual I/O via [`PersistentSharedKeys::read`]
/// and [`PersistentSharedKeys::write`]; this type only manages the commit/revert bookkeeping.
pub struct PersistentSharedKeys {
    inner: SharedKeys,
    persisted_count: AtomicUsize,
    committed_persisted_count: AtomicUsize,
}

impl PersistentSharedKeys {
    pub fn new() -> Self {
        PersistentSharedKeys {
            inner: SharedKeys::new(),
            persisted_count: AtomicUsize::new(0),
            committed_persisted_count: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &SharedKeys {
        &self.inner
    }

    pub fn changed(&self) -> bool {
        self.persisted_count.load(Ordering::Relaxed) < self.inner.count()
    }

    /// Call after a transaction has begun; permits adding new keys for the duration.
    pub fn transaction_began(&self) {
        self.inner.in_transaction.store(true, Ordering::Relaxed);
    }

    /// Call after a transaction ends (whether committed or aborted).
    pub fn transaction_ended(&self) {
        self.inner.in_transaction.store(false, Ordering::Relaxed);
    }

    /// Reverts to the persisted state as of the end of the last transaction. Any keys added
    /// during the aborted transaction become invalid to use.
    pub fn revert(&self) {
        let persisted = self.committed_persisted_count.load(Ordering::Relaxed);
        self.inner.revert_to_count(persisted);
        self.persisted_count.store(persisted, Ordering::Relaxed);
    }
}

impl Default for PersistentSharedKeys {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_and_add_assigns_stable_increasing_keys() {
        let keys = SharedKeys::new();
        assert_eq!(keys.encode_and_add("name"), Some(0));
        assert_eq!(keys.encode_and_add("age"), Some(1));
        assert_eq!(keys.encode_and_add("name"), Some(0));
        assert_eq!(keys.count(), 2);
    }

    #[test]
    fn rejects_ineligible_or_oversized_strings() {
        let keys = SharedKeys::new();
        assert_eq!(keys.encode_and_add("has space"), None);
        keys.set_max_key_length(3);
        assert_eq!(keys.encode_and_add("tooLong"), None);
        assert_eq!(keys.encode_and_add("ok"), Some(0));
    }

    #[test]
    fn decode_round_trips_encode() {
        let keys = SharedKeys::new();
        let k = keys.encode_and_add("widget").unwrap();
        assert_eq!(keys.decode(k).as_deref(), Some("widget"));
        assert_eq!(keys.encode("widget"), Some(k));
    }

    #[test]
    fn revert_to_count_drops_later_keys() {
        let keys = SharedKeys::new();
        keys.encode_and_add("a");
        keys.encode_and_add("b");
        keys.encode_and_add("c");
        keys.revert_to_count(1);
        assert_eq!(keys.count(), 1);
        assert_eq!(keys.encode("b"), None);
        assert_eq!(keys.encode_and_add("b"), Some(1));
    }

    #[test]
    fn is_unknown_key_respects_current_count() {
        let keys = SharedKeys::new();
        assert!(keys.is_unknown_key(0));
        keys.encode_and_add("a");
        assert!(!keys.is_unknown_key(0));
        assert!(keys.is_unknown_key(1));
    }
}
