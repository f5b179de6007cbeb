//
// doc.rs
//
// A process-wide registry mapping a buffer's address range to the SharedKeys
// and extern-destination it was loaded with, plus `Doc`, a ref-counted owner
// of an encoded buffer.
//
// The primary, recommended way to read a document is `Value::from_data_in`
// with an explicit `Context` (see `crate::value`); this registry exists only
// as a compatibility shim for callers who hold a bare `Value`/pointer and
// need to recover the `SharedKeys` or extern base it was loaded with, the
// way `Scope::sharedKeys` does in the reference implementation.
//

use crate::shared_keys::SharedKeys;
use crate::value::{Context, Value};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

struct ScopeEntry {
    start: usize,
    data: Arc<[u8]>,
    shared_keys: Option<Arc<SharedKeys>>,
    extern_base: Option<Arc<[u8]>>,
}

/// Keyed by the address one-past-the-end of the registered range, mirroring the reference
/// implementation's `sMemoryMap` (a map from `data.end()` to the owning `Scope`), so a lookup
/// for an address within the range is a single `range(..=addr).next_back()`.
static REGISTRY: Lazy<RwLock<BTreeMap<usize, ScopeEntry>>> = Lazy::new(|| RwLock::new(BTreeMap::new()));

fn range_of(data: &[u8]) -> (usize, usize) {
    let start = data.as_ptr() as usize;
    (start, start + data.len())
}

fn register_scope(data: Arc<[u8]>, shared_keys: Option<Arc<SharedKeys>>, extern_base: Option<Arc<[u8]>>) {
    let (start, end) = range_of(&data);
    REGISTRY.write().insert(end, ScopeEntry { start, data, shared_keys, extern_base });
}

fn unregister_scope(data: &[u8]) {
    let (_, end) = range_of(data);
    REGISTRY.write().remove(&end);
}

/// Looks up the `SharedKeys` registered for the buffer containing `addr`, if any (mirrors
/// `Scope::sharedKeys`).
pub fn shared_keys_containing(addr: usize) -> Option<Arc<SharedKeys>> {
    let registry = REGISTRY.read();
    let (_, entry) = registry.range(addr..).find(|(_, e)| e.start <= addr)?;
    entry.shared_keys.clone()
}

/// Looks up the extern-destination buffer registered for the buffer containing `addr`, if any.
pub fn extern_base_containing(addr: usize) -> Option<Arc<[u8]>> {
    let registry = REGISTRY.read();
    let (_, entry) = registry.range(addr..).find(|(_, e)| e.start <= addr)?;
    entry.extern_base.clone()
}

/// Whether trust validation should be performed when loading a [`Doc`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Trust {
    Untrusted,
    Trusted,
}

/// A ref-counted owner of an encoded buffer, its root value's position, the `SharedKeys` table
/// (if any) used to decode it, and the extern-destination buffer (if any) its pointers may
/// cross into.
///
/// `Doc` registers its buffer's address range in the process-wide scope registry for the
/// duration of its lifetime, purely so that a bare `Value` recovered by other means (e.g. from
/// a foreign API boundary) can still resolve its `SharedKeys`; code that already holds a `Doc`
/// should just call `Doc::root`, which threads the context explicitly and never touches the
/// registry.
pub struct Doc {
    data: Arc<[u8]>,
    shared_keys: Option<Arc<SharedKeys>>,
    extern_base: Option<Arc<[u8]>>,
    root_pos: usize,
}

impl Doc {
    pub fn new(
        data: Arc<[u8]>,
        trust: Trust,
        shared_keys: Option<Arc<SharedKeys>>,
        extern_base: Option<Arc<[u8]>>,
    ) -> Option<Self> {
        let ctx = Context::new(shared_keys.as_deref(), extern_base.as_deref());
        let root_pos = match trust {
            Trust::Trusted => Value::from_trusted_data_in(&data, ctx)?.position(),
            Trust::Untrusted => Value::from_data_in(&data, ctx)?.position(),
        };
        register_scope(data.clone(), shared_keys.clone(), extern_base.clone());
        Some(Doc { data, shared_keys, extern_base, root_pos })
    }

    /// Borrows the root value, with the document's context attached.
    pub fn root(&self) -> Value<'_> {
        let ctx = Context::new(self.shared_keys.as_deref(), self.extern_base.as_deref());
        Value::at(&self.data, self.root_pos, ctx)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn shared_keys(&self) -> Option<&Arc<SharedKeys>> {
        self.shared_keys.as_ref()
    }
}

impl Drop for Doc {
    fn drop(&mut self) {
        unregister_scope(&self.data);
    }
}

impl std::fmt::Debug for Doc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Doc").field("len", &self.data.len()).field("root_pos", &self.root_pos).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_unregisters_on_drop() {
        let data: Arc<[u8]> = Arc::from(vec![0x00, 0x01].into_boxed_slice());
        let addr = data.as_ptr() as usize;
        {
            let doc = Doc::new(data.clone(), Trust::Untrusted, None, None).expect("valid doc");
            assert_eq!(doc.root().as_int(), 1);
            assert!(shared_keys_containing(addr).is_none());
        }
        // After the Doc (and its clone of `data`) is dropped, the scope is gone. `data` itself
        // is still alive here via our own clone, but the registry entry must be unregistered.
        assert!(shared_keys_containing(addr).is_none());
    }
}
