//
// dict.rs
//
// Dict reader: binary-search lookup over a sorted key/value run, with integer
// keys (shared-key abbreviations) always sorting before string keys, and
// support for the parent-dict inheritance chain used by the mutable overlay.
//

use crate::value::{Value, TAG_SHORT_INT, TAG_STRING, WIDE};
use std::cmp::Ordering;

/// A Value that is known to be a dict.
#[derive(Copy, Clone)]
pub struct Dict<'a> {
    value: Value<'a>,
    first: usize,
    pair_count: u32,
    width: usize,
}

impl<'a> Dict<'a> {
    pub(crate) fn wrap(value: Value<'a>) -> Self {
        let (first, count, width) = value.container_header();
        Dict { value, first, pair_count: count, width }
    }

    pub fn as_value(&self) -> Value<'a> {
        self.value
    }

    fn key_slot(&self, index: u32) -> Value<'a> {
        self.value.slot_at(self.first + index as usize * 2 * self.width)
    }

    fn value_slot(&self, index: u32) -> Value<'a> {
        self.value.slot_at(self.first + (index as usize * 2 + 1) * self.width)
    }

    fn is_wide(&self) -> bool {
        self.width == WIDE
    }

    fn is_magic_parent_key(key: Value<'a>) -> bool {
        key.byte(0) == ((TAG_SHORT_INT << 4) | 0x08) && key.byte(1) == 0
    }

    /// `true` if the first raw pair is the sentinel parent-dict marker.
    fn has_parent(&self) -> bool {
        self.pair_count > 0 && Self::is_magic_parent_key(self.key_slot(0))
    }

    /// The dict this one inherits unshadowed keys from, if any.
    pub fn parent(&self) -> Option<Dict<'a>> {
        if !self.has_parent() {
            return None;
        }
        self.value_slot(0).deref(self.is_wide())?.as_dict()
    }

    /// Number of raw key/value pairs physically stored here, not counting inherited ones.
    fn raw_count(&self) -> u32 {
        self.pair_count
    }

    /// Number of visible entries, counting inherited keys from the parent chain that are not
    /// shadowed. Expensive (walks the whole chain) when a parent is present, same as upstream.
    pub fn count(&self) -> u32 {
        if !self.has_parent() {
            return self.pair_count;
        }
        self.iter().count() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn uses_shared_keys(&self) -> bool {
        if self.pair_count == 0 {
            return false;
        }
        let first = self.key_slot(0);
        if first.tag() != TAG_SHORT_INT {
            return false;
        }
        if Self::is_magic_parent_key(first) {
            if self.pair_count == 1 {
                return false;
            }
            if self.key_slot(1).tag() != TAG_SHORT_INT {
                return false;
            }
        }
        true
    }

    fn compare_int(target: i32, key: Value<'a>) -> Ordering {
        let b0 = key.byte(0);
        let b1 = key.byte(1);
        if b0 <= 0x07 {
            let v = ((b0 as i32) << 8) | b1 as i32;
            target.cmp(&v)
        } else if b0 <= 0x0F {
            let raw12 = ((b0 as u16) << 8) | b1 as u16;
            let v = (raw12 | 0xF000) as i16 as i32;
            target.cmp(&v)
        } else {
            // Key is a string (or a pointer to one): integer keys always sort first.
            Ordering::Less
        }
    }

    fn compare_str(&self, target: &[u8], key: Value<'a>) -> Ordering {
        if key.tag() == TAG_SHORT_INT {
            return Ordering::Greater;
        }
        match key.deref(self.is_wide()).and_then(|k| if k.tag() == TAG_STRING { Some(k.string_bytes()) } else { None }) {
            Some(bytes) => target.cmp(bytes),
            None => Ordering::Greater,
        }
    }

    fn search_raw<F>(&self, mut cmp: F) -> Option<u32>
    where
        F: FnMut(Value<'a>) -> Ordering,
    {
        let mut lo: u32 = 0;
        let mut hi: u32 = self.pair_count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match cmp(self.key_slot(mid)) {
                Ordering::Equal => return Some(mid),
                Ordering::Less => hi = mid,
                Ordering::Greater => lo = mid + 1,
            }
        }
        None
    }

    fn finish_get(&self, index: u32) -> Option<Value<'a>> {
        let v = self.value_slot(index).deref(self.is_wide())?;
        if v.is_undefined() {
            None
        } else {
            Some(v)
        }
    }

    /// Looks up the value for an already-shared integer key. Falls back to the parent
    /// chain if not found here.
    pub fn get_int(&self, key: i32) -> Option<Value<'a>> {
        match self.search_raw(|k| Self::compare_int(key, k)) {
            Some(idx) => self.finish_get(idx),
            None => self.parent().and_then(|p| p.get_int(key)),
        }
    }

    /// Looks up the value for a string key, abbreviating it via the context's `SharedKeys`
    /// table first if this dict uses one. Falls back to the parent chain if not found.
    pub fn get(&self, key: &str) -> Option<Value<'a>> {
        if let Some(sk) = self.value.context().shared_keys {
            if self.uses_shared_keys() {
                if let Some(encoded) = sk.encode(key) {
                    return self.get_int(encoded);
                }
            }
        }
        let bytes = key.as_bytes();
        match self.search_raw(|k| self.compare_str(bytes, k)) {
            Some(idx) => self.finish_get(idx),
            None => self.parent().and_then(|p| p.get(key)),
        }
    }

    /// Compares two dicts for equality, accounting for inherited/parent entries the way
    /// [`PartialEq`] for scalars does not need to.
    pub fn is_equal_to(&self, other: &Dict<'a>) -> bool {
        if self.count() != other.count() {
            return false;
        }
        self.iter().all(|(k, v)| other.get(&k).map(|ov| ov == v).unwrap_or(false))
    }

    /// Iterates visible (key, value) pairs in ascending key order (ints before strings),
    /// merging in not-yet-shadowed parent entries.
    pub fn iter(&self) -> DictIterator<'a> {
        DictIterator {
            dict: *self,
            raw_index: 0,
            raw_peek: None,
            parent: None,
            parent_peek: None,
        }
    }
}

impl<'a> std::fmt::Debug for Dict<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dict").field("count", &self.count()).finish()
    }
}

/// A key as yielded by [`DictIterator`]: either the shared-key string (resolved via the
/// context's `SharedKeys` table) or the literal string stored inline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DictKey {
    String(String),
}

impl DictKey {
    pub fn as_str(&self) -> &str {
        match self {
            DictKey::String(s) => s,
        }
    }
}

impl std::ops::Deref for DictKey {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}

/// One raw (own) pair waiting to be compared against the parent cursor. `value` is `None` when
/// the pair is an undefined tombstone or its value pointer failed to resolve: nothing is ever
/// yielded for it, but its key still shadows the same key in the parent.
struct RawEntry<'a> {
    key: String,
    value: Option<Value<'a>>,
}

/// Iterates a dict's visible entries in ascending key order: a genuine merge of this dict's own
/// pairs against its parent's, advancing whichever cursor holds the smaller key and preferring
/// the child's entry (including its tombstones) on a tie.
pub struct DictIterator<'a> {
    dict: Dict<'a>,
    raw_index: u32,
    raw_peek: Option<RawEntry<'a>>,
    parent: Option<Box<DictIterator<'a>>>,
    parent_peek: Option<(DictKey, Value<'a>)>,
}

impl<'a> DictIterator<'a> {
    fn resolve_key(&self, key_slot: Value<'a>) -> Option<String> {
        if key_slot.tag() == TAG_SHORT_INT {
            if Dict::is_magic_parent_key(key_slot) {
                return None;
            }
            let int_key = key_slot.as_int() as i32;
            let sk = self.dict.value.context().shared_keys?;
            return sk.decode(int_key).map(|s| s.to_string());
        }
        key_slot.deref(self.dict.is_wide())?.as_string().map(|s| s.to_string())
    }

    fn fill_raw_peek(&mut self) {
        while self.raw_peek.is_none() && self.raw_index < self.dict.raw_count() {
            let i = self.raw_index;
            self.raw_index += 1;
            let key_slot = self.dict.key_slot(i);
            let key = match self.resolve_key(key_slot) {
                Some(k) => k,
                None => continue, // magic parent-key pair, or an undecodable key: not a real entry
            };
            let value = self.dict.value_slot(i).deref(self.dict.is_wide()).filter(|v| !v.is_undefined());
            self.raw_peek = Some(RawEntry { key, value });
        }
    }

    fn fill_parent_peek(&mut self) {
        if self.parent_peek.is_some() {
            return;
        }
        if self.parent.is_none() {
            match self.dict.parent() {
                Some(parent) => self.parent = Some(Box::new(parent.iter())),
                None => return,
            }
        }
        self.parent_peek = self.parent.as_mut().unwrap().next();
    }
}

impl<'a> Iterator for DictIterator<'a> {
    type Item = (DictKey, Value<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.fill_raw_peek();
            self.fill_parent_peek();

            let ordering = match (&self.raw_peek, &self.parent_peek) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(raw), Some((parent_key, _))) => raw.key.as_str().cmp(parent_key.as_str()),
            };
            match ordering {
                Ordering::Less => {
                    let entry = self.raw_peek.take().unwrap();
                    if let Some(v) = entry.value {
                        return Some((DictKey::String(entry.key), v));
                    }
                    // Tombstone/undecodable with no parent collision: consumed, nothing to yield.
                }
                Ordering::Greater => return self.parent_peek.take(),
                Ordering::Equal => {
                    let entry = self.raw_peek.take().unwrap();
                    self.parent_peek = None; // shadowed either way; re-fill on the next pass
                    if let Some(v) = entry.value {
                        return Some((DictKey::String(entry.key), v));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Context;

    // {"a": 1, "b": 2} with narrow, inline (no shared keys) string keys.
    fn sample_dict_doc() -> Vec<u8> {
        let mut data = vec![
            0x70, 0x02, // dict tag, narrow, 2 pairs
            0x41, b'a', // string "a" (len 1)
            0x00, 0x01, // short int 1
            0x41, b'b', // string "b" (len 1)
            0x00, 0x02, // short int 2
        ];
        data.extend_from_slice(&[0x80, 0x05]); // pointer back 10 bytes to the dict header
        data
    }

    #[test]
    fn looks_up_string_keys_in_sorted_order() {
        let data = sample_dict_doc();
        let root = Value::from_data_in(&data, Context::default()).expect("valid document");
        let dict = root.as_dict().expect("dict");
        assert_eq!(dict.count(), 2);
        assert_eq!(dict.get("a").unwrap().as_int(), 1);
        assert_eq!(dict.get("b").unwrap().as_int(), 2);
        assert!(dict.get("c").is_none());
    }

    #[test]
    fn iterates_pairs_in_stored_order() {
        let data = sample_dict_doc();
        let root = Value::from_data_in(&data, Context::default()).unwrap();
        let dict = root.as_dict().unwrap();
        let pairs: Vec<(String, i64)> =
            dict.iter().map(|(k, v)| (k.as_str().to_string(), v.as_int())).collect();
        assert_eq!(pairs, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[test]
    fn empty_dict_has_no_entries() {
        let mut data = vec![0x70, 0x00];
        data.extend_from_slice(&[0x80, 0x01]);
        let root = Value::from_data_in(&data, Context::default()).unwrap();
        let dict = root.as_dict().unwrap();
        assert!(dict.is_empty());
        assert!(dict.get("anything").is_none());
    }

    #[test]
    fn parent_merge_stays_ascending_when_child_adds_a_key_that_sorts_first() {
        use crate::writer::Encoder;

        let mut base_enc = Encoder::new();
        base_enc.begin_dict(0).unwrap();
        base_enc.write_key("a").unwrap();
        base_enc.write_int(2).unwrap();
        base_enc.write_key("c").unwrap();
        base_enc.write_int(3).unwrap();
        base_enc.end_dict().unwrap();
        let base = base_enc.finish().unwrap();

        let base_root = Value::from_data(&base).unwrap();
        let mut overlay = crate::mutable::MutableDict::from_source(base_root.as_dict().unwrap());
        overlay.set_int("b", 1);

        let mut enc = Encoder::with_base(&base);
        overlay.encode_into(&mut enc).unwrap();
        let delta = enc.finish().unwrap();

        let ctx = Context::new(None, Some(&base));
        let new_root = Value::from_data_in(&delta, ctx).unwrap();
        let new_dict = new_root.as_dict().unwrap();
        let pairs: Vec<(String, i64)> =
            new_dict.iter().map(|(k, v)| (k.as_str().to_string(), v.as_int())).collect();
        assert_eq!(pairs, vec![("a".to_string(), 2), ("b".to_string(), 1), ("c".to_string(), 3)]);
    }
}
