//
// mutable/dict.rs
//
// Heap-allocated dict overlay: a sorted map of local overrides shadowing an optional immutable
// source dict. Writing it back through an encoder that shares the source's base buffer emits
// only the overrides, with the source re-attached as a parent dict (via the −2048 sentinel key).
//

use super::slot::{DictView, Item, Slot};
use crate::dict::Dict;
use crate::error::Result;
use crate::writer::Encoder;
use std::collections::BTreeMap;

pub struct MutableDict<'a> {
    source: Option<Dict<'a>>,
    overrides: BTreeMap<String, Slot<'a>>,
    changed: bool,
}

impl<'a> MutableDict<'a> {
    pub fn new() -> Self {
        MutableDict { source: None, overrides: BTreeMap::new(), changed: false }
    }

    pub fn from_source(source: Dict<'a>) -> Self {
        MutableDict { source: Some(source), overrides: BTreeMap::new(), changed: false }
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Number of visible entries: source entries not locally tombstoned, plus overrides that
    /// introduce a brand new key.
    pub fn count(&self) -> u32 {
        self.iter().count() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn get(&self, key: &str) -> Option<Item<'a>> {
        if let Some(slot) = self.overrides.get(key) {
            if Item::is_undefined_tombstone(slot) {
                return None;
            }
            return Item::from_slot(slot);
        }
        self.source.as_ref().and_then(|s| s.get(key)).map(Item::from_value)
    }

    fn set_slot(&mut self, key: &str, slot: Slot<'a>) {
        self.overrides.insert(key.to_string(), slot);
        self.changed = true;
    }

    pub fn set_null(&mut self, key: &str) {
        self.set_slot(key, Slot::Null);
    }

    pub fn set_bool(&mut self, key: &str, v: bool) {
        self.set_slot(key, Slot::Bool(v));
    }

    pub fn set_int(&mut self, key: &str, v: i64) {
        self.set_slot(key, Slot::Int(v));
    }

    pub fn set_double(&mut self, key: &str, v: f64) {
        self.set_slot(key, Slot::Double(v));
    }

    pub fn set_string(&mut self, key: &str, v: impl Into<String>) {
        self.set_slot(key, Slot::String(v.into()));
    }

    pub fn set_data(&mut self, key: &str, v: impl Into<Vec<u8>>) {
        self.set_slot(key, Slot::Data(v.into()));
    }

    /// Removes `key`. If it is only visible through the source, installs an undefined
    /// tombstone; if it was purely a local override, simply drops it.
    pub fn remove(&mut self, key: &str) {
        let in_source = self.source.as_ref().map_or(false, |s| s.get(key).is_some());
        if in_source {
            self.overrides.insert(key.to_string(), Slot::Undefined);
        } else {
            self.overrides.remove(key);
        }
        self.changed = true;
    }

    /// Hides every key the source currently has, without touching unrelated local overrides
    /// that introduce brand new keys.
    pub fn remove_all(&mut self) {
        if let Some(source) = self.source {
            for (key, _) in source.iter() {
                self.overrides.insert(key.as_str().to_string(), Slot::Undefined);
            }
        } else {
            self.overrides.clear();
        }
        self.changed = true;
    }

    pub fn get_mutable_array(&mut self, key: &str) -> Result<std::rc::Rc<std::cell::RefCell<super::array::MutableArray<'a>>>> {
        if let Some(Slot::Array(rc)) = self.overrides.get(key) {
            return Ok(rc.clone());
        }
        let inner = match self.source.as_ref().and_then(|s| s.get(key)).and_then(|v| v.as_array()) {
            Some(arr) => super::array::MutableArray::from_source(arr),
            None => super::array::MutableArray::new(),
        };
        let rc = std::rc::Rc::new(std::cell::RefCell::new(inner));
        self.overrides.insert(key.to_string(), Slot::Array(rc.clone()));
        self.changed = true;
        Ok(rc)
    }

    pub fn get_mutable_dict(&mut self, key: &str) -> Result<std::rc::Rc<std::cell::RefCell<MutableDict<'a>>>> {
        if let Some(Slot::Dict(rc)) = self.overrides.get(key) {
            return Ok(rc.clone());
        }
        let inner = match self.source.as_ref().and_then(|s| s.get(key)).and_then(|v| v.as_dict()) {
            Some(d) => MutableDict::from_source(d),
            None => MutableDict::new(),
        };
        let rc = std::rc::Rc::new(std::cell::RefCell::new(inner));
        self.overrides.insert(key.to_string(), Slot::Dict(rc.clone()));
        self.changed = true;
        Ok(rc)
    }

    /// Ordered merge of source and local overrides, skipping tombstones.
    pub fn iter(&self) -> impl Iterator<Item = (String, Item<'a>)> + '_ {
        let source_keys: Vec<String> = self.source.map(|s| s.iter().map(|(k, _)| k.as_str().to_string()).collect()).unwrap_or_default();
        let mut keys: Vec<String> = source_keys;
        for k in self.overrides.keys() {
            if !keys.contains(k) {
                keys.push(k.clone());
            }
        }
        keys.sort();
        keys.into_iter().filter_map(move |k| {
            if let Some(slot) = self.overrides.get(&k) {
                if matches!(slot, Slot::Undefined) {
                    return None;
                }
                return Item::from_slot(slot).map(|item| (k, item));
            }
            self.source.as_ref().and_then(|s| s.get(&k)).map(|v| (k.clone(), Item::from_value(v)))
        })
    }

    /// Writes this dict through `enc`. When the source lives in `enc`'s base buffer, emits
    /// only the overrides behind a parent-dict sentinel pointing at the source; otherwise
    /// rebuilds the whole dict from the merged iterator.
    pub fn encode_into(&self, enc: &mut Encoder) -> Result<()> {
        let use_parent = match self.source {
            Some(source) => enc.has_base(source.as_value().buffer()),
            None => false,
        };
        if use_parent {
            enc.begin_dict_with_parent(self.source.unwrap())?;
            for (key, slot) in &self.overrides {
                enc.write_key(key)?;
                self.encode_slot(enc, slot)?;
            }
            enc.end_dict()
        } else {
            let entries: Vec<(String, Item<'a>)> = self.iter().collect();
            enc.begin_dict(entries.len() as u32)?;
            for (key, item) in entries {
                enc.write_key(&key)?;
                Self::encode_item(enc, item)?;
            }
            enc.end_dict()
        }
    }

    fn encode_slot(&self, enc: &mut Encoder, slot: &Slot<'a>) -> Result<()> {
        match slot {
            Slot::Unset => unreachable!("only overrides are ever stored in `overrides`"),
            Slot::Undefined => enc.write_undefined(),
            Slot::Null => enc.write_null(),
            Slot::Bool(b) => enc.write_bool(*b),
            Slot::Int(n) => enc.write_int(*n),
            Slot::UInt(n) => enc.write_uint(*n),
            Slot::Float(f) => enc.write_float(*f),
            Slot::Double(d) => enc.write_double(*d),
            Slot::String(s) => enc.write_string(s),
            Slot::Data(d) => enc.write_data(d),
            Slot::Array(rc) => rc.borrow().encode_into(enc),
            Slot::Dict(rc) => rc.borrow().encode_into(enc),
        }
    }

    fn encode_item(enc: &mut Encoder, item: Item<'a>) -> Result<()> {
        match item {
            Item::Null => enc.write_null(),
            Item::Bool(b) => enc.write_bool(b),
            Item::Int(n) => enc.write_int(n),
            Item::UInt(n) => enc.write_uint(n),
            Item::Float(f) => enc.write_float(f),
            Item::Double(d) => enc.write_double(d),
            Item::String(s) => enc.write_string(&s),
            Item::Data(d) => enc.write_data(&d),
            Item::Array(view) => match view {
                super::slot::ArrayView::Source(a) => enc.write_value(a.as_value()),
                super::slot::ArrayView::Mutable(rc) => rc.borrow().encode_into(enc),
            },
            Item::Dict(view) => match view {
                DictView::Source(d) => enc.write_value(d.as_value()),
                DictView::Mutable(rc) => rc.borrow().encode_into(enc),
            },
        }
    }
}

impl<'a> Default for MutableDict<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Context, Value};
    use crate::writer::Encoder;

    fn sample_source_dict() -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.begin_dict(2).unwrap();
        enc.write_key("name").unwrap();
        enc.write_string("totoro").unwrap();
        enc.write_key("size").unwrap();
        enc.write_string("XXXL").unwrap();
        enc.end_dict().unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn reads_through_to_source_when_unset() {
        let data = sample_source_dict();
        let root = Value::from_data(&data).unwrap();
        let dict = MutableDict::from_source(root.as_dict().unwrap());
        assert_eq!(dict.count(), 2);
        match dict.get("name") {
            Some(Item::String(s)) => assert_eq!(s, "totoro"),
            _ => panic!("expected a string"),
        }
    }

    #[test]
    fn remove_on_a_source_key_installs_a_tombstone_and_hides_it() {
        let data = sample_source_dict();
        let root = Value::from_data(&data).unwrap();
        let mut dict = MutableDict::from_source(root.as_dict().unwrap());
        dict.remove("size");
        assert!(dict.get("size").is_none());
        assert_eq!(dict.count(), 1);
    }

    #[test]
    fn parent_sentinel_scenario_round_trips_through_append_delta() {
        let data = sample_source_dict();
        let root = Value::from_data(&data).unwrap();
        let mut dict = MutableDict::from_source(root.as_dict().unwrap());
        dict.set_string("name", "catbus");
        dict.remove("size");

        let mut enc = Encoder::with_base(&data);
        dict.encode_into(&mut enc).unwrap();
        let delta = enc.finish().unwrap();
        assert!(delta.len() <= 32, "delta should stay small: {} bytes", delta.len());

        let ctx = Context::new(None, Some(&data));
        let new_root = Value::from_data_in(&delta, ctx).unwrap();
        let new_dict = new_root.as_dict().unwrap();
        assert_eq!(new_dict.count(), 1);
        assert_eq!(new_dict.get("name").unwrap().as_string(), Some("catbus"));
        assert!(new_dict.get("size").is_none());
    }
}
