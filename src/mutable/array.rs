//
// mutable/array.rs
//
// Heap-allocated array overlay: an ordered vector of slots shadowing an optional immutable
// source array.
//

use super::slot::{ArrayView, Item, Slot};
use crate::array::Array;
use crate::error::{Error, Result};
use crate::writer::Encoder;

pub struct MutableArray<'a> {
    source: Option<Array<'a>>,
    slots: Vec<Slot<'a>>,
    changed: bool,
}

impl<'a> MutableArray<'a> {
    pub fn new() -> Self {
        MutableArray { source: None, slots: Vec::new(), changed: false }
    }

    pub fn from_source(source: Array<'a>) -> Self {
        MutableArray { source: Some(source), slots: Vec::new(), changed: false }
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn len(&self) -> u32 {
        let source_len = self.source.as_ref().map_or(0, |s| s.count());
        source_len.max(self.slots.len() as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_len(&mut self, n: u32) {
        while (self.slots.len() as u32) < n {
            self.slots.push(Slot::Unset);
        }
    }

    pub fn get(&self, index: u32) -> Option<Item<'a>> {
        if index >= self.len() {
            return None;
        }
        if let Some(slot) = self.slots.get(index as usize) {
            if let Some(item) = Item::from_slot(slot) {
                return Some(item);
            }
        }
        self.source.as_ref().and_then(|s| s.get(index)).map(Item::from_value)
    }

    fn set_slot(&mut self, index: u32, slot: Slot<'a>) {
        self.ensure_len(index + 1);
        self.slots[index as usize] = slot;
        self.changed = true;
    }

    pub fn set_null(&mut self, index: u32) {
        self.set_slot(index, Slot::Null);
    }

    pub fn set_bool(&mut self, index: u32, v: bool) {
        self.set_slot(index, Slot::Bool(v));
    }

    pub fn set_int(&mut self, index: u32, v: i64) {
        self.set_slot(index, Slot::Int(v));
    }

    pub fn set_double(&mut self, index: u32, v: f64) {
        self.set_slot(index, Slot::Double(v));
    }

    pub fn set_string(&mut self, index: u32, v: impl Into<String>) {
        self.set_slot(index, Slot::String(v.into()));
    }

    pub fn set_data(&mut self, index: u32, v: impl Into<Vec<u8>>) {
        self.set_slot(index, Slot::Data(v.into()));
    }

    /// Appends a new element, growing the array by one.
    pub fn append_null(&mut self) {
        let n = self.len();
        self.set_null(n);
    }

    /// Inserts `n` unset slots at `index`, pulling the shadowed tail of the source (if any)
    /// forward first so nothing is silently lost behind the insertion point.
    pub fn insert_unset(&mut self, index: u32, n: u32) -> Result<()> {
        if index > self.len() {
            return Err(Error::OutOfRange(format!("insert index {} past length {}", index, self.len())));
        }
        self.realize_through(self.len());
        let tail = self.slots.split_off(index as usize);
        self.slots.extend(std::iter::repeat_with(|| Slot::Unset).take(n as usize));
        self.slots.extend(tail);
        self.changed = true;
        Ok(())
    }

    /// Removes `n` elements starting at `index`.
    pub fn remove(&mut self, index: u32, n: u32) -> Result<()> {
        let len = self.len();
        if index.checked_add(n).map_or(true, |end| end > len) {
            return Err(Error::OutOfRange(format!("remove range [{}, {}) exceeds length {}", index, index + n, len)));
        }
        self.realize_through(len);
        self.slots.drain(index as usize..(index + n) as usize);
        self.changed = true;
        Ok(())
    }

    /// Materializes every slot up to `n` from the source, so subsequent structural edits
    /// (insert/remove) don't need to special-case the boundary between explicit slots and an
    /// implicit source tail.
    fn realize_through(&mut self, n: u32) {
        self.ensure_len(n);
        if let Some(source) = self.source {
            for i in 0..n {
                if self.slots[i as usize].is_unset() {
                    if let Some(v) = source.get(i) {
                        self.slots[i as usize] = Slot::from_value(v);
                    }
                }
            }
        }
    }

    /// Promotes element `index` to a mutable array, creating one from the source element (or
    /// from scratch if there is none) on first call; later calls return the same instance.
    pub fn get_mutable_array(&mut self, index: u32) -> Result<std::rc::Rc<std::cell::RefCell<MutableArray<'a>>>> {
        self.ensure_len(index + 1);
        if let Slot::Array(rc) = &self.slots[index as usize] {
            return Ok(rc.clone());
        }
        let inner = match self.source.as_ref().and_then(|s| s.get(index)).and_then(|v| v.as_array()) {
            Some(arr) => MutableArray::from_source(arr),
            None => MutableArray::new(),
        };
        let rc = std::rc::Rc::new(std::cell::RefCell::new(inner));
        self.slots[index as usize] = Slot::Array(rc.clone());
        self.changed = true;
        Ok(rc)
    }

    pub fn get_mutable_dict(&mut self, index: u32) -> Result<std::rc::Rc<std::cell::RefCell<super::dict::MutableDict<'a>>>> {
        self.ensure_len(index + 1);
        if let Slot::Dict(rc) = &self.slots[index as usize] {
            return Ok(rc.clone());
        }
        let inner = match self.source.as_ref().and_then(|s| s.get(index)).and_then(|v| v.as_dict()) {
            Some(d) => super::dict::MutableDict::from_source(d),
            None => super::dict::MutableDict::new(),
        };
        let rc = std::rc::Rc::new(std::cell::RefCell::new(inner));
        self.slots[index as usize] = Slot::Dict(rc.clone());
        self.changed = true;
        Ok(rc)
    }

    pub fn iter(&self) -> impl Iterator<Item = Item<'a>> + '_ {
        (0..self.len()).map(move |i| self.get(i).expect("index within bounds"))
    }

    /// Writes this array through `enc`: every element that has no local override and comes
    /// from a source living in `enc`'s base buffer is written as a pointer back into the base;
    /// everything else is written fresh.
    pub fn encode_into(&self, enc: &mut Encoder) -> Result<()> {
        let len = self.len();
        enc.begin_array(len)?;
        for i in 0..len {
            let slot = self.slots.get(i as usize);
            match slot {
                Some(Slot::Unset) | None => match self.source.as_ref().and_then(|s| s.get(i)) {
                    Some(v) if enc.has_base(v.buffer()) => enc.write_value_from_base(v)?,
                    Some(v) => enc.write_value(v)?,
                    None => enc.write_null()?,
                },
                Some(Slot::Undefined) => enc.write_undefined()?,
                Some(Slot::Null) => enc.write_null()?,
                Some(Slot::Bool(b)) => enc.write_bool(*b)?,
                Some(Slot::Int(n)) => enc.write_int(*n)?,
                Some(Slot::UInt(n)) => enc.write_uint(*n)?,
                Some(Slot::Float(f)) => enc.write_float(*f)?,
                Some(Slot::Double(d)) => enc.write_double(*d)?,
                Some(Slot::String(s)) => enc.write_string(s)?,
                Some(Slot::Data(d)) => enc.write_data(d)?,
                Some(Slot::Array(rc)) => rc.borrow().encode_into(enc)?,
                Some(Slot::Dict(rc)) => rc.borrow().encode_into(enc)?,
            }
        }
        enc.end_array()
    }
}

impl<'a> Default for MutableArray<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> From<ArrayView<'a>> for Option<Array<'a>> {
    fn from(view: ArrayView<'a>) -> Self {
        match view {
            ArrayView::Source(a) => Some(a),
            ArrayView::Mutable(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Context, Value};
    use crate::writer::Encoder;

    fn sample_source_array() -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.begin_array(3).unwrap();
        enc.write_int(1).unwrap();
        enc.write_int(2).unwrap();
        enc.write_int(3).unwrap();
        enc.end_array().unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn reads_through_to_source_when_unset() {
        let data = sample_source_array();
        let root = Value::from_data(&data).unwrap();
        let arr = MutableArray::from_source(root.as_array().unwrap());
        assert_eq!(arr.len(), 3);
        match arr.get(1) {
            Some(Item::Int(2)) => {}
            other => panic!("expected Int(2), got a different item: {}", matches!(other, Some(_))),
        }
    }

    #[test]
    fn set_overrides_a_single_element() {
        let data = sample_source_array();
        let root = Value::from_data(&data).unwrap();
        let mut arr = MutableArray::from_source(root.as_array().unwrap());
        arr.set_int(1, 99);
        assert!(arr.changed());
        match arr.get(0) {
            Some(Item::Int(1)) => {}
            _ => panic!("element 0 should still read through to source"),
        }
        match arr.get(1) {
            Some(Item::Int(99)) => {}
            _ => panic!("element 1 should reflect the override"),
        }
    }

    #[test]
    fn encode_into_reuses_unchanged_elements_as_base_pointers() {
        let data = sample_source_array();
        let root = Value::from_data(&data).unwrap();
        let mut arr = MutableArray::from_source(root.as_array().unwrap());
        arr.set_int(1, 99);

        let mut enc = Encoder::with_base(&data);
        arr.encode_into(&mut enc).unwrap();
        let delta = enc.finish().unwrap();

        let ctx = Context::new(None, Some(&data));
        let new_root = Value::from_data_in(&delta, ctx).unwrap();
        let new_array = new_root.as_array().unwrap();
        assert_eq!(new_array.get(0).unwrap().as_int(), 1);
        assert_eq!(new_array.get(1).unwrap().as_int(), 99);
        assert_eq!(new_array.get(2).unwrap().as_int(), 3);
    }
}
