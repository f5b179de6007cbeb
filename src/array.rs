//
// array.rs
//
// Array reader: a thin wrapper around a Value known to carry the array tag,
// exposing random access and a forward iterator over its (possibly pointer-
// indirected) children.
//

use crate::value::{Value, WIDE};

/// A Value that is known to be an array.
///
/// Construction is free: the header (first child position, count, child width) is decoded
/// once up front and cached.
#[derive(Copy, Clone)]
pub struct Array<'a> {
    value: Value<'a>,
    first: usize,
    count: u32,
    width: usize,
}

impl<'a> Array<'a> {
    pub(crate) fn wrap(value: Value<'a>) -> Self {
        let (first, count, width) = value.container_header();
        Array { value, first, count, width }
    }

    /// The underlying array Value.
    pub fn as_value(&self) -> Value<'a> {
        self.value
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Accesses an array item. Returns `None` for an out-of-range index. If scanning more than
    /// a couple of items, prefer `iter()`: it avoids recomputing the slot offset each time.
    pub fn get(&self, index: u32) -> Option<Value<'a>> {
        if index >= self.count {
            return None;
        }
        let slot_pos = self.first + index as usize * self.width;
        let slot = self.value.slot_at(slot_pos);
        slot.deref(self.width == WIDE)
    }

    pub fn iter(&self) -> ArrayIterator<'a> {
        ArrayIterator {
            value: self.value,
            pos: self.first,
            remaining: self.count,
            width: self.width,
        }
    }
}

impl<'a> IntoIterator for Array<'a> {
    type Item = Value<'a>;
    type IntoIter = ArrayIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> std::fmt::Debug for Array<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array").field("count", &self.count).finish()
    }
}

/// A forward iterator over an array's children, dereferencing pointer slots as it goes.
#[derive(Clone)]
pub struct ArrayIterator<'a> {
    value: Value<'a>,
    pos: usize,
    remaining: u32,
    width: usize,
}

impl<'a> ArrayIterator<'a> {
    /// Returns the number of items not yet consumed.
    pub fn count(&self) -> u32 {
        self.remaining
    }
}

impl<'a> Iterator for ArrayIterator<'a> {
    type Item = Value<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.value.slot_at(self.pos);
        self.pos += self.width;
        self.remaining -= 1;
        slot.deref(self.width == WIDE)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl<'a> ExactSizeIterator for ArrayIterator<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Context;

    // [1, 2, 3] as a narrow, inline (no-pointer-children) array, followed by the root pointer.
    fn sample_array_doc() -> Vec<u8> {
        let mut data = vec![
            0x60, 0x03, // array tag, narrow, count=3
            0x00, 0x01, // short int 1
            0x00, 0x02, // short int 2
            0x00, 0x03, // short int 3
        ];
        data.extend_from_slice(&[0x80, 0x04]); // pointer back 8 bytes to the array header
        data
    }

    #[test]
    fn reads_count_and_items_in_order() {
        let data = sample_array_doc();
        let root = Value::from_data_in(&data, Context::default()).expect("valid document");
        let arr = root.as_array().expect("array");
        assert_eq!(arr.count(), 3);
        let items: Vec<i64> = arr.iter().map(|v| v.as_int()).collect();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn random_access_matches_iteration_order() {
        let data = sample_array_doc();
        let root = Value::from_data_in(&data, Context::default()).unwrap();
        let arr = root.as_array().unwrap();
        for i in 0..arr.count() {
            assert_eq!(arr.get(i).unwrap().as_int(), (i + 1) as i64);
        }
        assert!(arr.get(arr.count()).is_none());
    }

    #[test]
    fn empty_array_has_no_items() {
        let mut data = vec![0x60, 0x00];
        data.extend_from_slice(&[0x80, 0x01]); // pointer back 2 bytes to the array header
        let root = Value::from_data_in(&data, Context::default()).unwrap();
        let arr = root.as_array().unwrap();
        assert!(arr.is_empty());
        assert_eq!(arr.iter().count(), 0);
    }
}
