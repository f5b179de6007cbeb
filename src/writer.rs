//
// writer.rs
//
// The streaming encoder: a frame stack for in-progress arrays/dicts, string
// interning, narrow/wide pointer fixup decided per container at close time,
// and an optional append-delta base buffer for extending an existing
// document without rewriting it.
//

use crate::dict::Dict;
use crate::error::{Error, Result};
use crate::shared_keys::SharedKeys;
use crate::value::{
    Value, FLOAT_32_SINGLE, FLOAT_64_AS_32, FLOAT_64_DOUBLE, LONG_COUNT, NARROW, SPECIAL_FALSE,
    SPECIAL_NULL, SPECIAL_TRUE, SPECIAL_UNDEFINED, TAG_ARRAY, TAG_BINARY, TAG_DICT, TAG_FLOAT,
    TAG_INT, TAG_SHORT_INT, TAG_SPECIAL, TAG_STRING, WIDE,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_NARROW_UNITS: u64 = 0x3FFF;
const MAGIC_PARENT_KEY: i32 = -2048;

/// A value not yet placed into its final slot: either small enough to embed directly in a
/// 2-byte array/dict slot, or already appended to the output (at a known logical offset) and
/// referenced by a pointer.
#[derive(Clone, Copy)]
enum Pending {
    Inline([u8; 2]),
    Pointer(usize),
}

#[derive(Clone, PartialEq, Eq)]
enum KeySort {
    Int(i32),
    Str(Vec<u8>),
}

impl KeySort {
    fn cmp(&self, other: &KeySort) -> Ordering {
        match (self, other) {
            (KeySort::Int(a), KeySort::Int(b)) => a.cmp(b),
            (KeySort::Int(_), KeySort::Str(_)) => Ordering::Less,
            (KeySort::Str(_), KeySort::Int(_)) => Ordering::Greater,
            (KeySort::Str(a), KeySort::Str(b)) => a.cmp(b),
        }
    }
}

struct Pair {
    key_sort: KeySort,
    key: Pending,
    value: Pending,
}

enum Frame {
    Array(Vec<Pending>),
    Dict { pairs: Vec<Pair>, pending_key: Option<(KeySort, Pending)> },
}

/// Generates TVF-encoded data.
///
/// Values are written depth-first via `write_*`/`begin_*`/`end_*` calls, mirroring the shape of
/// the document being produced; `finish` closes any trailing bookkeeping and returns the
/// encoded bytes.
pub struct Encoder<'b> {
    out: Vec<u8>,
    stack: Vec<Frame>,
    root: Option<Pending>,
    strings: HashMap<String, usize>,
    shared_keys: Option<Arc<SharedKeys>>,
    base: Option<&'b [u8]>,
    unique_strings: bool,
}

impl<'b> Encoder<'b> {
    pub fn new() -> Self {
        Encoder {
            out: Vec::with_capacity(256),
            stack: Vec::new(),
            root: None,
            strings: HashMap::new(),
            shared_keys: None,
            base: None,
            unique_strings: true,
        }
    }

    /// Configures the encoder to (logically) append to `base`: `write_value_from_base` can
    /// then write pointers into it without copying any bytes, and the final document is meant
    /// to be read back with `base` supplied as the reader's extern buffer. Any
    /// pointer whose target resolves into `base` is always marked extern — the reader can only
    /// treat a non-extern backward distance as relative to its own single buffer, so there is
    /// no correct non-extern encoding of a cross-buffer pointer.
    pub fn with_base(base: &'b [u8]) -> Self {
        let mut enc = Self::new();
        enc.base = Some(base);
        enc
    }

    pub fn set_shared_keys(&mut self, keys: Arc<SharedKeys>) {
        self.shared_keys = Some(keys);
    }

    pub fn set_unique_strings(&mut self, unique: bool) {
        self.unique_strings = unique;
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty() && self.stack.is_empty() && self.root.is_none()
    }

    pub fn bytes_written(&self) -> usize {
        self.out.len()
    }

    fn base_len(&self) -> usize {
        self.base.map_or(0, |b| b.len())
    }

    //////// Placing values

    fn pad_to_even(&mut self) {
        if self.out.len() % 2 != 0 {
            self.out.push(0);
        }
    }

    fn append_out_of_line(&mut self, bytes: &[u8]) -> Pending {
        self.pad_to_even();
        let logical = self.base_len() + self.out.len();
        self.out.extend_from_slice(bytes);
        Pending::Pointer(logical)
    }

    fn finalize_scalar(&mut self, bytes: Vec<u8>) -> Pending {
        if bytes.len() <= NARROW {
            let mut arr = [0u8; 2];
            arr[..bytes.len()].copy_from_slice(&bytes);
            Pending::Inline(arr)
        } else {
            self.append_out_of_line(&bytes)
        }
    }

    fn intern_string(&mut self, s: &str) -> Pending {
        if self.unique_strings {
            if let Some(&offset) = self.strings.get(s) {
                return Pending::Pointer(offset);
            }
        }
        let item = self.finalize_scalar(encode_string_bytes(TAG_STRING, s.as_bytes()));
        if self.unique_strings {
            if let Pending::Pointer(offset) = item {
                self.strings.insert(s.to_string(), offset);
            }
        }
        item
    }

    fn push_pending(&mut self, item: Pending) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Array(items)) => {
                items.push(item);
                Ok(())
            }
            Some(Frame::Dict { pairs, pending_key }) => {
                let (key_sort, key) = pending_key.take().ok_or_else(|| {
                    Error::EncodeError("a value was written without a preceding key".into())
                })?;
                pairs.push(Pair { key_sort, key, value: item });
                Ok(())
            }
            None => {
                if self.root.is_some() {
                    return Err(Error::EncodeError("encoder already has a root value".into()));
                }
                self.root = Some(item);
                Ok(())
            }
        }
    }

    //////// Scalars

    pub fn write_null(&mut self) -> Result<()> {
        self.push_pending(Pending::Inline([(TAG_SPECIAL << 4) | SPECIAL_NULL, 0]))
    }

    pub fn write_undefined(&mut self) -> Result<()> {
        self.push_pending(Pending::Inline([(TAG_SPECIAL << 4) | SPECIAL_UNDEFINED, 0]))
    }

    pub fn write_bool(&mut self, b: bool) -> Result<()> {
        let special = if b { SPECIAL_TRUE } else { SPECIAL_FALSE };
        self.push_pending(Pending::Inline([(TAG_SPECIAL << 4) | special, 0]))
    }

    pub fn write_int(&mut self, i: i64) -> Result<()> {
        let item = self.encode_int(i, false);
        self.push_pending(item)
    }

    pub fn write_uint(&mut self, u: u64) -> Result<()> {
        if u <= i16::MAX as u64 {
            return self.write_int(u as i64);
        }
        let bytes = minimal_unsigned_bytes(u);
        let item = self.finalize_scalar(encode_int_bytes(&bytes, true));
        self.push_pending(item)
    }

    fn encode_int(&mut self, i: i64, _unsigned: bool) -> Pending {
        if (-2048..=2047).contains(&i) {
            let combined = (i as i16 as u16) & 0x0FFF;
            let b0 = (TAG_SHORT_INT << 4) | ((combined >> 8) as u8);
            let b1 = (combined & 0xFF) as u8;
            return Pending::Inline([b0, b1]);
        }
        let bytes = minimal_signed_bytes(i);
        self.finalize_scalar(encode_int_bytes(&bytes, false))
    }

    pub fn write_float(&mut self, f: f32) -> Result<()> {
        let mut bytes = vec![(TAG_FLOAT << 4) | FLOAT_32_SINGLE, 0];
        bytes.extend_from_slice(&f.to_le_bytes());
        let item = self.finalize_scalar(bytes);
        self.push_pending(item)
    }

    pub fn write_double(&mut self, d: f64) -> Result<()> {
        let item = if is_float_representable(d) {
            let mut bytes = vec![(TAG_FLOAT << 4) | FLOAT_64_AS_32, 0];
            bytes.extend_from_slice(&(d as f32).to_le_bytes());
            self.finalize_scalar(bytes)
        } else {
            let mut bytes = vec![(TAG_FLOAT << 4) | FLOAT_64_DOUBLE, 0];
            bytes.extend_from_slice(&d.to_le_bytes());
            self.finalize_scalar(bytes)
        };
        self.push_pending(item)
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        let item = self.intern_string(s);
        self.push_pending(item)
    }

    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let item = self.finalize_scalar(encode_string_bytes(TAG_BINARY, data));
        self.push_pending(item)
    }

    /// Writes a pointer to an already-encoded value living in this encoder's base buffer
    /// (append-delta mode), without copying its bytes.
    pub fn write_value_from_base(&mut self, value: Value<'_>) -> Result<()> {
        let base = self
            .base
            .ok_or_else(|| Error::EncodeError("encoder has no base buffer configured".into()))?;
        if !std::ptr::eq(value.buffer(), base) {
            return Err(Error::EncodeError("value does not come from this encoder's base buffer".into()));
        }
        self.push_pending(Pending::Pointer(value.position()))
    }

    /// Whether `data` is this encoder's configured base buffer (used by the mutable overlay to
    /// decide whether an unchanged element can be written as a back-pointer rather than copied).
    pub fn has_base(&self, data: &[u8]) -> bool {
        self.base.is_some_and(|b| std::ptr::eq(b, data))
    }

    /// Recursively re-encodes an arbitrary (possibly pointer-laden) `Value` tree as fresh,
    /// self-contained output. Used as the fallback path when a mutable overlay's source value
    /// does not live in this encoder's base buffer, and by callers rebuilding a document
    /// through a fresh encoder (the "idempotent encode" property).
    pub fn write_value(&mut self, value: Value<'_>) -> Result<()> {
        use crate::value::ValueType;
        if value.is_undefined() {
            return self.write_undefined();
        }
        match value.get_type() {
            ValueType::Null => self.write_null(),
            ValueType::Boolean => self.write_bool(value.as_bool()),
            ValueType::Number if value.tag() == TAG_FLOAT => self.write_double(value.as_double()),
            ValueType::Number if value.is_unsigned() => self.write_uint(value.as_unsigned()),
            ValueType::Number => self.write_int(value.as_int()),
            ValueType::String => self.write_string(value.as_string().unwrap_or("")),
            ValueType::Data => self.write_data(value.as_data().unwrap_or(&[])),
            ValueType::Array => {
                let array = value.as_array().expect("tag checked above");
                self.begin_array(array.count())?;
                for item in array.iter() {
                    self.write_value(item)?;
                }
                self.end_array()
            }
            ValueType::Dict => {
                let dict = value.as_dict().expect("tag checked above");
                self.begin_dict(dict.count())?;
                for (key, item) in dict.iter() {
                    self.write_key(key.as_str())?;
                    self.write_value(item)?;
                }
                self.end_dict()
            }
        }
    }

    //////// Arrays

    pub fn begin_array(&mut self, _reserve: u32) -> Result<()> {
        self.stack.push(Frame::Array(Vec::new()));
        Ok(())
    }

    pub fn end_array(&mut self) -> Result<()> {
        let items = match self.stack.pop() {
            Some(Frame::Array(items)) => items,
            Some(other) => {
                self.stack.push(other);
                return Err(Error::EncodeError("end_array called without a matching begin_array".into()));
            }
            None => return Err(Error::EncodeError("end_array called with no open container".into())),
        };
        let pointer = self.close_container(TAG_ARRAY, items.len() as u32, &items);
        self.push_pending(pointer)
    }

    //////// Dicts

    pub fn begin_dict(&mut self, _reserve: u32) -> Result<()> {
        self.stack.push(Frame::Dict { pairs: Vec::new(), pending_key: None });
        Ok(())
    }

    /// Begins a dict that inherits unshadowed keys from `parent`. `parent` must have been
    /// decoded from this encoder's base buffer.
    pub fn begin_dict_with_parent(&mut self, parent: Dict<'_>) -> Result<()> {
        let base = self
            .base
            .ok_or_else(|| Error::EncodeError("encoder has no base buffer configured".into()))?;
        if !std::ptr::eq(parent.as_value().buffer(), base) {
            return Err(Error::EncodeError("parent dict does not come from this encoder's base buffer".into()));
        }
        let parent_ptr = Pending::Pointer(parent.as_value().position());
        let magic_key = Pending::Inline(short_int_bytes(MAGIC_PARENT_KEY as i64));
        let mut pairs = Vec::new();
        pairs.push(Pair { key_sort: KeySort::Int(MAGIC_PARENT_KEY), key: magic_key, value: parent_ptr });
        self.stack.push(Frame::Dict { pairs, pending_key: None });
        Ok(())
    }

    pub fn write_key(&mut self, key: &str) -> Result<()> {
        let has_dict_frame = matches!(self.stack.last(), Some(Frame::Dict { .. }));
        if !has_dict_frame {
            return Err(Error::EncodeError("write_key called outside of a dict".into()));
        }
        if let Some(Frame::Dict { pending_key: Some(_), .. }) = self.stack.last() {
            return Err(Error::EncodeError("two keys written in a row without a value".into()));
        }
        let shared = self.shared_keys.as_ref().and_then(|sk| sk.encode_and_add(key));
        let (key_sort, pending) = if let Some(code) = shared {
            (KeySort::Int(code), Pending::Inline(short_int_bytes(code as i64)))
        } else {
            (KeySort::Str(key.as_bytes().to_vec()), self.intern_string(key))
        };
        if let Some(Frame::Dict { pending_key, .. }) = self.stack.last_mut() {
            *pending_key = Some((key_sort, pending));
        }
        Ok(())
    }

    pub fn end_dict(&mut self) -> Result<()> {
        let mut pairs = match self.stack.pop() {
            Some(Frame::Dict { pairs, pending_key: None }) => pairs,
            Some(Frame::Dict { pending_key: Some(_), .. }) => {
                return Err(Error::EncodeError("dict closed with a key but no value".into()));
            }
            Some(other) => {
                self.stack.push(other);
                return Err(Error::EncodeError("end_dict called without a matching begin_dict".into()));
            }
            None => return Err(Error::EncodeError("end_dict called with no open container".into())),
        };
        pairs.sort_by(|a, b| a.key_sort.cmp(&b.key_sort));
        let mut slots = Vec::with_capacity(pairs.len() * 2);
        for pair in &pairs {
            slots.push(pair.key);
            slots.push(pair.value);
        }
        let pointer = self.close_container(TAG_DICT, pairs.len() as u32, &slots);
        self.push_pending(pointer)
    }

    //////// Container close (shared by array/dict)

    fn header_len(count: u32) -> usize {
        if (count as u64) < LONG_COUNT as u64 {
            2
        } else {
            let excess = count as u64 - LONG_COUNT as u64;
            let mut buf = Vec::new();
            crate::varint::write_uvarint(excess, &mut buf);
            let len = 2 + buf.len();
            if len % 2 != 0 {
                len + 1
            } else {
                len
            }
        }
    }

    fn needs_wide(&self, slots: &[Pending], first_pos_logical: usize) -> bool {
        slots.iter().enumerate().any(|(i, slot)| {
            if let Pending::Pointer(target) = slot {
                let slot_logical = first_pos_logical + i * NARROW;
                let distance = slot_logical.saturating_sub(*target);
                (distance as u64 / 2) > MAX_NARROW_UNITS
            } else {
                false
            }
        })
    }

    fn write_container_header(&mut self, tag: u8, count: u32, wide: bool) {
        let wide_bit = if wide { 0x08 } else { 0 };
        if (count as u64) < LONG_COUNT as u64 {
            self.out.push((tag << 4) | wide_bit | ((count >> 8) as u8 & 0x07));
            self.out.push((count & 0xFF) as u8);
        } else {
            self.out.push((tag << 4) | wide_bit | 0x07);
            self.out.push(0xFF);
            let excess = count as u64 - LONG_COUNT as u64;
            crate::varint::write_uvarint(excess, &mut self.out);
            self.pad_to_even();
        }
    }

    fn write_slot(&mut self, item: Pending, width: usize) {
        match item {
            Pending::Inline(bytes) => {
                self.out.push(bytes[0]);
                self.out.push(bytes[1]);
                for _ in NARROW..width {
                    self.out.push(0);
                }
            }
            Pending::Pointer(target_logical) => {
                let slot_logical = self.base_len() + self.out.len();
                let distance = slot_logical - target_logical;
                debug_assert!(distance > 0 && distance % 2 == 0);
                let units = (distance / 2) as u64;
                let is_extern = target_logical < self.base_len();
                if width == WIDE {
                    let mut be = (units as u32) & 0x3FFF_FFFF;
                    be |= 0x8000_0000;
                    if is_extern {
                        be |= 0x4000_0000;
                    }
                    self.out.extend_from_slice(&be.to_be_bytes());
                } else {
                    let mut be = (units as u16) & 0x3FFF;
                    be |= 0x8000;
                    if is_extern {
                        be |= 0x4000;
                    }
                    self.out.extend_from_slice(&be.to_be_bytes());
                }
            }
        }
    }

    fn close_container(&mut self, tag: u8, count: u32, slots: &[Pending]) -> Pending {
        let header_len = Self::header_len(count);
        self.pad_to_even();
        let container_start_logical = self.base_len() + self.out.len();
        let first_pos_logical = container_start_logical + header_len;
        let wide = self.needs_wide(slots, first_pos_logical);
        let width = if wide { WIDE } else { NARROW };

        self.write_container_header(tag, count, wide);
        for &slot in slots {
            self.write_slot(slot, width);
        }
        Pending::Pointer(container_start_logical)
    }

    //////// Finishing

    /// Ends encoding (closing any still-open containers is an error, not implicit) and returns
    /// the encoded bytes. The trailer is a single trailing pointer to the root value, unless
    /// the whole document is exactly one narrow-inline scalar, in which case that scalar's two
    /// bytes are the entire document (mirrors `Value::findRoot`'s un-pointered root case).
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if !self.stack.is_empty() {
            return Err(Error::EncodeError("finish called with unclosed containers".into()));
        }
        let root = self.root.ok_or_else(|| Error::EncodeError("no value was written".into()))?;
        match root {
            Pending::Inline(bytes) if self.out.is_empty() => {
                self.out.extend_from_slice(&bytes);
            }
            Pending::Inline(bytes) => {
                let pointer = self.append_out_of_line(&bytes);
                self.write_root_pointer(pointer);
            }
            Pending::Pointer(_) => {
                self.write_root_pointer(root);
            }
        }
        Ok(self.out)
    }

    fn write_root_pointer(&mut self, root: Pending) {
        self.pad_to_even();
        self.write_slot(root, NARROW);
    }
}

impl<'b> Default for Encoder<'b> {
    fn default() -> Self {
        Self::new()
    }
}

fn short_int_bytes(i: i64) -> [u8; 2] {
    let combined = (i as i16 as u16) & 0x0FFF;
    [(TAG_SHORT_INT << 4) | ((combined >> 8) as u8), (combined & 0xFF) as u8]
}

fn encode_string_bytes(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    if payload.len() < 0x0F {
        out.push((tag << 4) | payload.len() as u8);
    } else {
        out.push((tag << 4) | 0x0F);
        crate::varint::write_uvarint(payload.len() as u64, &mut out);
    }
    out.extend_from_slice(payload);
    out
}

fn encode_int_bytes(le_bytes: &[u8], unsigned: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(le_bytes.len() + 1);
    let unsigned_bit = if unsigned { 0x08 } else { 0 };
    out.push((TAG_INT << 4) | unsigned_bit | ((le_bytes.len() - 1) as u8 & 0x07));
    out.extend_from_slice(le_bytes);
    out
}

fn minimal_unsigned_bytes(v: u64) -> Vec<u8> {
    let bytes = v.to_le_bytes();
    let mut n = 8;
    while n > 1 && bytes[n - 1] == 0 {
        n -= 1;
    }
    bytes[..n].to_vec()
}

fn minimal_signed_bytes(v: i64) -> Vec<u8> {
    let bytes = v.to_le_bytes();
    let mut n = 8;
    while n > 1 {
        let msb = bytes[n - 1];
        let next_top_bit = bytes[n - 2] & 0x80 != 0;
        if (msb == 0x00 && !next_top_bit) || (msb == 0xFF && next_top_bit) {
            n -= 1;
        } else {
            break;
        }
    }
    bytes[..n].to_vec()
}

/// Whether a `f64` round-trips exactly through a `f32`, letting the encoder store it in half
/// the space (mirrors `Encoder::isFloatRepresentable`).
fn is_float_representable(d: f64) -> bool {
    (d as f32) as f64 == d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Context;

    #[test]
    fn round_trips_a_trivial_scalar_without_a_pointer() {
        let mut enc = Encoder::new();
        enc.write_int(42).unwrap();
        let data = enc.finish().unwrap();
        assert_eq!(data.len(), 2);
        let root = Value::from_data(&data).unwrap();
        assert_eq!(root.as_int(), 42);
    }

    #[test]
    fn round_trips_an_array_of_mixed_scalars() {
        let mut enc = Encoder::new();
        enc.begin_array(0).unwrap();
        enc.write_int(1).unwrap();
        enc.write_string("hello").unwrap();
        enc.write_bool(true).unwrap();
        enc.write_double(3.5).unwrap();
        enc.end_array().unwrap();
        let data = enc.finish().unwrap();

        let root = Value::from_data(&data).unwrap();
        let arr = root.as_array().unwrap();
        assert_eq!(arr.count(), 4);
        assert_eq!(arr.get(0).unwrap().as_int(), 1);
        assert_eq!(arr.get(1).unwrap().as_string(), Some("hello"));
        assert!(arr.get(2).unwrap().as_bool());
        assert_eq!(arr.get(3).unwrap().as_double(), 3.5);
    }

    #[test]
    fn dict_keys_come_out_sorted_and_lookup_works() {
        let mut enc = Encoder::new();
        enc.begin_dict(0).unwrap();
        enc.write_key("zebra").unwrap();
        enc.write_int(1).unwrap();
        enc.write_key("apple").unwrap();
        enc.write_int(2).unwrap();
        enc.end_dict().unwrap();
        let data = enc.finish().unwrap();

        let root = Value::from_data(&data).unwrap();
        let dict = root.as_dict().unwrap();
        assert_eq!(dict.count(), 2);
        assert_eq!(dict.get("apple").unwrap().as_int(), 2);
        assert_eq!(dict.get("zebra").unwrap().as_int(), 1);
        let keys: Vec<String> = dict.iter().map(|(k, _)| k.as_str().to_string()).collect();
        assert_eq!(keys, vec!["apple".to_string(), "zebra".to_string()]);
    }

    #[test]
    fn identical_strings_are_interned_as_pointers_to_the_same_value() {
        let mut enc = Encoder::new();
        enc.begin_array(0).unwrap();
        enc.write_string("repeated-string-value").unwrap();
        enc.write_string("repeated-string-value").unwrap();
        enc.end_array().unwrap();
        let data = enc.finish().unwrap();

        let root = Value::from_data(&data).unwrap();
        let arr = root.as_array().unwrap();
        let a = arr.get(0).unwrap();
        let b = arr.get(1).unwrap();
        assert_eq!(a.position(), b.position());
    }

    #[test]
    fn nested_containers_round_trip() {
        let mut enc = Encoder::new();
        enc.begin_dict(0).unwrap();
        enc.write_key("items").unwrap();
        enc.begin_array(0).unwrap();
        for i in 0..5 {
            enc.write_int(i).unwrap();
        }
        enc.end_array().unwrap();
        enc.end_dict().unwrap();
        let data = enc.finish().unwrap();

        let root = Value::from_data(&data).unwrap();
        let dict = root.as_dict().unwrap();
        let items = dict.get("items").unwrap().as_array().unwrap();
        let values: Vec<i64> = items.iter().map(|v| v.as_int()).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn shared_keys_abbreviate_dict_keys_to_integers() {
        let keys = Arc::new(SharedKeys::new());
        let mut enc = Encoder::new();
        enc.set_shared_keys(keys.clone());
        enc.begin_dict(0).unwrap();
        enc.write_key("name").unwrap();
        enc.write_string("Bix").unwrap();
        enc.end_dict().unwrap();
        let data = enc.finish().unwrap();

        let root = Value::from_data_in(&data, Context::new(Some(&keys), None)).unwrap();
        let dict = root.as_dict().unwrap();
        assert_eq!(dict.get("name").unwrap().as_string(), Some("Bix"));
        assert_eq!(dict.get_int(0).unwrap().as_string(), Some("Bix"));
    }

    #[test]
    fn long_arrays_use_the_varint_count_extension() {
        let mut enc = Encoder::new();
        enc.begin_array(0).unwrap();
        for i in 0..2050 {
            enc.write_int(i).unwrap();
        }
        enc.end_array().unwrap();
        let data = enc.finish().unwrap();

        let root = Value::from_data(&data).unwrap();
        let arr = root.as_array().unwrap();
        assert_eq!(arr.count(), 2050);
        assert_eq!(arr.get(2049).unwrap().as_int(), 2049);
    }

    #[test]
    fn append_delta_extends_an_existing_document() {
        let mut base_enc = Encoder::new();
        base_enc.begin_array(0).unwrap();
        base_enc.write_int(1).unwrap();
        base_enc.write_int(2).unwrap();
        base_enc.end_array().unwrap();
        let base = base_enc.finish().unwrap();
        let base_root = Value::from_data(&base).unwrap();
        let base_array = base_root.as_array().unwrap().as_value();

        let mut enc = Encoder::with_base(&base);
        enc.begin_dict(0).unwrap();
        enc.write_key("nums").unwrap();
        enc.write_value_from_base(base_array).unwrap();
        enc.write_key("extra").unwrap();
        enc.write_int(99).unwrap();
        enc.end_dict().unwrap();
        let delta = enc.finish().unwrap();

        let ctx = Context::new(None, Some(&base));
        let root = Value::from_data_in(&delta, ctx).unwrap();
        let dict = root.as_dict().unwrap();
        assert_eq!(dict.get("extra").unwrap().as_int(), 99);
        let nums = dict.get("nums").unwrap().as_array().unwrap();
        assert_eq!(nums.iter().map(|v| v.as_int()).collect::<Vec<_>>(), vec![1, 2]);
    }
}
