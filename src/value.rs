//
// value.rs
//
// The TVF value model: tag decoding, typed accessors and in-place validation
// against an untrusted byte buffer.
//

use crate::array::Array;
use crate::dict::Dict;
use crate::shared_keys::SharedKeys;
use byteorder::{ByteOrder, LittleEndian};

/// High nibble of a Value's first byte.
pub(crate) const TAG_SHORT_INT: u8 = 0;
pub(crate) const TAG_INT: u8 = 1;
pub(crate) const TAG_FLOAT: u8 = 2;
pub(crate) const TAG_SPECIAL: u8 = 3;
pub(crate) const TAG_STRING: u8 = 4;
pub(crate) const TAG_BINARY: u8 = 5;
pub(crate) const TAG_ARRAY: u8 = 6;
pub(crate) const TAG_DICT: u8 = 7;
pub(crate) const TAG_POINTER_FIRST: u8 = 8;

pub(crate) const SPECIAL_NULL: u8 = 0x00;
pub(crate) const SPECIAL_FALSE: u8 = 0x04;
pub(crate) const SPECIAL_TRUE: u8 = 0x08;
pub(crate) const SPECIAL_UNDEFINED: u8 = 0x0C;

pub(crate) const FLOAT_32_SINGLE: u8 = 0x00;
pub(crate) const FLOAT_64_AS_32: u8 = 0x04;
pub(crate) const FLOAT_64_DOUBLE: u8 = 0x08;

pub(crate) const LONG_COUNT: u32 = 0x07FF;
pub(crate) const NARROW: usize = 2;
pub(crate) const WIDE: usize = 4;

/// The overall JSON-compatible type of a [`Value`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ValueType {
    Null,
    Boolean,
    Number,
    String,
    Data,
    Array,
    Dict,
}

/// Context needed to resolve dict integer keys and pointers that cross into a separately
/// registered buffer. Threaded explicitly through the reader API rather than recovered from a
/// process-wide registry — the global `Doc`/`Scope` registry in [`crate::doc`] remains available
/// as a compatibility shim.
#[derive(Copy, Clone, Default)]
pub struct Context<'a> {
    pub shared_keys: Option<&'a SharedKeys>,
    pub extern_base: Option<&'a [u8]>,
}

impl<'a> Context<'a> {
    pub fn new(shared_keys: Option<&'a SharedKeys>, extern_base: Option<&'a [u8]>) -> Self {
        Context { shared_keys, extern_base }
    }
}

/// A zero-copy handle to a single encoded value living at `pos` within `data`.
///
/// Cloning a `Value` is free: it is just a slice reference and an offset. No accessor ever
/// allocates or panics on malformed input; see [`Value::from_data`] for the validating
/// entry point.
#[derive(Copy, Clone)]
pub struct Value<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) pos: usize,
    pub(crate) ctx: Context<'a>,
}

impl<'a> std::fmt::Debug for Value<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value({:?} @ {})", self.get_type(), self.pos)
    }
}

impl<'a> Value<'a> {
    /// Wraps a raw position in `data` with no validation. Used internally once a position has
    /// already been established to be in-bounds.
    pub(crate) fn at(data: &'a [u8], pos: usize, ctx: Context<'a>) -> Self {
        Value { data, pos, ctx }
    }

    /// Wraps another position within the same buffer and context. Used by `Array`/`Dict` to
    /// address child slots relative to an already-validated container.
    pub(crate) fn slot_at(&self, pos: usize) -> Self {
        Value { data: self.data, pos, ctx: self.ctx }
    }

    pub(crate) fn byte(&self, i: usize) -> u8 {
        self.data[self.pos + i]
    }

    /// Bounds-checked byte read, used exclusively by the validating path so that a corrupt
    /// document is rejected rather than panicking on out-of-range access.
    fn checked_byte(&self, i: usize) -> Option<u8> {
        self.pos.checked_add(i).and_then(|idx| self.data.get(idx)).copied()
    }

    pub(crate) fn tag(&self) -> u8 {
        self.byte(0) >> 4
    }

    pub(crate) fn tiny(&self) -> u8 {
        self.byte(0) & 0x0F
    }

    pub(crate) fn is_pointer(&self) -> bool {
        self.byte(0) & 0x80 != 0
    }

    /// Returns a value with no surrounding document/extern context.
    pub fn with_context(&self, ctx: Context<'a>) -> Self {
        Value { ctx, ..*self }
    }

    pub fn context(&self) -> Context<'a> {
        self.ctx
    }

    /// This value's byte offset within its backing buffer. Used by [`crate::doc::Doc`] to
    /// store a root position without holding a self-referential `Value`.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// The backing buffer this value was decoded from. Used by the writer to detect whether a
    /// `Value` originates from its configured base buffer (append-delta mode).
    pub(crate) fn buffer(&self) -> &'a [u8] {
        self.data
    }

    /// Finds the root value of `data` without validating it (`from_trusted_data`).
    /// Calling this on untrusted/corrupt input is undefined in the sense that later accessors
    /// may panic or return nonsense, but it never reads outside of `data`'s bounds since all
    /// byte accesses remain bounds-checked by Rust; it is simply not *semantically* validated.
    pub fn from_trusted_data(data: &'a [u8]) -> Option<Self> {
        Self::from_trusted_data_in(data, Context::default())
    }

    pub fn from_trusted_data_in(data: &'a [u8], ctx: Context<'a>) -> Option<Self> {
        Self::find_root(data, ctx)
    }

    /// Finds and validates the root value of `data`. Returns `None` on any structural
    /// violation; never panics and never reads outside of `data`.
    pub fn from_data(data: &'a [u8]) -> Option<Self> {
        Self::from_data_in(data, Context::default())
    }

    pub fn from_data_in(data: &'a [u8], ctx: Context<'a>) -> Option<Self> {
        let root = Self::find_root(data, ctx)?;
        if root.validate(0, data.len()) {
            Some(root)
        } else {
            tracing::warn!(len = data.len(), "from_data: root failed validation");
            None
        }
    }

    fn find_root(data: &'a [u8], ctx: Context<'a>) -> Option<Self> {
        if data.len() < NARROW || data.len() % NARROW != 0 {
            return None;
        }
        let root_pos = data.len() - NARROW;
        let root = Value::at(data, root_pos, ctx);
        if root.is_pointer() {
            root.deref(false)
        } else {
            if data.len() != NARROW {
                return None;
            }
            Some(root)
        }
    }

    //////// Type / scalar accessors

    pub fn get_type(&self) -> ValueType {
        match self.tag() {
            TAG_SHORT_INT | TAG_INT | TAG_FLOAT => ValueType::Number,
            TAG_SPECIAL => match self.tiny() {
                SPECIAL_FALSE | SPECIAL_TRUE => ValueType::Boolean,
                _ => ValueType::Null,
            },
            TAG_STRING => ValueType::String,
            TAG_BINARY => ValueType::Data,
            TAG_ARRAY => ValueType::Array,
            TAG_DICT => ValueType::Dict,
            _ => ValueType::Null,
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.tag() == TAG_SPECIAL && self.tiny() == SPECIAL_UNDEFINED
    }

    pub fn is_unsigned(&self) -> bool {
        self.tag() == TAG_INT && self.byte(0) & 0x08 != 0
    }

    fn is_double(&self) -> bool {
        self.tag() == TAG_FLOAT && self.byte(0) & 0x08 != 0
    }

    pub fn as_bool(&self) -> bool {
        match self.tag() {
            TAG_SPECIAL => self.tiny() == SPECIAL_TRUE,
            TAG_SHORT_INT | TAG_INT | TAG_FLOAT => self.as_int() != 0,
            _ => true,
        }
    }

    fn short_value(&self) -> u16 {
        (((self.byte(0) as u16) << 8) | self.byte(1) as u16) & 0x0FFF
    }

    pub fn as_int(&self) -> i64 {
        match self.tag() {
            TAG_SPECIAL => (self.tiny() == SPECIAL_TRUE) as i64,
            TAG_SHORT_INT => {
                let i = self.short_value();
                if i & 0x0800 != 0 {
                    (i | 0xF000) as i16 as i64
                } else {
                    i as i64
                }
            }
            TAG_INT => {
                let byte_count = ((self.tiny() & 0x07) + 1) as usize;
                let unsigned = self.tiny() & 0x08 != 0;
                let mut buf = [0u8; 8];
                for i in 0..byte_count {
                    buf[i] = self.byte(1 + i);
                }
                if !unsigned && byte_count < 8 && (buf[byte_count - 1] & 0x80) != 0 {
                    for b in buf.iter_mut().skip(byte_count) {
                        *b = 0xFF;
                    }
                }
                LittleEndian::read_i64(&buf)
            }
            TAG_FLOAT => self.as_double() as i64,
            _ => 0,
        }
    }

    pub fn as_unsigned(&self) -> u64 {
        self.as_int() as u64
    }

    pub fn as_float(&self) -> f32 {
        self.as_float_of_type() as f32
    }

    pub fn as_double(&self) -> f64 {
        self.as_float_of_type()
    }

    fn as_float_of_type(&self) -> f64 {
        match self.tag() {
            TAG_FLOAT => {
                if self.is_double() {
                    LittleEndian::read_f64(&self.data[self.pos + 2..self.pos + 10])
                } else {
                    LittleEndian::read_f32(&self.data[self.pos + 2..self.pos + 6]) as f64
                }
            }
            _ => {
                if self.is_unsigned() {
                    self.as_unsigned() as f64
                } else {
                    self.as_int() as f64
                }
            }
        }
    }

    /// Returns `(payload_start_pos, payload_len)` for a String/Binary value.
    fn string_span(&self) -> (usize, usize) {
        let mut len = self.tiny() as usize;
        let mut start = self.pos + 1;
        if len == 0x0F {
            let (varlen, consumed) = crate::varint::read_uvarint(&self.data[start..])
                .expect("valid document: string length varint");
            len = varlen as usize;
            start += consumed;
        }
        (start, len)
    }

    pub(crate) fn string_bytes(&self) -> &'a [u8] {
        let (start, len) = self.string_span();
        &self.data[start..start + len]
    }

    pub fn as_string(&self) -> Option<&'a str> {
        if self.tag() == TAG_STRING {
            std::str::from_utf8(self.string_bytes()).ok()
        } else {
            None
        }
    }

    pub fn as_data(&self) -> Option<&'a [u8]> {
        if self.tag() == TAG_BINARY {
            Some(self.string_bytes())
        } else {
            None
        }
    }

    pub fn as_array(&self) -> Option<Array<'a>> {
        if self.tag() == TAG_ARRAY {
            Some(Array::wrap(*self))
        } else {
            None
        }
    }

    pub fn as_dict(&self) -> Option<Dict<'a>> {
        if self.tag() == TAG_DICT {
            Some(Dict::wrap(*self))
        } else {
            None
        }
    }

    //////// Array/dict header helpers (shared by Array/Dict readers)

    pub(crate) fn is_wide_container(&self) -> bool {
        self.byte(0) & 0x08 != 0
    }

    /// Returns `(first_child_pos, count, child_width)` for an array/dict header.
    pub(crate) fn container_header(&self) -> (usize, u32, usize) {
        let count_bits = (((self.byte(0) as u32) << 8) | self.byte(1) as u32) & 0x07FF;
        let width = if self.is_wide_container() { WIDE } else { NARROW };
        let mut first = self.pos + NARROW;
        let count = if count_bits == LONG_COUNT {
            let (excess, consumed) = crate::varint::read_uvarint(&self.data[first..])
                .expect("valid document: long array count varint");
            first += consumed;
            // pad to even address
            if first % 2 != 0 {
                first += 1;
            }
            LONG_COUNT as u64 + excess
        } else {
            count_bits as u64
        };
        (first, count as u32, width)
    }

    //////// Pointers

    fn pointer_offset_and_extern(&self, wide: bool) -> (u64, bool) {
        let is_extern = self.byte(0) & 0x40 != 0;
        if wide {
            let be = ((self.byte(0) as u32) << 24)
                | ((self.byte(1) as u32) << 16)
                | ((self.byte(2) as u32) << 8)
                | (self.byte(3) as u32);
            (((be & !0xC000_0000) as u64) << 1, is_extern)
        } else {
            let be = ((self.byte(0) as u16) << 8) | self.byte(1) as u16;
            (((be & !0xC000) as u64) << 1, is_extern)
        }
    }

    /// Dereferences a pointer value. `wide` indicates the slot width the pointer was read
    /// from (2 or 4 bytes), which the caller (array/dict iteration) always knows.
    pub(crate) fn deref(&self, wide: bool) -> Option<Value<'a>> {
        if !self.is_pointer() {
            return Some(*self);
        }
        let (offset, is_extern) = self.pointer_offset_and_extern(wide);
        if offset == 0 {
            return None;
        }
        if !is_extern {
            if offset as usize > self.pos {
                return None;
            }
            let target = self.pos - offset as usize;
            return Some(Value::at(self.data, target, self.ctx));
        }
        let base = match self.ctx.extern_base {
            Some(base) => base,
            // Legacy best-effort path: a pre-extern-flag document may carry the extern bit with
            // no extern buffer registered. Recover by resolving the offset within this value's
            // own buffer, same as a non-extern pointer. This crate's own writer never produces
            // such a pointer.
            None if offset as usize <= self.pos => {
                let target = self.pos - offset as usize;
                return Some(Value::at(self.data, target, self.ctx));
            }
            None => return None,
        };
        let self_logical = base.len() + self.pos;
        if offset as usize > self_logical {
            return None;
        }
        let target_logical = self_logical - offset as usize;
        if target_logical < base.len() {
            let new_ctx = Context { shared_keys: self.ctx.shared_keys, extern_base: None };
            Some(Value::at(base, target_logical, new_ctx))
        } else {
            Some(Value::at(self.data, target_logical - base.len(), self.ctx))
        }
    }

    //////// Validation

    /// Size of this value's own header+payload, not including any array/dict children.
    /// Used only for leaf bounds checking in `validate`.
    fn data_size(&self) -> usize {
        match self.tag() {
            TAG_SHORT_INT | TAG_SPECIAL => 2,
            TAG_FLOAT => {
                if self.is_double() {
                    10
                } else {
                    6
                }
            }
            TAG_INT => 2 + (self.tiny() & 0x07) as usize,
            TAG_STRING | TAG_BINARY => {
                let (start, len) = self.string_span();
                (start + len) - self.pos
            }
            TAG_ARRAY | TAG_DICT => {
                let (first, _, _) = self.container_header();
                first - self.pos
            }
            _ => 2,
        }
    }

    /// Bounds-checked equivalent of `data_size`, used only by `validate`. Returns `None` if
    /// any byte the header needs to decode its own size lies outside `data`.
    fn checked_data_size(&self, end: usize) -> Option<usize> {
        match self.tag() {
            TAG_SHORT_INT | TAG_SPECIAL => {
                self.checked_byte(1)?;
                Some(2)
            }
            TAG_FLOAT => {
                let size = if self.checked_byte(0)? & 0x08 != 0 { 10 } else { 6 };
                self.checked_byte(size - 1)?;
                Some(size)
            }
            TAG_INT => {
                let size = 2 + (self.tiny() & 0x07) as usize;
                self.checked_byte(size - 1)?;
                Some(size)
            }
            TAG_STRING | TAG_BINARY => {
                let (start, len) = self.checked_string_span()?;
                if start.checked_add(len)? > end {
                    return None;
                }
                Some((start + len) - self.pos)
            }
            TAG_ARRAY | TAG_DICT => {
                let (first, _, _) = self.checked_container_header()?;
                Some(first - self.pos)
            }
            _ => {
                self.checked_byte(1)?;
                Some(2)
            }
        }
    }

    /// Bounds-checked equivalent of `string_span`, used only by `validate`/`checked_data_size`.
    fn checked_string_span(&self) -> Option<(usize, usize)> {
        let mut len = self.tiny() as usize;
        let mut start = self.pos.checked_add(1)?;
        if len == 0x0F {
            let rest = self.data.get(start..)?;
            let (varlen, consumed) = crate::varint::read_uvarint(rest)?;
            len = usize::try_from(varlen).ok()?;
            start = start.checked_add(consumed)?;
        }
        Some((start, len))
    }

    /// Bounds-checked equivalent of `container_header`, used only by `validate`.
    fn checked_container_header(&self) -> Option<(usize, u32, usize)> {
        let b0 = self.checked_byte(0)?;
        let b1 = self.checked_byte(1)?;
        let count_bits = (((b0 as u32) << 8) | b1 as u32) & 0x07FF;
        let width = if b0 & 0x08 != 0 { WIDE } else { NARROW };
        let mut first = self.pos.checked_add(NARROW)?;
        let count = if count_bits == LONG_COUNT {
            let rest = self.data.get(first..)?;
            let (excess, consumed) = crate::varint::read_uvarint(rest)?;
            first = first.checked_add(consumed)?;
            if first % 2 != 0 {
                first = first.checked_add(1)?;
            }
            (LONG_COUNT as u64).checked_add(excess)?
        } else {
            count_bits as u64
        };
        let count = u32::try_from(count).ok()?;
        Some((first, count, width))
    }

    /// Bounds-checked equivalent of `pointer_offset_and_extern`, used only by `validate`.
    fn checked_pointer_offset_and_extern(&self, wide: bool) -> Option<(u64, bool)> {
        let b0 = self.checked_byte(0)?;
        let is_extern = b0 & 0x40 != 0;
        if wide {
            let b1 = self.checked_byte(1)?;
            let b2 = self.checked_byte(2)?;
            let b3 = self.checked_byte(3)?;
            let be = ((b0 as u32) << 24) | ((b1 as u32) << 16) | ((b2 as u32) << 8) | (b3 as u32);
            Some((((be & !0xC000_0000) as u64) << 1, is_extern))
        } else {
            let b1 = self.checked_byte(1)?;
            let be = ((b0 as u16) << 8) | b1 as u16;
            Some((((be & !0xC000) as u64) << 1, is_extern))
        }
    }

    /// Recursively validates that every byte this value (and its children) claims to occupy
    /// lies within `[start, end)`. Mirrors `Value::validate` in the reference implementation.
    /// Uses only bounds-checked reads, so a corrupt document is rejected rather than causing
    /// an out-of-range panic.
    pub(crate) fn validate(&self, start: usize, end: usize) -> bool {
        if self.checked_byte(0).is_none() || self.pos >= end {
            return false;
        }
        let t = self.tag();
        if t == TAG_ARRAY || t == TAG_DICT {
            let (first, count, width) = match self.checked_container_header() {
                Some(h) => h,
                None => return false,
            };
            let item_count = if t == TAG_DICT { count as usize * 2 } else { count as usize };
            if item_count == 0 {
                return first <= end;
            }
            let items_size = match item_count.checked_mul(width) {
                Some(n) => n,
                None => return false,
            };
            let items_end = match first.checked_add(items_size) {
                Some(n) => n,
                None => return false,
            };
            if items_end > end {
                return false;
            }
            let mut item_pos = first;
            for _ in 0..item_count {
                let item = Value::at(self.data, item_pos, self.ctx);
                let next_pos = item_pos + width;
                if item.checked_byte(0).is_none() {
                    return false;
                }
                if item.is_pointer() {
                    if !item.validate_pointer(width == WIDE, start) {
                        return false;
                    }
                } else if !item.validate(start, next_pos) {
                    return false;
                }
                item_pos = next_pos;
            }
            return true;
        }
        match self.checked_data_size(end) {
            Some(size) => match self.pos.checked_add(size) {
                Some(n) => n <= end,
                None => false,
            },
            None => false,
        }
    }

    fn validate_pointer(&self, wide: bool, start: usize) -> bool {
        let (offset, is_extern) = match self.checked_pointer_offset_and_extern(wide) {
            Some(o) => o,
            None => return false,
        };
        if offset == 0 {
            return false;
        }
        let target = match self.deref(wide) {
            Some(t) => t,
            None => return false,
        };
        if !is_extern {
            // target lives in the same buffer: it must be strictly before this pointer.
            if target.pos >= self.pos {
                return false;
            }
            return target.validate(start, self.pos);
        }
        target.validate(start, target.data.len())
    }
}

impl<'a> PartialEq for Value<'a> {
    fn eq(&self, other: &Self) -> bool {
        if self.byte(0) != other.byte(0) {
            return false;
        }
        match self.tag() {
            TAG_SHORT_INT | TAG_INT => self.as_int() == other.as_int(),
            TAG_FLOAT => {
                if self.is_double() {
                    self.as_double() == other.as_double()
                } else {
                    self.as_float() == other.as_float()
                }
            }
            TAG_SPECIAL => self.tiny() == other.tiny(),
            TAG_STRING | TAG_BINARY => self.string_bytes() == other.string_bytes(),
            TAG_ARRAY => {
                let (a, b) = (self.as_array().unwrap(), other.as_array().unwrap());
                a.count() == b.count() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            TAG_DICT => self.as_dict().unwrap().is_equal_to(&other.as_dict().unwrap()),
            _ => false,
        }
    }
}
