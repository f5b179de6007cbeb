//
// mutable/slot.rs
//
// The per-element storage unit of a mutable overlay: either a copied scalar, an owned
// handle to a nested mutable collection, an explicit undefined tombstone, or "unset" (fall
// through to the source collection).
//

use super::array::MutableArray;
use super::dict::MutableDict;
use crate::array::Array;
use crate::dict::Dict;
use crate::value::{Value, ValueType, TAG_FLOAT};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

/// One child of a mutable array or dict.
pub enum Slot<'a> {
    /// No local override: read through to the source collection.
    Unset,
    /// An explicit tombstone hiding a source entry.
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(String),
    Data(Vec<u8>),
    Array(Rc<RefCell<MutableArray<'a>>>),
    Dict(Rc<RefCell<MutableDict<'a>>>),
}

impl<'a> Slot<'a> {
    pub(super) fn from_value(v: Value<'a>) -> Self {
        match v.get_type() {
            ValueType::Null if v.is_undefined() => Slot::Undefined,
            ValueType::Null => Slot::Null,
            ValueType::Boolean => Slot::Bool(v.as_bool()),
            ValueType::Number if v.tag() == TAG_FLOAT => Slot::Double(v.as_double()),
            ValueType::Number if v.is_unsigned() => Slot::UInt(v.as_unsigned()),
            ValueType::Number => Slot::Int(v.as_int()),
            ValueType::String => Slot::String(v.as_string().unwrap_or_default().to_string()),
            ValueType::Data => Slot::Data(v.as_data().unwrap_or_default().to_vec()),
            ValueType::Array => Slot::Array(Rc::new(RefCell::new(MutableArray::from_source(v.as_array().unwrap())))),
            ValueType::Dict => Slot::Dict(Rc::new(RefCell::new(MutableDict::from_source(v.as_dict().unwrap())))),
        }
    }

    pub(super) fn is_unset(&self) -> bool {
        matches!(self, Slot::Unset)
    }
}

/// A read-only snapshot of an array, wherever it lives: still in the immutable source buffer,
/// or promoted to a mutable overlay.
#[derive(Clone)]
pub enum ArrayView<'a> {
    Source(Array<'a>),
    Mutable(Rc<RefCell<MutableArray<'a>>>),
}

/// A read-only snapshot of a dict, wherever it lives.
#[derive(Clone)]
pub enum DictView<'a> {
    Source(Dict<'a>),
    Mutable(Rc<RefCell<MutableDict<'a>>>),
}

/// A value as read back from a mutable collection: either borrowed straight from the source
/// buffer, or owned because it was written as a local override.
pub enum Item<'a> {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(Cow<'a, str>),
    Data(Cow<'a, [u8]>),
    Array(ArrayView<'a>),
    Dict(DictView<'a>),
}

impl<'a> Item<'a> {
    pub(super) fn from_value(v: Value<'a>) -> Self {
        match v.get_type() {
            ValueType::Null => Item::Null,
            ValueType::Boolean => Item::Bool(v.as_bool()),
            ValueType::Number if v.tag() == TAG_FLOAT => Item::Double(v.as_double()),
            ValueType::Number if v.is_unsigned() => Item::UInt(v.as_unsigned()),
            ValueType::Number => Item::Int(v.as_int()),
            ValueType::String => Item::String(Cow::Borrowed(v.as_string().unwrap_or(""))),
            ValueType::Data => Item::Data(Cow::Borrowed(v.as_data().unwrap_or(&[]))),
            ValueType::Array => Item::Array(ArrayView::Source(v.as_array().unwrap())),
            ValueType::Dict => Item::Dict(DictView::Source(v.as_dict().unwrap())),
        }
    }

    pub(super) fn from_slot(slot: &Slot<'a>) -> Option<Self> {
        Some(match slot {
            Slot::Unset => return None,
            Slot::Undefined => Item::Null,
            Slot::Null => Item::Null,
            Slot::Bool(b) => Item::Bool(*b),
            Slot::Int(i) => Item::Int(*i),
            Slot::UInt(u) => Item::UInt(*u),
            Slot::Float(f) => Item::Float(*f),
            Slot::Double(d) => Item::Double(*d),
            Slot::String(s) => Item::String(Cow::Owned(s.clone())),
            Slot::Data(d) => Item::Data(Cow::Owned(d.clone())),
            Slot::Array(rc) => Item::Array(ArrayView::Mutable(rc.clone())),
            Slot::Dict(rc) => Item::Dict(DictView::Mutable(rc.clone())),
        })
    }

    pub fn is_undefined_tombstone(slot: &Slot<'a>) -> bool {
        matches!(slot, Slot::Undefined)
    }
}
