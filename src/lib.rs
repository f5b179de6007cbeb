//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! A reader and writer for the Tagged Value Format (TVF): a zero-copy, self-describing
//! binary serialization format for JSON-compatible data, with optional dictionary key
//! sharing and in-place mutation via a heap overlay.

mod array;
mod deep_iter;
mod dict;
mod doc;
mod error;
mod json;
mod mutable;
mod path;
mod shared_keys;
mod value;
mod varint;
mod writer;

pub use array::{Array, ArrayIterator};
pub use deep_iter::{DeepIterator, DeepIteratorItem};
pub use dict::{Dict, DictIterator, DictKey};
pub use doc::{Doc, Trust};
pub use error::{Error, Result};
pub use mutable::{ArrayView, DictView, Item, MutableArray, MutableDict};
pub use path::Path;
pub use shared_keys::{KeyT, PersistentSharedKeys, SharedKeys, DEFAULT_MAX_KEY_LENGTH, MAX_COUNT};
pub use value::{Context, Value, ValueType};
pub use writer::Encoder;
