//
// mutable/mod.rs
//
// The mutable overlay: heap-allocated arrays and dicts that can be built from scratch or wrap
// an immutable source, recording only the deltas needed to re-encode them.
//
// Keys in [`MutableDict`] are always represented as decoded Rust strings, even when the
// source dict used shared integer keys — a documented simplification (see DESIGN.md) that
// trades a little space efficiency on re-encode for a much simpler merge/sort implementation.
//

mod array;
mod dict;
mod slot;

pub use array::MutableArray;
pub use dict::MutableDict;
pub use slot::{ArrayView, DictView, Item};
