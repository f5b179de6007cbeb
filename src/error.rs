//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use serde::{de, ser};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Tagged Value Format serialization, deserialization and mutation error.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Error {
    /// Constructed from serde serialization/deserialization errors.
    #[error("{0}")]
    Message(String),

    /// An iterator was advanced past its end, or an index was out of range.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Structural corruption was detected while decoding or validating a document.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The writer was misused (value written where a key was expected, container left open
    /// at `finish`, etc).
    #[error("encode error: {0}")]
    EncodeError(String),

    /// The JSON bridge rejected input it was asked to convert.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// A `Path` specifier string was malformed.
    #[error("invalid path syntax: {0}")]
    PathSyntaxError(String),

    /// `encode_and_add` was called outside of a transaction, or `load_from` was given a
    /// history that diverges from the current table.
    #[error("shared keys state error: {0}")]
    SharedKeysStateError(String),

    /// Lookup of a shared-key integer that is not registered.
    #[error("not found: {0}")]
    NotFound(String),

    /// An invariant was violated that should not occur with non-corrupted state.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}
