// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors surfaced by the wire substrate, the compressor, and the three
/// message codecs built on top of them.
///
/// `ReadPastEndOfBuffer` is special: the PPN decoder's inner pair loop
/// treats it as the normal end-of-stream signal rather than a failure (see
/// `ndmap-ppn`). Everywhere else it propagates like any other variant.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to pack field `{field}` onto the wire")]
    PackFail { field: &'static str },

    #[error("failed to unpack field `{field}` from the wire")]
    UnpackFail { field: &'static str },

    #[error("read past the end of the buffer while unpacking `{field}`")]
    ReadPastEndOfBuffer { field: &'static str },

    #[error("failed to decompress a blob: expected {expected} bytes ({reason})")]
    DecompressFail { expected: usize, reason: String },

    #[error("{what} not found: {detail}")]
    NotFound { what: &'static str, detail: String },
}

pub type Result<T> = std::result::Result<T, Error>;
