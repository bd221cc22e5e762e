// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Errors returned by document, transaction and codec operations.
//!
//! Every error here is local and recoverable: the [`Doc`](crate::Doc) stays usable after any of
//! them, and no operation that returns an error has modified document state.
use crate::types::BranchKind;
use std::fmt;

/// Convenience alias for results produced by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type of all fallible operations in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The single-writer/multi-reader discipline of a document was violated.
    ///
    /// Returned when opening a write transaction while any other transaction is open, or a read
    /// transaction while a write transaction is open.
    Concurrency,

    /// A handle was used after it was committed, ended or destroyed, or with a document it does
    /// not belong to.
    InvalidHandle,

    /// A root branch name was requested with a different kind than it was registered with.
    TypeMismatch {
        name: String,
        existing: BranchKind,
        requested: BranchKind,
    },

    /// An index or length was out of bounds for a sequence.
    Range {
        index: usize,
        len: usize,
        available: usize,
    },

    /// Update bytes could not be decoded.
    Codec(CodecError),

    /// Update bytes carry an encoding version this engine does not understand.
    Version { found: u8, supported: u8 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Concurrency => {
                write!(f, "a conflicting transaction is already open on this document")
            }
            Error::InvalidHandle => write!(f, "handle is no longer valid"),
            Error::TypeMismatch {
                name,
                existing,
                requested,
            } => write!(
                f,
                "branch {name:?} exists as {existing}, cannot open it as {requested}"
            ),
            Error::Range {
                index,
                len,
                available,
            } => write!(
                f,
                "range {index}..{} out of bounds for length {available}",
                index.saturating_add(*len)
            ),
            Error::Codec(err) => write!(f, "malformed update: {err}"),
            Error::Version { found, supported } => {
                write!(
                    f,
                    "unsupported encoding version {found} (supported: {supported})"
                )
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CodecError> for Error {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

/// Describes why a byte sequence is not a valid encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input ended in the middle of a value.
    UnexpectedEnd,

    /// A variable-length integer does not fit into 64 bits.
    VarIntOverflow,

    /// A string payload is not valid UTF-8.
    InvalidUtf8,

    /// A character payload is not a Unicode scalar value.
    InvalidChar(u32),

    /// A tag byte is not a member of its closed enumeration.
    UnknownTag { field: &'static str, tag: u8 },

    /// Blocks of a client are out of order or overlap.
    ClockOrder { client: u64, clock: u64 },

    /// Bytes were left after the complete value was decoded.
    TrailingBytes(usize),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::UnexpectedEnd => write!(f, "unexpected end of input"),
            CodecError::VarIntOverflow => write!(f, "variable-length integer overflows u64"),
            CodecError::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
            CodecError::InvalidChar(c) => write!(f, "invalid character code {c:#x}"),
            CodecError::UnknownTag { field, tag } => write!(f, "unknown {field} tag {tag}"),
            CodecError::ClockOrder { client, clock } => {
                write!(f, "block {client}#{clock} is out of order")
            }
            CodecError::TrailingBytes(n) => write!(f, "{n} trailing bytes after update"),
        }
    }
}

impl std::error::Error for CodecError {}
