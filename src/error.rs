// Error taxonomy for hashing, diffing and restoring.
//
// I/O errors are always fatal. Format errors carry the offending record and
// its byte offset so a corrupt artifact can be diagnosed. Staleness of a
// cache sidecar is not an error and never surfaces here.

use std::io;
use std::path::PathBuf;

use crate::format::FormatError;

/// Which side of the diff a block pointer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Block index into the base file.
    Base,
    /// Block index into the child file.
    Child,
    /// Block index into the diff payload region.
    Payload,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => f.write_str("base"),
            Self::Child => f.write_str("child"),
            Self::Payload => f.write_str("payload"),
        }
    }
}

/// Crate error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("diff format error: {0}")]
    Format(#[from] FormatError),

    /// A hash cache line is not a well-formed hex digest.
    #[error("{}: line {line}: malformed block hash {value:?}", path.display())]
    CacheParse {
        path: PathBuf,
        line: usize,
        value: String,
    },

    /// A block pointer does not fit the 8-hex-digit record field.
    #[error("{side} block pointer {value} exceeds the 32-bit record range")]
    Capacity { side: Side, value: u64 },

    /// A block pointer runs past the end of its file or payload region.
    #[error("{side} block {ptr} is out of range")]
    MissingBlock { side: Side, ptr: u64 },

    /// A block other than the child's last one is shorter than the block size.
    #[error("{side} block {ptr} is truncated ({got} of {expected} bytes)")]
    ShortBlock {
        side: Side,
        ptr: u64,
        got: usize,
        expected: usize,
    },

    /// A hash index does not describe the file it is applied to.
    #[error("hash index has {indexed} blocks but the {side} file has {actual}")]
    IndexMismatch {
        side: Side,
        indexed: u64,
        actual: u64,
    },

    #[error("invalid block size: {0}")]
    InvalidBlockSize(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
