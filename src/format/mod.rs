// Diff artifact binary layout.
//
// A diff artifact is an index table of fixed-width records (one per child
// block plus a terminator) followed immediately by the payload region: the
// raw bytes of every child block that was not found in the base, in child
// order.
//
// # Modules
//
// - `record` — the 11-byte `IndexRecord` codec
// - `table`  — index table writer and reader

pub mod record;
pub mod table;

pub use record::{END_SENTINEL, IndexRecord, RECORD_LEN};
pub use table::{IndexTable, IndexTableWriter, read_index_table, table_len};

/// Malformed diff artifact.
///
/// `index` is the zero-based record number and `offset` its byte offset
/// from the start of the artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("record {index} at offset {offset}: index table truncated ({got} of {RECORD_LEN} bytes)")]
    TruncatedIndex { index: u64, offset: u64, got: usize },

    #[error("record {index} at offset {offset}: unknown block type {:?} (pointer {ptr:08x})", *tag as char)]
    UnknownTag {
        index: u64,
        offset: u64,
        tag: u8,
        ptr: u32,
    },

    #[error("record {index} at offset {offset}: invalid block pointer {raw:?}")]
    BadPointer { index: u64, offset: u64, raw: String },

    #[error("record {index} at offset {offset}: bad line terminator {found:02x?}")]
    BadTerminator {
        index: u64,
        offset: u64,
        found: [u8; 2],
    },

    #[error("record {index} at offset {offset}: end marker with pointer {ptr:08x}")]
    BadSentinel { index: u64, offset: u64, ptr: u32 },
}
