// Index table writer and reader.

use std::io::{self, Read, Write};

use super::FormatError;
use super::record::{IndexRecord, RECORD_LEN};
use crate::error::Result;

/// Byte length of the index table for a child with `child_blocks` blocks,
/// terminator included.
pub fn table_len(child_blocks: u64) -> u64 {
    (child_blocks + 1) * RECORD_LEN as u64
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Accumulates encoded records for a table whose size is fixed up front.
///
/// The table is buffered in memory while the payload is streamed past the
/// reserved region, then written at the head of the artifact.
#[derive(Debug)]
pub struct IndexTableWriter {
    buf: Vec<u8>,
    expected: u64,
}

impl IndexTableWriter {
    /// Reserve room for `child_blocks` records plus the terminator.
    pub fn new(child_blocks: u64) -> Self {
        let len = table_len(child_blocks);
        Self {
            buf: Vec::with_capacity(len as usize),
            expected: len,
        }
    }

    /// Total reserved length in bytes.
    pub fn reserved_len(&self) -> u64 {
        self.expected
    }

    pub fn push(&mut self, record: IndexRecord) {
        self.buf.extend_from_slice(&record.encode());
    }

    /// Append the terminator and write the table to `w`.
    ///
    /// Fails if the number of pushed records does not match the reserved
    /// size, since the payload region has already been placed after it.
    pub fn finish<W: Write>(mut self, w: &mut W) -> io::Result<u64> {
        self.push(IndexRecord::End);
        if self.buf.len() as u64 != self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "index table is {} bytes, {} were reserved",
                    self.buf.len(),
                    self.expected
                ),
            ));
        }
        w.write_all(&self.buf)?;
        Ok(self.expected)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// A decoded index table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTable {
    /// Records in child block order, terminator excluded.
    pub records: Vec<IndexRecord>,
    /// Offset of the first payload byte (just past the terminator).
    pub payload_offset: u64,
}

/// Read records from the start of `r` until the terminator.
///
/// A stream that ends before the terminator is a
/// `FormatError::TruncatedIndex`, never a short table.
pub fn read_index_table<R: Read>(r: &mut R) -> Result<IndexTable> {
    let mut records = Vec::new();
    let mut raw = [0u8; RECORD_LEN];
    let mut index = 0u64;

    loop {
        let got = read_full(r, &mut raw)?;
        if got < RECORD_LEN {
            return Err(FormatError::TruncatedIndex {
                index,
                offset: index * RECORD_LEN as u64,
                got,
            }
            .into());
        }
        match IndexRecord::decode(&raw, index)? {
            IndexRecord::End => break,
            rec => records.push(rec),
        }
        index += 1;
    }

    Ok(IndexTable {
        records,
        payload_offset: (index + 1) * RECORD_LEN as u64,
    })
}

/// Fill `buf` as far as the stream allows; returns the byte count.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
