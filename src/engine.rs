// Dedup engine: compares block hash indexes and encodes/replays the diff.
//
// Encoding walks the child's blocks in order. A block whose hash appears in
// the base index becomes a `B` record pointing at the base's first block
// with that hash; any other block becomes a `C` record and its bytes are
// appended to the payload region. Blocks are never matched against earlier
// blocks of the same child, so repeated new blocks are stored repeatedly.
//
// Restoring reads the whole index table, then copies each block from the
// base file or the payload region to the output in record order.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::Instant;

use log::{debug, info};

use crate::error::{Error, Result, Side};
use crate::format::{IndexRecord, IndexTableWriter, read_index_table};
use crate::hash::HashIndex;
use crate::hash::config::{DEFAULT_BLOCK_SIZE, DEFAULT_PROGRESS_INTERVAL, MAX_BLOCKS};
use crate::hash::index::fill_block;
use crate::progress::{Progress, Stage, Ticker};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration shared by hashing, diffing and restoring.
///
/// The block size is not recorded in the diff artifact; a diff must be
/// restored with the block size it was encoded with.
#[derive(Debug, Clone)]
pub struct DedupOptions {
    /// Block size in bytes.
    pub block_size: usize,
    /// Progress hook cadence in blocks (0 disables).
    pub progress_interval: u64,
    /// Read and write hash sidecars next to the inputs.
    pub use_cache: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            use_cache: true,
        }
    }
}

impl DedupOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidBlockSize(self.block_size));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Result of encoding a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    /// Child blocks found in the base (`B` records).
    pub matched: u64,
    /// Child blocks written to the payload (`C` records).
    pub new: u64,
    pub block_size: usize,
    /// Child size in bytes.
    pub child_size: u64,
    /// Index table size in bytes, terminator included.
    pub index_bytes: u64,
    /// Payload region size in bytes.
    pub payload_bytes: u64,
}

impl DiffStats {
    /// Total child blocks.
    pub fn blocks(&self) -> u64 {
        self.matched + self.new
    }

    /// Total diff artifact size in bytes.
    pub fn diff_size(&self) -> u64 {
        self.index_bytes + self.payload_bytes
    }

    /// Percentage of child blocks found in the base; 0 for an empty child.
    pub fn dedup_rate(&self) -> f64 {
        match self.blocks() {
            0 => 0.0,
            n => 100.0 * self.matched as f64 / n as f64,
        }
    }
}

/// Result of restoring a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreStats {
    /// Blocks written.
    pub blocks: u64,
    /// Blocks copied from the base file.
    pub from_base: u64,
    /// Blocks copied from the payload region.
    pub from_diff: u64,
    /// Bytes written.
    pub output_size: u64,
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode `child` against `base`, writing the diff artifact to `out`.
///
/// `child_index` must describe the bytes behind `child`; a block count that
/// disagrees with the child's length is an `IndexMismatch`. The index table
/// is buffered and written at offset 0 after the payload, which starts at
/// the table's precomputed length.
pub fn encode<R, W>(
    base: &HashIndex,
    child_index: &HashIndex,
    child: &mut R,
    out: &mut W,
    opts: &DedupOptions,
    progress: &mut dyn Progress,
) -> Result<DiffStats>
where
    R: Read + Seek,
    W: Write + Seek,
{
    opts.validate()?;
    let block_size = opts.block_size as u64;

    let child_size = child.seek(SeekFrom::End(0))?;
    let actual_blocks = child_size.div_ceil(block_size);
    if actual_blocks != child_index.len() as u64 {
        return Err(Error::IndexMismatch {
            side: Side::Child,
            indexed: child_index.len() as u64,
            actual: actual_blocks,
        });
    }

    info!("comparing {} blocks", child_index.len());
    let start = Instant::now();

    let mut table = IndexTableWriter::new(child_index.len() as u64);
    out.seek(SeekFrom::Start(table.reserved_len()))?;

    let mut child = Positioned::new(child);
    let mut ticker = Ticker::new(Stage::Diff, opts.progress_interval);
    let mut buf = vec![0u8; opts.block_size];
    let mut matched = 0u64;
    let mut new = 0u64;
    let mut payload_bytes = 0u64;

    for (i, hash) in child_index.hashes().iter().enumerate() {
        let fresh = match base.first_index(hash) {
            Some(base_block) => {
                table.push(IndexRecord::Base(record_ptr(Side::Base, base_block)?));
                matched += 1;
                false
            }
            None => {
                table.push(IndexRecord::Child(record_ptr(Side::Payload, new)?));
                let n = child.read_at(i as u64 * block_size, &mut buf)?;
                if n == 0 {
                    return Err(Error::MissingBlock {
                        side: Side::Child,
                        ptr: i as u64,
                    });
                }
                out.write_all(&buf[..n])?;
                payload_bytes += n as u64;
                new += 1;
                true
            }
        };
        ticker.step(progress, fresh);
    }
    ticker.finish(progress);

    out.seek(SeekFrom::Start(0))?;
    let index_bytes = table.finish(out)?;
    out.flush()?;

    let secs = start.elapsed().as_secs_f64();
    debug!(
        "compared {} blocks in {secs:.3}s, {:.3} MB/s",
        matched + new,
        child_size as f64 / (1024.0 * 1024.0) / secs.max(1e-6)
    );

    Ok(DiffStats {
        matched,
        new,
        block_size: opts.block_size,
        child_size,
        index_bytes,
        payload_bytes,
    })
}

/// Narrow a block pointer to the 32-bit record field.
fn record_ptr(side: Side, value: u64) -> Result<u32> {
    if value >= MAX_BLOCKS {
        return Err(Error::Capacity { side, value });
    }
    Ok(value as u32)
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// Rebuild a child from `base` and the diff artifact `diff`, writing it to
/// `out`.
///
/// The whole index table is decoded before the first output byte is
/// written, so a malformed table fails without producing output.
pub fn restore<B, D, W>(
    base: &mut B,
    diff: &mut D,
    out: &mut W,
    opts: &DedupOptions,
    progress: &mut dyn Progress,
) -> Result<RestoreStats>
where
    B: Read + Seek,
    D: Read + Seek,
    W: Write,
{
    opts.validate()?;
    let block_size = opts.block_size as u64;

    info!("reading index table");
    diff.seek(SeekFrom::Start(0))?;
    let table = read_index_table(diff)?;

    info!("combining base and diff blocks ({} records)", table.records.len());
    let start = Instant::now();

    let mut base = Positioned::new(base);
    let mut diff = Positioned::at(diff, table.payload_offset);
    let mut ticker = Ticker::new(Stage::Restore, opts.progress_interval);
    let mut buf = vec![0u8; opts.block_size];
    let mut stats = RestoreStats {
        blocks: 0,
        from_base: 0,
        from_diff: 0,
        output_size: 0,
    };

    let last = table.records.len().saturating_sub(1);
    for (i, record) in table.records.iter().enumerate() {
        let (side, ptr, n) = match *record {
            IndexRecord::Base(ptr) => {
                stats.from_base += 1;
                let n = base.read_at(u64::from(ptr) * block_size, &mut buf)?;
                (Side::Base, ptr, n)
            }
            IndexRecord::Child(ptr) => {
                stats.from_diff += 1;
                let offset = table.payload_offset + u64::from(ptr) * block_size;
                let n = diff.read_at(offset, &mut buf)?;
                (Side::Payload, ptr, n)
            }
            // The table reader stops at the terminator.
            IndexRecord::End => break,
        };
        if n == 0 {
            return Err(Error::MissingBlock {
                side,
                ptr: u64::from(ptr),
            });
        }
        // Only the child's final block may be short.
        if n < buf.len() && i != last {
            return Err(Error::ShortBlock {
                side,
                ptr: u64::from(ptr),
                got: n,
                expected: buf.len(),
            });
        }
        out.write_all(&buf[..n])?;
        stats.output_size += n as u64;
        stats.blocks += 1;
        ticker.step(progress, false);
    }
    ticker.finish(progress);
    out.flush()?;

    let secs = start.elapsed().as_secs_f64();
    debug!(
        "restored {} blocks in {secs:.3}s, {:.3} MB/s",
        stats.blocks,
        stats.output_size as f64 / (1024.0 * 1024.0) / secs.max(1e-6)
    );
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Positioned reader
// ---------------------------------------------------------------------------

/// Seekable reader that skips the seek when the next block is already at
/// the current position, so buffered readers keep their buffer across
/// consecutive blocks.
struct Positioned<'a, R> {
    inner: &'a mut R,
    pos: Option<u64>,
}

impl<'a, R: Read + Seek> Positioned<'a, R> {
    fn new(inner: &'a mut R) -> Self {
        Self { inner, pos: None }
    }

    fn at(inner: &'a mut R, pos: u64) -> Self {
        Self {
            inner,
            pos: Some(pos),
        }
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos != Some(offset) {
            self.inner.seek(SeekFrom::Start(offset))?;
        }
        let n = fill_block(self.inner, buf)?;
        self.pos = Some(offset + n as u64);
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
