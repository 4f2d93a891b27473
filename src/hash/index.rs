// Per-file block hash index and the block hasher that builds it.

use std::collections::HashMap;
use std::io::{self, Read};
use std::time::Instant;

use log::debug;

use super::digest::BlockHash;
use crate::error::{Error, Result};
use crate::progress::{Progress, Stage, Ticker};

/// Ordered block hashes of one file plus a first-occurrence lookup.
///
/// `first_index[h]` is always the smallest `i` with `hashes[i] == h`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashIndex {
    hashes: Vec<BlockHash>,
    first_index: HashMap<BlockHash, u64>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from an ordered hash sequence.
    pub fn from_hashes<I: IntoIterator<Item = BlockHash>>(hashes: I) -> Self {
        let mut index = Self::new();
        for h in hashes {
            index.push(h);
        }
        index
    }

    /// Append the hash of the next block. Later duplicates keep the
    /// earlier block's index.
    pub fn push(&mut self, hash: BlockHash) {
        let block_num = self.hashes.len() as u64;
        self.first_index.entry(hash).or_insert(block_num);
        self.hashes.push(hash);
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Hashes in block order.
    pub fn hashes(&self) -> &[BlockHash] {
        &self.hashes
    }

    /// Index of the first block with hash `hash`.
    pub fn first_index(&self, hash: &BlockHash) -> Option<u64> {
        self.first_index.get(hash).copied()
    }

    /// Number of distinct hashes.
    pub fn distinct(&self) -> usize {
        self.first_index.len()
    }

    /// Hash `reader` in `block_size` chunks until end of stream.
    ///
    /// The final chunk may be shorter than `block_size` and is still a
    /// block. An empty stream yields an empty index.
    pub fn compute<R: Read>(
        reader: &mut R,
        block_size: usize,
        progress: &mut dyn Progress,
    ) -> Result<Self> {
        Self::compute_with_interval(
            reader,
            block_size,
            crate::hash::config::DEFAULT_PROGRESS_INTERVAL,
            progress,
        )
    }

    /// Like [`compute`](Self::compute) with an explicit progress cadence.
    pub fn compute_with_interval<R: Read>(
        reader: &mut R,
        block_size: usize,
        interval: u64,
        progress: &mut dyn Progress,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidBlockSize(block_size));
        }

        let start = Instant::now();
        let mut index = Self::new();
        let mut ticker = Ticker::new(Stage::Hash, interval);
        let mut buf = vec![0u8; block_size];
        let mut total = 0u64;

        loop {
            let n = fill_block(reader, &mut buf)?;
            if n == 0 {
                break;
            }
            index.push(BlockHash::of(&buf[..n]));
            total += n as u64;
            ticker.step(progress, false);
            if n < block_size {
                break;
            }
        }
        ticker.finish(progress);

        let secs = start.elapsed().as_secs_f64();
        debug!(
            "hashed {} blocks ({total} bytes) in {secs:.3}s, {:.3} MB/s",
            index.len(),
            total as f64 / (1024.0 * 1024.0) / secs.max(1e-6)
        );
        Ok(index)
    }
}

impl FromIterator<BlockHash> for HashIndex {
    fn from_iter<I: IntoIterator<Item = BlockHash>>(iter: I) -> Self {
        Self::from_hashes(iter)
    }
}

/// Read until `buf` is full or the stream ends. Short OS reads never split
/// a logical block.
pub(crate) fn fill_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
