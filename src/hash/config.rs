// Block and cache configuration constants.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Default block size (64 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default progress cadence, in blocks.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Cache sidecar extension for SHA-256 block hashes.
///
/// Bump the trailing digit when the hash scheme changes so older sidecars
/// are never loaded as compatible.
pub const CACHE_EXTENSION: &str = ".dh1";

/// Largest block count either side of a diff may have: pointers are
/// stored as 8 hex digits.
pub const MAX_BLOCKS: u64 = 1 << 32;

/// Sidecar extension for a given block size.
///
/// The default block size keeps the bare extension; any other size is
/// appended so hashes computed with a different block size are not reused.
pub fn cache_extension(block_size: usize) -> String {
    if block_size == DEFAULT_BLOCK_SIZE {
        CACHE_EXTENSION.to_string()
    } else {
        format!("{CACHE_EXTENSION}.{block_size}")
    }
}

/// Sidecar path for `source`: the source path with the cache extension
/// appended (not substituted).
pub fn cache_path(source: &Path, block_size: usize) -> PathBuf {
    let mut name: OsString = source.as_os_str().to_owned();
    name.push(cache_extension(block_size));
    PathBuf::from(name)
}
