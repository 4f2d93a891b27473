// Block hashing for deduplication.
//
// This module provides:
// - Block digests (SHA-256, hex encoding)
// - The per-file hash index and the block hasher that builds it
// - The sidecar cache that persists an index next to its source file
// - Block size and cache naming constants

pub mod cache;
pub mod config;
pub mod digest;
pub mod index;

pub use cache::{CacheStatus, load_or_compute};
pub use digest::BlockHash;
pub use index::HashIndex;
