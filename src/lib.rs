//! blockdedup: fixed-block deduplication of a child file against a base file.
//!
//! The child is split into fixed-size blocks and every block is hashed
//! (SHA-256). Blocks whose hash also occurs in the base are replaced by a
//! reference to the base block; the rest are stored verbatim. The resulting
//! diff artifact plus the base reconstructs the child byte for byte.
//!
//! Blocks are considered equal when their hashes are equal; block bytes are
//! never compared. Correctness therefore depends on SHA-256 collision
//! resistance for the volume of data being deduplicated.
//!
//! The crate provides:
//! - Block hashing and the hash sidecar cache (`hash`)
//! - The diff artifact wire format (`format`)
//! - Stream-level encode/restore (`engine`)
//! - File-level entry points (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use blockdedup::engine::DedupOptions;
//! use blockdedup::progress::NoProgress;
//!
//! let opts = DedupOptions::default();
//! let stats = blockdedup::io::diff(
//!     Path::new("disk-monday.img"),
//!     Path::new("disk-tuesday.img"),
//!     Path::new("tuesday.diff"),
//!     &opts,
//!     &mut NoProgress,
//! )
//! .unwrap();
//! println!("{:.1}% of blocks reused", stats.dedup_rate());
//!
//! blockdedup::io::restore(
//!     Path::new("disk-monday.img"),
//!     Path::new("tuesday.diff"),
//!     Path::new("tuesday-restored.img"),
//!     &opts,
//!     &mut NoProgress,
//! )
//! .unwrap();
//! ```

pub mod engine;
pub mod error;
pub mod format;
pub mod hash;
pub mod io;
pub mod monitor;
pub mod progress;
pub mod script;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{DedupOptions, DiffStats, RestoreStats};
pub use error::{Error, Result};
pub use hash::HashIndex;
