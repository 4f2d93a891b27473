// File-level entry points for hashing, diffing and restoring.
//
// Wraps the stream-level engine with buffered file I/O, the hash sidecar
// cache and atomic output files: every output is written to a temporary
// file next to its destination and renamed over it only after it is
// complete, so a failed or interrupted run never leaves a file that looks
// like a valid artifact.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use tempfile::NamedTempFile;

use crate::engine::{self, DedupOptions, DiffStats, RestoreStats};
use crate::error::Result;
use crate::hash::HashIndex;
use crate::hash::cache;
use crate::progress::Progress;

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Atomic output files
// ---------------------------------------------------------------------------

/// Create a temporary file in the directory that will hold `dest`.
pub(crate) fn temp_sibling(dest: &Path) -> io::Result<NamedTempFile> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = match dest.file_name() {
        Some(name) => format!(".{}.", name.to_string_lossy()),
        None => ".blockdedup.".to_string(),
    };
    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".partial")
        .tempfile_in(dir)
}

/// Move a completed temporary file over `dest`.
pub(crate) fn persist(tmp: NamedTempFile, dest: &Path) -> io::Result<()> {
    tmp.persist(dest).map(drop).map_err(|e| e.error)
}

fn buffer_size(opts: &DedupOptions) -> usize {
    BUF_SIZE.max(opts.block_size)
}

// ---------------------------------------------------------------------------
// Hash index
// ---------------------------------------------------------------------------

/// Hash the file at `path`.
///
/// With `hash_out` set, the index is always recomputed and written there.
/// Otherwise the sidecar next to `path` is used when fresh and rewritten
/// when not (unless `opts.use_cache` is off, in which case no sidecar is
/// read or written).
pub fn compute_hash_index(
    path: &Path,
    hash_out: Option<&Path>,
    opts: &DedupOptions,
    progress: &mut dyn Progress,
) -> Result<HashIndex> {
    opts.validate()?;
    match hash_out {
        Some(out) => {
            let index = cache::hash_file(path, opts.block_size, opts.progress_interval, progress)?;
            cache::write(&index, out)?;
            info!("{}: wrote {} hashes to {}", path.display(), index.len(), out.display());
            Ok(index)
        }
        None => load_index(path, opts, progress),
    }
}

fn load_index(path: &Path, opts: &DedupOptions, progress: &mut dyn Progress) -> Result<HashIndex> {
    if opts.use_cache {
        let (index, _status) = cache::load_or_compute_with_interval(
            path,
            opts.block_size,
            opts.progress_interval,
            progress,
        )?;
        Ok(index)
    } else {
        info!("{}: hashing", path.display());
        cache::hash_file(path, opts.block_size, opts.progress_interval, progress)
    }
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

/// Deduplicate `child_path` against `base_path`, writing the diff artifact
/// to `diff_path`.
pub fn diff(
    base_path: &Path,
    child_path: &Path,
    diff_path: &Path,
    opts: &DedupOptions,
    progress: &mut dyn Progress,
) -> Result<DiffStats> {
    opts.validate()?;

    let base_index = load_index(base_path, opts, progress)?;
    let child_index = load_index(child_path, opts, progress)?;

    let mut child = BufReader::with_capacity(buffer_size(opts), File::open(child_path)?);

    let mut tmp = temp_sibling(diff_path)?;
    let stats = {
        let mut out = BufWriter::with_capacity(buffer_size(opts), tmp.as_file_mut());
        let stats = engine::encode(
            &base_index,
            &child_index,
            &mut child,
            &mut out,
            opts,
            progress,
        )?;
        out.flush()?;
        stats
    };
    tmp.as_file().sync_all()?;
    persist(tmp, diff_path)?;

    info!(
        "{}: {} blocks deduplicated, {} new ({:.3}%)",
        diff_path.display(),
        stats.matched,
        stats.new,
        stats.dedup_rate()
    );
    Ok(stats)
}

// ---------------------------------------------------------------------------
// restore
// ---------------------------------------------------------------------------

/// Rebuild the child from `base_path` and the diff artifact at `diff_path`,
/// writing it to `child_path`.
pub fn restore(
    base_path: &Path,
    diff_path: &Path,
    child_path: &Path,
    opts: &DedupOptions,
    progress: &mut dyn Progress,
) -> Result<RestoreStats> {
    opts.validate()?;

    let mut base = BufReader::with_capacity(buffer_size(opts), File::open(base_path)?);
    let mut diff = BufReader::with_capacity(buffer_size(opts), File::open(diff_path)?);

    let mut tmp = temp_sibling(child_path)?;
    let stats = {
        let mut out = BufWriter::with_capacity(buffer_size(opts), tmp.as_file_mut());
        let stats = engine::restore(&mut base, &mut diff, &mut out, opts, progress)?;
        out.flush()?;
        stats
    };
    tmp.as_file().sync_all()?;
    persist(tmp, child_path)?;

    info!(
        "{}: restored {} bytes ({} blocks)",
        child_path.display(),
        stats.output_size,
        stats.blocks
    );
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
