// Hash index sidecar cache.
//
// A file's block hashes are persisted next to it as one lowercase hex
// digest per line, in block order. The sidecar is trusted only while its
// modification time is at least that of the source; otherwise the source
// is rehashed and the sidecar rewritten.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;

use log::{debug, info, warn};

use super::config::{DEFAULT_PROGRESS_INTERVAL, cache_path};
use super::digest::BlockHash;
use super::index::HashIndex;
use crate::error::{Error, Result};
use crate::progress::Progress;

const BUF_SIZE: usize = 64 * 1024;

/// How `load_or_compute` obtained its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Loaded from an up-to-date sidecar.
    Fresh,
    /// No sidecar existed; the source was hashed and a sidecar written.
    Created,
    /// The sidecar was older than the source; rehashed and overwritten.
    Refreshed,
}

/// Load the hash index of `path` from its sidecar, or hash the file and
/// write the sidecar.
pub fn load_or_compute(
    path: &Path,
    block_size: usize,
    progress: &mut dyn Progress,
) -> Result<(HashIndex, CacheStatus)> {
    load_or_compute_with_interval(path, block_size, DEFAULT_PROGRESS_INTERVAL, progress)
}

/// Like [`load_or_compute`] with an explicit progress cadence.
pub fn load_or_compute_with_interval(
    path: &Path,
    block_size: usize,
    interval: u64,
    progress: &mut dyn Progress,
) -> Result<(HashIndex, CacheStatus)> {
    let sidecar = cache_path(path, block_size);
    let source_mtime = fs::metadata(path)?.modified()?;

    let status = match modified_if_exists(&sidecar)? {
        Some(cache_mtime) if cache_mtime >= source_mtime => {
            info!("{}: reading hashes from {}", path.display(), sidecar.display());
            return Ok((read(&sidecar)?, CacheStatus::Fresh));
        }
        Some(_) => {
            warn!("{}: stale hash cache, rehashing", sidecar.display());
            CacheStatus::Refreshed
        }
        None => CacheStatus::Created,
    };

    info!("{}: hashing", path.display());
    let index = hash_file(path, block_size, interval, progress)?;

    // A source rewritten while it was being hashed would leave a sidecar
    // that looks newer than content it does not describe.
    if fs::metadata(path)?.modified()? != source_mtime {
        warn!(
            "{}: modified while hashing, not writing {}",
            path.display(),
            sidecar.display()
        );
        return Ok((index, status));
    }

    write(&index, &sidecar)?;
    debug!("{}: wrote {} hashes", sidecar.display(), index.len());
    Ok((index, status))
}

/// Hash the file at `path` without consulting any sidecar.
pub fn hash_file(
    path: &Path,
    block_size: usize,
    interval: u64,
    progress: &mut dyn Progress,
) -> Result<HashIndex> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(BUF_SIZE.max(block_size), file);
    HashIndex::compute_with_interval(&mut reader, block_size, interval, progress)
}

/// Whether a sidecar at `cache` may be trusted for `source`.
pub fn is_fresh(source: &Path, cache: &Path) -> Result<bool> {
    let source_mtime = fs::metadata(source)?.modified()?;
    Ok(modified_if_exists(cache)?.is_some_and(|m| m >= source_mtime))
}

/// Parse a sidecar. An empty file is an empty index; any line that is not
/// a 64-digit hex hash is fatal.
pub fn read(cache: &Path) -> Result<HashIndex> {
    let reader = BufReader::with_capacity(BUF_SIZE, File::open(cache)?);
    let mut index = HashIndex::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.strip_suffix('\r').unwrap_or(&line);
        let hash = BlockHash::from_hex(text).ok_or_else(|| Error::CacheParse {
            path: cache.to_path_buf(),
            line: n + 1,
            value: text.to_string(),
        })?;
        index.push(hash);
    }
    Ok(index)
}

/// Write `index` to `cache`, replacing any existing file only once the new
/// contents are complete.
pub fn write(index: &HashIndex, cache: &Path) -> Result<()> {
    let mut tmp = crate::io::temp_sibling(cache)?;
    {
        let mut w = BufWriter::with_capacity(BUF_SIZE, tmp.as_file_mut());
        for hash in index.hashes() {
            w.write_all(hash.to_hex().as_bytes())?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
    }
    crate::io::persist(tmp, cache)?;
    Ok(())
}

fn modified_if_exists(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.modified().map(Some),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::time::Duration;
    use tempfile::tempdir;

    fn set_mtime(path: &Path, t: SystemTime) {
        let f = File::options().write(true).open(path).unwrap();
        f.set_modified(t).unwrap();
    }

    #[test]
    fn sidecar_text_layout() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("x.dh1");
        let idx = HashIndex::from_hashes([BlockHash::of(b"AAAA"), BlockHash::of(b"BBBB")]);
        write(&idx, &cache).unwrap();

        let text = fs::read_to_string(&cache).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], BlockHash::of(b"AAAA").to_hex());
        assert!(text.ends_with('\n'));
        assert_eq!(read(&cache).unwrap(), idx);
    }

    #[test]
    fn empty_sidecar_is_empty_index() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("empty.dh1");
        fs::write(&cache, b"").unwrap();
        assert!(read(&cache).unwrap().is_empty());
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("crlf.dh1");
        let h = BlockHash::of(b"zz");
        fs::write(&cache, format!("{h}\r\n{h}\r\n")).unwrap();
        let idx = read(&cache).unwrap();
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.first_index(&h), Some(0));
    }

    #[test]
    fn corrupt_line_reports_position() {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("bad.dh1");
        let h = BlockHash::of(b"ok");
        fs::write(&cache, format!("{h}\nnot-a-hash\n{h}\n")).unwrap();
        match read(&cache).unwrap_err() {
            Error::CacheParse { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "not-a-hash");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn freshness_follows_mtimes() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let cache = dir.path().join("src.bin.dh1");
        fs::write(&src, b"data").unwrap();
        assert!(!is_fresh(&src, &cache).unwrap());

        fs::write(&cache, b"").unwrap();
        let now = SystemTime::now();
        set_mtime(&src, now);
        set_mtime(&cache, now);
        assert!(is_fresh(&src, &cache).unwrap());

        set_mtime(&src, now + Duration::from_secs(5));
        assert!(!is_fresh(&src, &cache).unwrap());
    }

    #[test]
    fn statuses_progress_from_created_to_fresh_to_refreshed() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("file.bin");
        fs::write(&src, b"AAAABBBB").unwrap();

        let (first, status) = load_or_compute(&src, 4, &mut NoProgress).unwrap();
        assert_eq!(status, CacheStatus::Created);
        assert!(cache_path(&src, 4).exists());

        let (second, status) = load_or_compute(&src, 4, &mut NoProgress).unwrap();
        assert_eq!(status, CacheStatus::Fresh);
        assert_eq!(first, second);

        fs::write(&src, b"AAAACCCC").unwrap();
        let later = fs::metadata(cache_path(&src, 4)).unwrap().modified().unwrap()
            + Duration::from_secs(10);
        set_mtime(&src, later);
        let (third, status) = load_or_compute(&src, 4, &mut NoProgress).unwrap();
        assert_eq!(status, CacheStatus::Refreshed);
        assert_eq!(third.hashes()[1], BlockHash::of(b"CCCC"));
    }

    #[test]
    fn missing_source_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_or_compute(&dir.path().join("nope"), 4, &mut NoProgress).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
