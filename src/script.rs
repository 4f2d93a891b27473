// Companion restore script.
//
// After a dedup run the CLI can drop a small shell script next to the diff
// that records the exact paths and block size needed to restore the child.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Everything needed to replay a restore.
#[derive(Debug, Clone)]
pub struct RestoreScript {
    /// Program to invoke (usually the running executable).
    pub program: PathBuf,
    pub base: PathBuf,
    /// Where the restored child should be written.
    pub child: PathBuf,
    pub diff: PathBuf,
    pub block_size: usize,
}

impl RestoreScript {
    /// Render as a POSIX `sh` script.
    ///
    /// Fails if any path contains a control character, which cannot be
    /// carried on a single script line.
    pub fn render(&self) -> Result<String> {
        Ok(format!(
            "#!/bin/sh\n\
             # generated by blockdedup dedup; rebuilds the child from its base and diff\n\
             exec {program} restore --block-size {bs} {base} {child} {diff}\n",
            program = sh_quote(&self.program)?,
            bs = self.block_size,
            base = sh_quote(&self.base)?,
            child = sh_quote(&self.child)?,
            diff = sh_quote(&self.diff)?,
        ))
    }
}

/// Write `script` to `path`, executable on Unix.
pub fn write_restore_script(path: &Path, script: &RestoreScript) -> Result<()> {
    let text = script.render()?;
    let mut tmp = crate::io::temp_sibling(path)?;
    tmp.write_all(text.as_bytes())?;
    tmp.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o755))?;
    }
    crate::io::persist(tmp, path)?;
    Ok(())
}

/// Single-quote `path` for `sh`, escaping embedded quotes as `'\''`.
fn sh_quote(path: &Path) -> Result<String> {
    let s = path.to_string_lossy();
    if s.chars().any(char::is_control) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path {s:?} contains control characters"),
        )
        .into());
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    Ok(out)
}
