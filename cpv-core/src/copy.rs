//! Recursive tree copy that keeps file content, permissions and
//! modification times.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::{CpvError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub dirs: u64,
    pub symlinks: u64,
    pub bytes: u64,
}

/// Copy the tree at `src` to `dest`, which must not exist yet. On failure the
/// partial copy is left in place.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<CopyStats> {
    if dest.exists() {
        return Err(CpvError::DestinationCollision { path: dest.to_path_buf() });
    }
    let mut stats = CopyStats::default();
    // Directory metadata is applied after their contents are written.
    let mut dirs: Vec<(PathBuf, fs::Metadata)> = Vec::new();

    for ent in WalkDir::new(src) {
        let ent = ent?;
        let rel = ent.path().strip_prefix(src).map_err(|_| {
            let outside = io::Error::new(ErrorKind::InvalidInput, "entry outside source tree");
            CpvError::copy(ent.path(), outside)
        })?;
        let to = dest.join(rel);
        let ft = ent.file_type();
        // A symlinked root is walked through but still reports as a link.
        if ft.is_dir() || ent.depth() == 0 {
            fs::create_dir(&to).map_err(|e| CpvError::copy(&to, e))?;
            let meta = fs::metadata(ent.path()).map_err(|e| CpvError::copy(ent.path(), e))?;
            dirs.push((to, meta));
            stats.dirs += 1;
        } else if ft.is_file() {
            stats.bytes += copy_file(ent.path(), &to)?;
            stats.files += 1;
        } else if ft.is_symlink() {
            if copy_symlink(ent.path(), &to)? {
                stats.symlinks += 1;
            }
        } else {
            tracing::warn!(path = %ent.path().display(), "skipping special file");
        }
    }

    for (dir, meta) in dirs.iter().rev() {
        fs::set_permissions(dir, meta.permissions()).map_err(|e| CpvError::copy(dir, e))?;
        if let Ok(mtime) = meta.modified() {
            set_dir_mtime(dir, mtime);
        }
    }
    tracing::info!(
        src = %src.display(),
        dest = %dest.display(),
        files = stats.files,
        bytes = stats.bytes,
        "tree copied"
    );
    Ok(stats)
}

fn copy_file(from: &Path, to: &Path) -> Result<u64> {
    let meta = fs::metadata(from).map_err(|e| CpvError::copy(from, e))?;
    // fs::copy carries the permission bits over.
    let n = fs::copy(from, to).map_err(|e| CpvError::copy(to, e))?;
    if let Ok(mtime) = meta.modified() {
        set_file_mtime(to, mtime).map_err(|e| CpvError::copy(to, e))?;
    }
    tracing::debug!(path = %to.display(), bytes = n, "copied");
    Ok(n)
}

fn set_file_mtime(path: &Path, mtime: SystemTime) -> io::Result<()> {
    let f = match OpenOptions::new().write(true).open(path) {
        Ok(f) => f,
        // Read-only copies; Unix still lets the owner set times on a read handle.
        Err(e) if e.kind() == ErrorKind::PermissionDenied => File::open(path)?,
        Err(e) => return Err(e),
    };
    f.set_modified(mtime)
}

#[cfg(unix)]
fn set_dir_mtime(dir: &Path, mtime: SystemTime) {
    let res = File::open(dir).and_then(|f| f.set_modified(mtime));
    if let Err(e) = res {
        tracing::warn!(path = %dir.display(), error = %e, "could not preserve directory mtime");
    }
}

#[cfg(not(unix))]
fn set_dir_mtime(dir: &Path, _mtime: SystemTime) {
    tracing::debug!(path = %dir.display(), "directory mtimes are not preserved on this platform");
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<bool> {
    let target = fs::read_link(from).map_err(|e| CpvError::copy(from, e))?;
    std::os::unix::fs::symlink(&target, to).map_err(|e| CpvError::copy(to, e))?;
    Ok(true)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, _to: &Path) -> Result<bool> {
    tracing::warn!(path = %from.display(), "skipping symlink");
    Ok(false)
}
