//! OS metadata housekeeping files (`.DS_Store`, AppleDouble `._*`).

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{CpvError, Result};

pub fn is_sidecar(name: &str) -> bool {
    name == ".DS_Store" || name.starts_with("._")
}

/// Delete every sidecar file under `root`. Destructive; returns how many
/// files were removed.
pub fn clean(root: &Path) -> Result<usize> {
    let mut removed = 0usize;
    for ent in WalkDir::new(root).min_depth(1) {
        let ent = ent?;
        if !ent.file_type().is_file() {
            continue;
        }
        if !ent.file_name().to_str().is_some_and(is_sidecar) {
            continue;
        }
        fs::remove_file(ent.path()).map_err(|e| CpvError::io(ent.path(), e))?;
        tracing::debug!(path = %ent.path().display(), "removed sidecar file");
        removed += 1;
    }
    if removed > 0 {
        tracing::warn!(root = %root.display(), removed, "removed OS metadata sidecar files");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recognizes_sidecars() {
        assert!(is_sidecar(".DS_Store"));
        assert!(is_sidecar("._photo.jpg"));
        assert!(!is_sidecar("photo.jpg"));
        assert!(!is_sidecar(".cpv_source_checksums.txt"));
    }

    #[test]
    fn clean_removes_only_sidecars() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        fs::write(dir.path().join("sub/._a.txt"), b"x").unwrap();
        fs::write(dir.path().join("sub/a.txt"), b"keep").unwrap();

        assert_eq!(clean(dir.path()).unwrap(), 2);
        assert!(!dir.path().join(".DS_Store").exists());
        assert!(!dir.path().join("sub/._a.txt").exists());
        assert!(dir.path().join("sub/a.txt").exists());
    }
}
