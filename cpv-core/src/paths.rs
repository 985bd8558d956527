use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Component, Path};
use unicode_normalization::UnicodeNormalization;

/// What a would-be directory path currently looks like on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirState {
    /// Missing, or present but not a directory.
    Absent,
    ExistsEmpty,
    ExistsNonEmpty,
}

/// Classify `path` as a directory. No side effects; an unreadable directory
/// reports as `ExistsEmpty` since nothing in it can be enumerated.
pub fn classify(path: &Path) -> DirState {
    match fs::metadata(path) {
        Ok(m) if m.is_dir() => match fs::read_dir(path) {
            Ok(mut it) => {
                if it.next().is_some() {
                    DirState::ExistsNonEmpty
                } else {
                    DirState::ExistsEmpty
                }
            }
            Err(_) => DirState::ExistsEmpty,
        },
        _ => DirState::Absent,
    }
}

/// True if anything (file, dir, dangling symlink) occupies `path`.
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Render `path` relative to `root` the way manifests store it:
/// `/`-separated, NFC-normalized, no leading `./`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = pathdiff::diff_paths(path, root)?;
    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(s) => parts.push(s.to_string_lossy().nfc().collect::<String>()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Last component of `path` once `.` and `..` are folded lexically. Symlinks
/// are not resolved, so `link/` names `link` even when it points elsewhere.
/// Relative paths are anchored at the working directory first.
pub fn lexical_name(path: &Path) -> Option<OsString> {
    let anchored;
    let path = if path.is_absolute() {
        path
    } else {
        anchored = std::env::current_dir().ok()?.join(path);
        anchored.as_path()
    };
    let mut parts: Vec<&OsStr> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(s) => parts.push(s),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    parts.last().map(|s| s.to_os_string())
}

/// True when `child` resolves to `parent` or somewhere beneath it.
pub fn is_within(child: &Path, parent: &Path) -> bool {
    match (fs::canonicalize(child), fs::canonicalize(parent)) {
        (Ok(c), Ok(p)) => c.starts_with(p),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn classify_states() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        File::create(dir.path().join("file.txt")).unwrap();

        assert_eq!(classify(&empty), DirState::ExistsEmpty);
        assert_eq!(classify(dir.path()), DirState::ExistsNonEmpty);
        assert_eq!(classify(&dir.path().join("nope")), DirState::Absent);
        assert_eq!(classify(&dir.path().join("file.txt")), DirState::Absent);
    }

    #[test]
    fn exists_sees_files_and_dirs() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("f")).unwrap();
        assert!(exists(&dir.path().join("f")));
        assert!(exists(dir.path()));
        assert!(!exists(&dir.path().join("g")));
    }

    #[test]
    fn relative_path_uses_forward_slashes() {
        let root = Path::new("/data/root");
        let p = root.join("sub").join("deep").join("file.bin");
        assert_eq!(relative_path(root, &p).as_deref(), Some("sub/deep/file.bin"));
        assert_eq!(relative_path(root, root), None);
        assert_eq!(relative_path(root, Path::new("/data/other/x")), None);
    }

    #[test]
    fn relative_path_normalizes_to_nfc() {
        let root = Path::new("/r");
        // "e" + combining acute accent (NFD) becomes precomposed U+00E9.
        let p = root.join("cafe\u{301}.txt");
        assert_eq!(relative_path(root, &p).as_deref(), Some("caf\u{e9}.txt"));
    }

    #[test]
    fn lexical_name_folds_dots_only() {
        assert_eq!(lexical_name(Path::new("/data/photos")), Some("photos".into()));
        assert_eq!(lexical_name(Path::new("/data/photos/.")), Some("photos".into()));
        assert_eq!(lexical_name(Path::new("/data/photos/raw/..")), Some("photos".into()));
        assert_eq!(lexical_name(Path::new("/")), None);
    }

    #[cfg(unix)]
    #[test]
    fn lexical_name_keeps_symlink_name() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();
        assert_eq!(lexical_name(&dir.path().join("link")), Some("link".into()));
    }

    #[test]
    fn is_within_detects_nesting() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("a").join("b");
        fs::create_dir_all(&inner).unwrap();
        assert!(is_within(&inner, dir.path()));
        assert!(is_within(dir.path(), dir.path()));
        assert!(!is_within(dir.path(), &inner));
    }
}
