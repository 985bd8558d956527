use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::{BuildMode, BuildOptions};
use crate::error::{CpvError, Result};
use crate::hasher::{self, hash_file, HashAlgorithm};
use crate::manifest::{self, is_reserved, Manifest, ManifestEntry};
use crate::paths::{self, DirState};
use crate::reuse::ReuseIndex;
use crate::sidecar;

/// Recorded files re-hashed while looking for a manifest's digest.
const DETECT_ATTEMPTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    /// This many entries were written (fresh) or appended.
    Written(usize),
    /// Every file is already recorded; the manifest was not touched.
    AlreadyComplete,
}

/// Result of [`build_manifest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Build {
    pub outcome: BuildOutcome,
    /// Digest of every entry in the manifest.
    pub algorithm: HashAlgorithm,
    /// Files whose content matched none of the checksums the reuse index
    /// offered for their name. They are left out so a later run retries them.
    pub rejected: Vec<String>,
}

/// A regular file found under the manifest root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundFile {
    /// Manifest form of the path (see [`paths::relative_path`]).
    pub rel: String,
    /// Path as it exists on disk.
    pub path: PathBuf,
}

/// Regular files under `root` sorted by relative path, minus reserved
/// root-level names and excluded paths. Symlinks are not followed.
pub fn enumerate_files(root: &Path, opts: &BuildOptions) -> Result<Vec<FoundFile>> {
    let mut files = Vec::new();
    for ent in walkdir::WalkDir::new(root).min_depth(1) {
        let ent = ent?;
        let ft = ent.file_type();
        if ft.is_dir() {
            continue;
        }
        if !ft.is_file() {
            tracing::debug!(path = %ent.path().display(), "skipping non-regular file");
            continue;
        }
        let Some(rel) = paths::relative_path(root, ent.path()) else {
            continue;
        };
        if ent.depth() == 1 && is_reserved(&rel) {
            continue;
        }
        if opts.exclude.is_match(&rel) {
            tracing::debug!(path = %rel, "excluded");
            continue;
        }
        files.push(FoundFile { rel, path: ent.into_path() });
    }
    files.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(files)
}

/// Digest `manifest` was built with, found by re-hashing recorded files under
/// `root` until one matches. `None` when no recorded file confirms either
/// digest (all missing or all changed).
pub fn detect_algorithm(root: &Path, manifest: &Manifest) -> Option<HashAlgorithm> {
    let mut tried = 0;
    for e in &manifest.entries {
        if tried == DETECT_ATTEMPTS {
            break;
        }
        let path = root.join(&e.path);
        if !path.is_file() {
            continue;
        }
        tried += 1;
        let found = File::open(&path).and_then(|f| hasher::identify(f, &e.checksum));
        match found {
            Ok(Some(algo)) => return Some(algo),
            Ok(None) => {}
            Err(err) => tracing::debug!(path = %path.display(), error = %err, "unreadable"),
        }
    }
    None
}

/// Digest to use with the existing manifest at `manifest_path`: the one it
/// was built with when that can be confirmed, else `requested`, else the
/// default. Asking for a different digest than the recorded one is an error.
pub fn resolve_algorithm(
    root: &Path,
    manifest_path: &Path,
    manifest: &Manifest,
    requested: Option<HashAlgorithm>,
) -> Result<HashAlgorithm> {
    match (requested, detect_algorithm(root, manifest)) {
        (Some(requested), Some(recorded)) if requested != recorded => {
            Err(CpvError::AlgorithmMismatch {
                path: manifest_path.to_path_buf(),
                recorded,
                requested,
            })
        }
        (Some(algo), _) | (None, Some(algo)) => Ok(algo),
        (None, None) => Ok(HashAlgorithm::default()),
    }
}

/// Build or extend the manifest `root/manifest_name`.
///
/// Destructive: with `opts.clean_sidecars` set, `.DS_Store` and `._*` files
/// are deleted from the whole tree first.
///
/// In [`BuildMode::Append`] an existing manifest is only extended with files
/// it does not list yet, using the digest it was built with; recorded entries
/// are never re-hashed, so edits to already-recorded files are not picked up.
/// Use [`BuildMode::Rehash`] for a fresh manifest.
pub fn build_manifest(root: &Path, manifest_name: &str, opts: &BuildOptions) -> Result<Build> {
    match paths::classify(root) {
        DirState::ExistsNonEmpty => {}
        DirState::ExistsEmpty => {
            return Err(CpvError::InvalidSource {
                path: root.to_path_buf(),
                reason: "directory is empty",
            })
        }
        DirState::Absent => {
            return Err(CpvError::InvalidSource {
                path: root.to_path_buf(),
                reason: "not an existing directory",
            })
        }
    }

    if opts.clean_sidecars {
        sidecar::clean(root)?;
    }

    let mpath = root.join(manifest_name);
    let files = enumerate_files(root, opts)?;
    let reuse = opts.reuse.as_deref();

    if opts.mode == BuildMode::Append && paths::exists(&mpath) {
        let existing = Manifest::read(&mpath)?;
        let algorithm = resolve_algorithm(root, &mpath, &existing, opts.algorithm)?;
        let recorded = existing.paths();
        let new_files: Vec<&FoundFile> =
            files.iter().filter(|f| !recorded.contains(f.rel.as_str())).collect();
        if new_files.is_empty() {
            tracing::info!(
                manifest = %mpath.display(),
                entries = existing.len(),
                "manifest already complete"
            );
            let outcome = BuildOutcome::AlreadyComplete;
            return Ok(Build { outcome, algorithm, rejected: vec![] });
        }
        let (entries, rejected) = hash_all(new_files.into_iter(), algorithm, reuse)?;
        if !entries.is_empty() {
            manifest::append_entries(&mpath, &entries)?;
        }
        tracing::info!(manifest = %mpath.display(), appended = entries.len(), "manifest extended");
        return Ok(Build { outcome: BuildOutcome::Written(entries.len()), algorithm, rejected });
    }

    let algorithm = opts.algorithm.unwrap_or_default();
    let (entries, rejected) = hash_all(files.iter(), algorithm, reuse)?;
    let count = entries.len();
    Manifest { entries }.write(&mpath)?;
    tracing::info!(
        manifest = %mpath.display(),
        entries = count,
        algorithm = %algorithm,
        "manifest written"
    );
    Ok(Build { outcome: BuildOutcome::Written(count), algorithm, rejected })
}

/// [`build_manifest`] for callers that only need the outcome.
pub fn build(root: &Path, manifest_name: &str, opts: &BuildOptions) -> Result<BuildOutcome> {
    build_manifest(root, manifest_name, opts).map(|b| b.outcome)
}

fn hash_all<'a>(
    files: impl Iterator<Item = &'a FoundFile>,
    algorithm: HashAlgorithm,
    reuse: Option<&ReuseIndex>,
) -> Result<(Vec<ManifestEntry>, Vec<String>)> {
    let mut entries = Vec::new();
    let mut rejected = Vec::new();
    // Single-candidate reuse is trusted only after one has hashed equal.
    let mut confirmed = false;
    for f in files {
        let checksum = match reuse.and_then(|r| r.lookup(&f.rel)) {
            Some([known]) if confirmed => {
                tracing::debug!(path = %f.rel, "checksum reused");
                known.clone()
            }
            Some(known) => {
                let sum = hash_one(f, algorithm)?;
                if !known.contains(&sum) {
                    tracing::warn!(path = %f.rel, "matches no reused checksum; not recorded");
                    rejected.push(f.rel.clone());
                    continue;
                }
                confirmed |= known.len() == 1;
                sum
            }
            None => hash_one(f, algorithm)?,
        };
        entries.push(ManifestEntry::new(checksum, f.rel.as_str()));
    }
    Ok((entries, rejected))
}

fn hash_one(f: &FoundFile, algorithm: HashAlgorithm) -> Result<String> {
    let checksum = hash_file(&f.path, algorithm).map_err(|e| CpvError::io(&f.path, e))?;
    tracing::debug!(path = %f.rel, %checksum, "hashed");
    Ok(checksum)
}
