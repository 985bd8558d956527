//! Error taxonomy for cpv operations.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::hasher::HashAlgorithm;

/// Errors that can occur while building manifests, copying, or verifying.
///
/// "Manifest already complete" is not an error; see
/// [`BuildOutcome::AlreadyComplete`](crate::builder::BuildOutcome).
#[derive(Error, Debug)]
pub enum CpvError {
    /// Source directory is missing, not a directory, or empty.
    #[error("invalid source {}: {reason}", path.display())]
    InvalidSource { path: PathBuf, reason: &'static str },

    /// Target directory is missing or unusable.
    #[error("invalid target {}: {reason}", path.display())]
    InvalidTarget { path: PathBuf, reason: &'static str },

    /// The copy destination already exists; copy-verify never merges.
    #[error("destination already exists: {}", path.display())]
    DestinationCollision { path: PathBuf },

    /// A reserved manifest/report file is in the way.
    #[error("reserved file already present: {}", path.display())]
    ReservedFileConflict { path: PathBuf },

    /// A manifest that must exist does not.
    #[error("manifest not found: {}", path.display())]
    MissingManifest { path: PathBuf },

    /// The tree copy failed part way; nothing is rolled back.
    #[error("copy failed at {}", path.display())]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A manifest line could not be parsed.
    #[error("{}:{line}: {reason}", path.display())]
    MalformedManifest { path: PathBuf, line: usize, reason: String },

    /// I/O error on a specific path.
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Invalid exclude pattern.
    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// The requested digest differs from the one an existing manifest was
    /// built with.
    #[error("{} was built with {recorded}, not {requested}", path.display())]
    AlgorithmMismatch { path: PathBuf, recorded: HashAlgorithm, requested: HashAlgorithm },

    /// Configuration file could not be read or parsed.
    #[error("config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

impl CpvError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        CpvError::Io { path: path.to_path_buf(), source }
    }

    pub(crate) fn copy(path: &Path, source: io::Error) -> Self {
        CpvError::CopyFailed { path: path.to_path_buf(), source }
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            CpvError::InvalidSource { .. } => 10,
            CpvError::InvalidTarget { .. } => 11,
            CpvError::DestinationCollision { .. } => 12,
            CpvError::ReservedFileConflict { .. } => 13,
            CpvError::MissingManifest { .. } => 14,
            CpvError::CopyFailed { .. } => 15,
            CpvError::MalformedManifest { .. }
            | CpvError::Io { .. }
            | CpvError::Walk(_)
            | CpvError::Pattern(_)
            | CpvError::AlgorithmMismatch { .. }
            | CpvError::Config { .. } => 2,
        }
    }
}

/// Result type for cpv operations.
pub type Result<T> = std::result::Result<T, CpvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_category() {
        let p = PathBuf::from("x");
        let codes = [
            CpvError::InvalidSource { path: p.clone(), reason: "empty" }.exit_code(),
            CpvError::InvalidTarget { path: p.clone(), reason: "missing" }.exit_code(),
            CpvError::DestinationCollision { path: p.clone() }.exit_code(),
            CpvError::ReservedFileConflict { path: p.clone() }.exit_code(),
            CpvError::MissingManifest { path: p.clone() }.exit_code(),
            CpvError::copy(&p, io::Error::other("boom")).exit_code(),
        ];
        let mut dedup = codes.to_vec();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), codes.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn display_includes_path_and_reason() {
        let err = CpvError::InvalidSource {
            path: PathBuf::from("/data/src"),
            reason: "directory is empty",
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/src"));
        assert!(msg.contains("directory is empty"));
    }

    #[test]
    fn algorithm_mismatch_names_both_digests() {
        let err = CpvError::AlgorithmMismatch {
            path: PathBuf::from("m.txt"),
            recorded: HashAlgorithm::Sha256,
            requested: HashAlgorithm::Blake3,
        };
        assert_eq!(err.to_string(), "m.txt was built with sha256, not blake3");
        assert_eq!(err.exit_code(), 2);
    }
}
