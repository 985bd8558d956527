use std::fs;
use std::path::{Path, PathBuf};

use crate::builder::{self, BuildOutcome};
use crate::config::BuildOptions;
use crate::copy::{self, CopyStats};
use crate::error::{CpvError, Result};
use crate::hasher::HashAlgorithm;
use crate::manifest::{DIFF_REPORT_NAME, SOURCE_MANIFEST_NAME, TARGET_MANIFEST_NAME};
use crate::paths::{self, DirState};
use crate::verify::{self, VerifyReport};

/// Progress of a copy-verify run, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    SourceValidated,
    TargetValidated,
    NoCollision,
    NoDiffConflict,
    SourceChecksummed,
    Copied,
    TargetChecksummed,
    Diffed,
    Done,
}

#[derive(Debug, Clone)]
pub struct CopyVerifyReport {
    pub destination: PathBuf,
    pub source_manifest: BuildOutcome,
    /// Digest of both manifests.
    pub algorithm: HashAlgorithm,
    pub copied: CopyStats,
    pub verify: VerifyReport,
    pub stage: Stage,
}

struct Run<'a> {
    source: &'a Path,
    target: &'a Path,
    stage: Stage,
}

impl Run<'_> {
    fn advance(&mut self, next: Stage) {
        tracing::info!(
            stage = ?next,
            source = %self.source.display(),
            target = %self.target.display(),
            "copy-verify"
        );
        self.stage = next;
    }
}

/// Copy `source` into `target/<source name>`, then checksum both sides and
/// write the diff report into the destination.
///
/// All guards run before anything is written. After the copy starts nothing
/// is rolled back. The source may already hold a manifest from
/// `builder::build`; it is extended, not replaced, unless `opts` says rehash.
pub fn copy_verify(source: &Path, target: &Path, opts: &BuildOptions) -> Result<CopyVerifyReport> {
    let mut run = Run { source, target, stage: Stage::Init };

    if paths::classify(source) != DirState::ExistsNonEmpty {
        return Err(CpvError::InvalidSource {
            path: source.to_path_buf(),
            reason: "must be an existing, non-empty directory",
        });
    }
    let source_abs = fs::canonicalize(source).map_err(|e| CpvError::io(source, e))?;
    // Named as given: a symlinked source keeps the link's name.
    let Some(name) = paths::lexical_name(source) else {
        return Err(CpvError::InvalidSource {
            path: source.to_path_buf(),
            reason: "has no directory name",
        });
    };
    run.advance(Stage::SourceValidated);

    if paths::classify(target) == DirState::Absent {
        return Err(CpvError::InvalidTarget {
            path: target.to_path_buf(),
            reason: "not an existing directory",
        });
    }
    if paths::is_within(target, &source_abs) {
        return Err(CpvError::InvalidTarget {
            path: target.to_path_buf(),
            reason: "lies inside the source",
        });
    }
    run.advance(Stage::TargetValidated);

    let dest = target.join(name);
    if paths::exists(&dest) {
        return Err(CpvError::DestinationCollision { path: dest });
    }
    run.advance(Stage::NoCollision);

    let conflict = source.join(DIFF_REPORT_NAME);
    if paths::exists(&conflict) {
        return Err(CpvError::ReservedFileConflict { path: conflict });
    }
    run.advance(Stage::NoDiffConflict);

    let built = builder::build_manifest(source, SOURCE_MANIFEST_NAME, opts)?;
    if !built.rejected.is_empty() {
        tracing::warn!(files = built.rejected.len(), "source manifest is missing rejected files");
    }
    run.advance(Stage::SourceChecksummed);

    let copied = copy::copy_tree(source, &dest)?;
    run.advance(Stage::Copied);

    builder::build(&dest, TARGET_MANIFEST_NAME, &opts.for_target(built.algorithm))?;
    run.advance(Stage::TargetChecksummed);

    let verify = verify::finish(&dest, dest.join(DIFF_REPORT_NAME))?;
    run.advance(Stage::Diffed);
    run.advance(Stage::Done);

    Ok(CopyVerifyReport {
        destination: dest,
        source_manifest: built.outcome,
        algorithm: built.algorithm,
        copied,
        verify,
        stage: run.stage,
    })
}
