use std::fs;
use std::path::{Path, PathBuf};

use crate::builder;
use crate::config::BuildOptions;
use crate::diff::{self, DiffSummary};
use crate::error::{CpvError, Result};
use crate::manifest::{
    Manifest, ManifestEntry, DIFF_REPORT_NAME, SOURCE_MANIFEST_NAME, TARGET_MANIFEST_NAME,
};
use crate::paths;

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub directory: PathBuf,
    pub report_path: PathBuf,
    /// Source entries without an exact match on disk now.
    pub diff: Vec<ManifestEntry>,
    pub summary: DiffSummary,
}

impl VerifyReport {
    /// Every source entry has a byte-identical counterpart. Extra files in the
    /// target are listed in `summary.unexpected` and do not count.
    pub fn is_clean(&self) -> bool {
        self.diff.is_empty()
    }
}

/// Re-hash `dir` into a fresh target manifest and diff its saved source
/// manifest against it.
///
/// The target is hashed with the digest the source manifest was built with;
/// see [`builder::resolve_algorithm`].
///
/// An existing empty diff report (a clean earlier result) is replaced; a
/// non-empty one is a `ReservedFileConflict` so findings are not overwritten.
pub fn verify(dir: &Path, opts: &BuildOptions) -> Result<VerifyReport> {
    let report_path = dir.join(DIFF_REPORT_NAME);
    check_prior_report(&report_path)?;

    let source_path = dir.join(SOURCE_MANIFEST_NAME);
    if !paths::exists(&source_path) {
        return Err(CpvError::MissingManifest { path: source_path });
    }
    let source = Manifest::read(&source_path)?;
    let algorithm = builder::resolve_algorithm(dir, &source_path, &source, opts.algorithm)?;
    if paths::exists(&report_path) {
        fs::remove_file(&report_path).map_err(|e| CpvError::io(&report_path, e))?;
    }

    let outcome = builder::build(dir, TARGET_MANIFEST_NAME, &opts.for_target(algorithm))?;
    tracing::debug!(?outcome, %algorithm, "target manifest rebuilt");

    finish(dir, report_path)
}

/// Diff `dir`'s source and target manifests into the report and summarize.
pub(crate) fn finish(dir: &Path, report_path: PathBuf) -> Result<VerifyReport> {
    let source_path = dir.join(SOURCE_MANIFEST_NAME);
    let target_path = dir.join(TARGET_MANIFEST_NAME);
    let source = Manifest::read(&source_path)?;
    let target = Manifest::read(&target_path)?;
    let diff = diff::diff(&source, &target);
    Manifest { entries: diff.clone() }.write(&report_path)?;
    let summary = diff::summarize(&source, &target);
    if diff.is_empty() {
        tracing::info!(dir = %dir.display(), matched = summary.matched, "verified");
    } else {
        tracing::warn!(
            dir = %dir.display(),
            differences = diff.len(),
            "verification found differences"
        );
    }
    Ok(VerifyReport { directory: dir.to_path_buf(), report_path, diff, summary })
}

fn check_prior_report(report_path: &Path) -> Result<()> {
    match fs::metadata(report_path) {
        Ok(m) if m.is_file() && m.len() == 0 => {
            tracing::info!(report = %report_path.display(), "replacing clean earlier report");
            Ok(())
        }
        Ok(_) => Err(CpvError::ReservedFileConflict { path: report_path.to_path_buf() }),
        Err(_) if paths::exists(report_path) => {
            Err(CpvError::ReservedFileConflict { path: report_path.to_path_buf() })
        }
        Err(_) => Ok(()),
    }
}

