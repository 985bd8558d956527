use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::Result;
use crate::manifest::{LineSyntax, Manifest, ManifestEntry};

/// Entries of `a` with no exact (checksum and path) counterpart in `b`,
/// sorted and deduplicated. A path whose checksum changed is reported.
pub fn diff(a: &Manifest, b: &Manifest) -> Vec<ManifestEntry> {
    let left: BTreeSet<&ManifestEntry> = a.entries.iter().collect();
    let right: BTreeSet<&ManifestEntry> = b.entries.iter().collect();
    left.difference(&right).map(|e| (*e).clone()).collect()
}

/// Diff two manifest files and write the result to `out` (empty file when
/// nothing differs). Either input missing is `MissingManifest`. `syntax`
/// applies to both inputs; the report is always written in cpv's own form.
pub fn diff_files(
    a: &Path,
    b: &Path,
    out: &Path,
    syntax: LineSyntax,
) -> Result<Vec<ManifestEntry>> {
    let left = Manifest::read_with(a, syntax)?;
    let right = Manifest::read_with(b, syntax)?;
    let entries = diff(&left, &right);
    Manifest { entries: entries.clone() }.write(out)?;
    tracing::info!(
        report = %out.display(),
        differences = entries.len(),
        "diff report written"
    );
    Ok(entries)
}

/// Per-path view of two manifests.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Paths with identical checksums on both sides.
    pub matched: usize,
    /// Paths on both sides whose checksums differ.
    pub changed: Vec<String>,
    /// Paths only in the source manifest.
    pub missing: Vec<String>,
    /// Paths only in the target manifest. An empty diff report does not rule these out.
    pub unexpected: Vec<String>,
}

impl DiffSummary {
    pub fn is_clean(&self) -> bool {
        self.changed.is_empty() && self.missing.is_empty()
    }
}

pub fn summarize(source: &Manifest, target: &Manifest) -> DiffSummary {
    let src: BTreeMap<&str, &str> =
        source.entries.iter().map(|e| (e.path.as_str(), e.checksum.as_str())).collect();
    let dst: BTreeMap<&str, &str> =
        target.entries.iter().map(|e| (e.path.as_str(), e.checksum.as_str())).collect();

    let mut summary = DiffSummary::default();
    for (path, sum) in &src {
        match dst.get(path) {
            Some(other) if other == sum => summary.matched += 1,
            Some(_) => summary.changed.push((*path).to_string()),
            None => summary.missing.push((*path).to_string()),
        }
    }
    summary.unexpected =
        dst.keys().filter(|p| !src.contains_key(*p)).map(|p| (*p).to_string()).collect();
    summary
}
