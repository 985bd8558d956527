//! Checksums borrowed from another manifest (sha256sum output, a TeraCopy
//! file, an older cpv manifest) so already-known files are not hashed again.
//!
//! Entries are matched by file name only, since the foreign manifest may
//! have been made from a different root. A name with one known checksum is
//! taken as is once the first such file has been confirmed by hashing;
//! that confirms the other manifest uses the same digest. A name listed
//! with several checksums is always hashed and must match one of them.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::manifest::{LineSyntax, Manifest};

#[derive(Debug, Clone, Default)]
pub struct ReuseIndex {
    by_name: HashMap<String, Vec<String>>,
}

impl ReuseIndex {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
        for e in &manifest.entries {
            let name = file_name(&e.path);
            let sums = by_name.entry(name.to_string()).or_default();
            if !sums.contains(&e.checksum) {
                sums.push(e.checksum.clone());
            }
        }
        Self { by_name }
    }

    /// Read a foreign manifest leniently.
    pub fn read(path: &Path) -> Result<Self> {
        let manifest = Manifest::read_with(path, LineSyntax::Lenient)?;
        tracing::info!(path = %path.display(), entries = manifest.len(), "loaded reuse manifest");
        Ok(Self::from_manifest(&manifest))
    }

    /// Known checksums for the file name of `rel`.
    pub fn lookup(&self, rel: &str) -> Option<&[String]> {
        self.by_name.get(file_name(rel)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
