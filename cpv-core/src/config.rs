use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CpvError, Result};
use crate::hasher::HashAlgorithm;
use crate::reuse::ReuseIndex;

/// What to do when a manifest already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Hash only files the manifest does not record yet. Recorded entries are
    /// kept as-is, so content changes to recorded files go unnoticed.
    #[default]
    Append,
    /// Hash every file and replace the manifest.
    Rehash,
}

/// Settings loaded from `config.toml`; every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CpvConfig {
    /// Digest for new manifests. Unset means an existing manifest keeps its
    /// own digest and new ones use BLAKE3.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<HashAlgorithm>,
    /// Make `cpv checksum` write a fresh manifest instead of appending.
    pub rehash: bool,
    /// Delete `.DS_Store` and `._*` files before enumerating.
    pub clean_sidecars: bool,
    /// Globs matched against `/`-separated relative paths; matches are not hashed.
    pub exclude: Vec<String>,
}

impl Default for CpvConfig {
    fn default() -> Self {
        Self { algorithm: None, rehash: false, clean_sidecars: true, exclude: Vec::new() }
    }
}

impl CpvConfig {
    pub fn build_options(&self) -> Result<BuildOptions> {
        let mut b = GlobSetBuilder::new();
        for g in &self.exclude {
            b.add(Glob::new(g)?);
        }
        Ok(BuildOptions {
            algorithm: self.algorithm,
            mode: if self.rehash { BuildMode::Rehash } else { BuildMode::Append },
            clean_sidecars: self.clean_sidecars,
            exclude: b.build()?,
            reuse: None,
        })
    }
}

/// Resolved options for one manifest build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Requested digest; `None` defers to an existing manifest.
    pub algorithm: Option<HashAlgorithm>,
    pub mode: BuildMode,
    pub clean_sidecars: bool,
    pub exclude: GlobSet,
    /// Checksums from another manifest to take instead of hashing.
    pub reuse: Option<Arc<ReuseIndex>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            algorithm: None,
            mode: BuildMode::default(),
            clean_sidecars: true,
            exclude: GlobSet::empty(),
            reuse: None,
        }
    }
}

impl BuildOptions {
    pub fn with_mode(&self, mode: BuildMode) -> Self {
        Self { mode, ..self.clone() }
    }

    pub fn with_algorithm(&self, algorithm: HashAlgorithm) -> Self {
        Self { algorithm: Some(algorithm), ..self.clone() }
    }

    /// Options for a target manifest: every file hashed with `algorithm`,
    /// nothing taken on trust from another manifest.
    pub fn for_target(&self, algorithm: HashAlgorithm) -> Self {
        Self { algorithm: Some(algorithm), mode: BuildMode::Rehash, reuse: None, ..self.clone() }
    }
}

/// `<config dir>/cpv/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cpv").join("config.toml"))
}

pub fn load_from(path: &Path) -> Result<CpvConfig> {
    let config_err = |reason: String| CpvError::Config { path: path.to_path_buf(), reason };
    let data = fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
    toml::from_str(&data).map_err(|e| config_err(e.to_string()))
}

/// Load an explicit config file, else the default location if present, else
/// built-in defaults. Nothing is written to disk.
pub fn load(explicit: Option<&Path>) -> Result<CpvConfig> {
    if let Some(p) = explicit {
        return load_from(p);
    }
    match default_config_path() {
        Some(p) if p.is_file() => {
            tracing::debug!(path = %p.display(), "loading config");
            load_from(&p)
        }
        _ => Ok(CpvConfig::default()),
    }
}
