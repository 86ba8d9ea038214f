//! Version-tagged metadata cache file.
//!
//! The cache is a single JSON [`ModelSnapshot`]. It is only used when its
//! recorded version equals the version the wrapped program reports right
//! now; anything else (missing file, unreadable JSON, failed validation,
//! stale version) is a miss and triggers a rebuild. Writes go through a
//! temporary file in the same directory that is renamed over the target.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use help_mirror_core::{MetadataModel, ModelSnapshot, validate_snapshot};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::builder::{BuildOptions, build_model_with_version};
use crate::error::Result;
use crate::source::HelpSource;

/// File name used next to the wrapped program's install directory.
pub const DEFAULT_CACHE_FILE_NAME: &str = "help_metadata.json";

/// Handle on one cache file.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    path: PathBuf,
}

impl MetadataCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location for a program installed as `<root>/bin/<program>`:
    /// `<root>/help_metadata.json`.
    pub fn default_path_for(program: &Path) -> PathBuf {
        let bin_dir = program.parent().unwrap_or_else(|| Path::new("."));
        bin_dir.join("..").join(DEFAULT_CACHE_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached model if the file is readable, valid and was
    /// written for `version`.
    pub fn load(&self, version: &str) -> Option<MetadataModel> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No metadata cache");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable metadata cache");
                return None;
            }
        };

        let snapshot: ModelSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt metadata cache");
                return None;
            }
        };

        if snapshot.version != version {
            info!(
                path = %self.path.display(),
                cached = %snapshot.version,
                current = %version,
                "Metadata cache is stale"
            );
            return None;
        }

        let errors = validate_snapshot(&snapshot);
        if let Some(first) = errors.first() {
            warn!(path = %self.path.display(), error = %first, "Ignoring invalid metadata cache");
            return None;
        }

        match MetadataModel::from_snapshot(&snapshot) {
            Ok(model) => {
                debug!(
                    path = %self.path.display(),
                    version = %version,
                    topics = model.len(),
                    "Loaded metadata cache"
                );
                Some(model)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring inconsistent metadata cache");
                None
            }
        }
    }

    /// Writes `model` atomically, creating the parent directory if needed.
    pub fn store(&self, model: &MetadataModel) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &model.to_snapshot())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!(path = %self.path.display(), version = %model.version(), "Wrote metadata cache");
        Ok(())
    }

    /// Deletes the cache file. Returns `false` if there was none.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Returns the cached model for the program's current version, or builds it
/// from help text and refreshes the cache.
///
/// A failure to write the cache is logged and otherwise ignored.
pub fn load_or_build(
    source: &dyn HelpSource,
    cache: Option<&MetadataCache>,
    options: &BuildOptions,
) -> Result<MetadataModel> {
    let version = source.fetch_version()?;

    if let Some(model) = cache.and_then(|cache| cache.load(&version)) {
        return Ok(model);
    }

    let model = build_model_with_version(source, version, options)?;
    if let Some(cache) = cache {
        if let Err(e) = cache.store(&model) {
            warn!(path = %cache.path().display(), error = %e, "Failed to write metadata cache");
        }
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_is_beside_bin_dir() {
        let path = MetadataCache::default_path_for(Path::new("/opt/pulumi/bin/pulumi"));
        assert_eq!(path, PathBuf::from("/opt/pulumi/bin/../help_metadata.json"));
    }

    #[test]
    fn test_missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path().join("absent.json"));
        assert!(cache.load("v1").is_none());
        assert!(!cache.clear().unwrap());
    }

    #[test]
    fn test_corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(MetadataCache::new(&path).load("v1").is_none());

        fs::write(&path, r#"{"version": "", "help_data": {}}"#).unwrap();
        assert!(MetadataCache::new(&path).load("").is_none());
    }
}
