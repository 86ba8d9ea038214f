//! Configuration for mirroring one wrapped program.
//!
//! # Example YAML
//!
//! ```yaml
//! program: /opt/pulumi/bin/pulumi
//! cache_file: /var/cache/help-mirror/pulumi.json
//! help_timeout_ms: 5000
//! jobs: 4
//! version_args: [version]
//! extra_options:
//!   - topic: ""
//!     flags: ["--raw-pulumi"]
//!     description: Run the wrapped program without rewriting arguments
//!     persistent: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use help_mirror_core::{MetadataModel, OptionDescriptor};
use serde::{Deserialize, Serialize};

use crate::builder::{BuildOptions, DEFAULT_MAX_TOPICS};
use crate::cache::MetadataCache;
use crate::error::Result;
use crate::source::{DEFAULT_HELP_TIMEOUT_MS, ProcessHelpSource};

/// An option the wrapper owns and injects into the model after loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraOption {
    /// Space-joined topic path; empty for the main command.
    #[serde(default)]
    pub topic: String,
    pub flags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    #[serde(default)]
    pub persistent: bool,
}

impl ExtraOption {
    pub fn descriptor(&self) -> OptionDescriptor {
        OptionDescriptor::new(
            self.flags.iter().cloned(),
            self.value_name.as_deref(),
            &self.description,
        )
    }
}

/// Settings for one wrapped program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Path to the wrapped executable.
    pub program: PathBuf,
    /// Cache location; defaults to `help_metadata.json` one level above the
    /// program's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    #[serde(default = "default_help_timeout_ms")]
    pub help_timeout_ms: u64,
    /// Concurrent help fetches during discovery; `1` walks depth-first.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,
    /// Arguments that make the program print its version.
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_options: Vec<ExtraOption>,
}

fn default_help_timeout_ms() -> u64 {
    DEFAULT_HELP_TIMEOUT_MS
}

fn default_jobs() -> usize {
    1
}

fn default_max_topics() -> usize {
    DEFAULT_MAX_TOPICS
}

fn default_version_args() -> Vec<String> {
    vec!["version".to_string()]
}

impl MirrorConfig {
    /// Configuration with defaults for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cache_file: None,
            help_timeout_ms: default_help_timeout_ms(),
            jobs: default_jobs(),
            max_topics: default_max_topics(),
            version_args: default_version_args(),
            extra_options: Vec::new(),
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ConstructionError::Io) if the file cannot be
    /// read, or [`Yaml`](crate::ConstructionError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(|| MetadataCache::default_path_for(&self.program))
    }

    pub fn cache(&self) -> MetadataCache {
        MetadataCache::new(self.cache_path())
    }

    pub fn help_source(&self) -> ProcessHelpSource {
        ProcessHelpSource::new(&self.program)
            .with_timeout(Duration::from_millis(self.help_timeout_ms))
            .with_version_args(self.version_args.clone())
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            jobs: self.jobs,
            max_topics: self.max_topics,
        }
    }

    /// Injects [`extra_options`](Self::extra_options) into `model`.
    pub fn apply_extra_options(&self, model: &mut MetadataModel) -> Result<()> {
        for extra in &self.extra_options {
            model.add_option_by_name(&extra.topic, extra.descriptor(), extra.persistent)?;
        }
        Ok(())
    }
}
