//! Where help text comes from.
//!
//! [`ProcessHelpSource`] runs the wrapped program; [`MapHelpSource`] serves
//! canned pages and is what tests use.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::{ConstructionError, Result, path_label};

/// Timeout for one help invocation (milliseconds).
pub const DEFAULT_HELP_TIMEOUT_MS: u64 = 5000;

/// Supplies help pages and the version string of a wrapped program.
pub trait HelpSource: Send + Sync {
    /// Returns the raw `--help` output for the sub-command `path`.
    fn fetch_help(&self, path: &[String]) -> Result<String>;

    /// Returns the program's version string, used as the cache key.
    fn fetch_version(&self) -> Result<String>;
}

/// Runs the wrapped program as a subprocess.
///
/// The program's own directory is prepended to `PATH` so helper binaries
/// installed next to it are found first, and pagers and colour output are
/// disabled.
#[derive(Debug, Clone)]
pub struct ProcessHelpSource {
    program: PathBuf,
    timeout: Duration,
    version_args: Vec<String>,
}

impl ProcessHelpSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_millis(DEFAULT_HELP_TIMEOUT_MS),
            version_args: vec!["version".to_string()],
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments that make the program print its version.
    pub fn with_version_args(mut self, args: Vec<String>) -> Self {
        self.version_args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn search_path(&self) -> Option<OsString> {
        let bin_dir = self.program.parent().filter(|dir| !dir.as_os_str().is_empty())?;
        let mut dirs = vec![bin_dir.to_path_buf()];
        if let Some(existing) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(dirs).ok()
    }

    fn run(&self, args: &[String], label: &str) -> Result<String> {
        let started = Instant::now();
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in default_help_env() {
            command.env(key, value);
        }
        if let Some(path) = self.search_path() {
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(|e| ConstructionError::HelpSource {
            path: label.to_string(),
            message: format!("failed to run {}: {e}", self.program.display()),
        })?;

        // Drain both pipes so a chatty child cannot block on a full buffer.
        let stdout_thread = child.stdout.take().map(drain);
        let stderr_thread = child.stderr.take().map(drain);

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Err(e) => {
                abandon(&mut child);
                return Err(e.into());
            }
            Ok(None) => {
                abandon(&mut child);
                return Err(ConstructionError::HelpSource {
                    path: label.to_string(),
                    message: format!(
                        "{} {} timed out after {} ms",
                        self.program.display(),
                        args.join(" "),
                        self.timeout.as_millis()
                    ),
                });
            }
        };

        let stdout = join_output(stdout_thread);
        let stderr = join_output(stderr_thread);
        debug!(
            command = %self.program.display(),
            args = ?args,
            exit_code = ?status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ran wrapped program"
        );

        if !status.success() {
            return Err(ConstructionError::HelpSource {
                path: label.to_string(),
                message: format!(
                    "{} {} exited with {status}: {}",
                    self.program.display(),
                    args.join(" "),
                    stderr.trim()
                ),
            });
        }
        Ok(stdout)
    }
}

impl HelpSource for ProcessHelpSource {
    fn fetch_help(&self, path: &[String]) -> Result<String> {
        let mut args = path.to_vec();
        args.push("--help".to_string());
        self.run(&args, &path_label(path))
    }

    fn fetch_version(&self) -> Result<String> {
        let output = self.run(&self.version_args, "version")?;
        let version = output.trim();
        if version.is_empty() {
            return Err(ConstructionError::HelpSource {
                path: "version".to_string(),
                message: format!("{} reported an empty version", self.program.display()),
            });
        }
        Ok(version.to_string())
    }
}

fn default_help_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("DISPLAY", ""),
        ("BROWSER", "true"),
        ("TERM", "dumb"),
        ("NO_COLOR", "1"),
        ("PAGER", "cat"),
    ]
}

/// Kills and reaps a child that will not be waited on normally.
fn abandon(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "Failed to kill wrapped program");
    }
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!(error = %e, "Failed to read child output");
        }
        buf
    })
}

fn join_output(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let buf = handle.and_then(|t| t.join().ok()).unwrap_or_default();
    String::from_utf8_lossy(&buf).into_owned()
}

/// In-memory help pages keyed by space-joined path (`""` for the root).
///
/// # Examples
///
/// ```
/// use help_mirror_discovery::{HelpSource, MapHelpSource};
///
/// let source = MapHelpSource::new("v1.0.0").with_page("", "root help");
/// assert_eq!(source.fetch_help(&[]).unwrap(), "root help");
/// assert!(source.fetch_help(&["nope".to_string()]).is_err());
/// assert_eq!(source.fetch_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MapHelpSource {
    version: String,
    pages: BTreeMap<String, String>,
    fetches: AtomicUsize,
}

impl MapHelpSource {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    pub fn with_page(mut self, full_name: &str, text: impl Into<String>) -> Self {
        self.insert(full_name, text);
        self
    }

    pub fn insert(&mut self, full_name: &str, text: impl Into<String>) {
        self.pages.insert(full_name.to_string(), text.into());
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Number of help pages requested so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl HelpSource for MapHelpSource {
    fn fetch_help(&self, path: &[String]) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.pages
            .get(&path.join(" "))
            .cloned()
            .ok_or_else(|| ConstructionError::HelpSource {
                path: path_label(path),
                message: "no help text available".to_string(),
            })
    }

    fn fetch_version(&self) -> Result<String> {
        if self.version.trim().is_empty() {
            return Err(ConstructionError::HelpSource {
                path: "version".to_string(),
                message: "empty version".to_string(),
            });
        }
        Ok(self.version.clone())
    }
}
