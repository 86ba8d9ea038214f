//! Error type for building a metadata model from a wrapped program.

use help_mirror_core::ModelError;
use thiserror::Error;

/// Fatal failure while constructing a [`MetadataModel`](help_mirror_core::MetadataModel).
///
/// There is no degraded mode: any of these aborts the build, since a partial
/// model would misclassify flags later.
#[derive(Debug, Error)]
pub enum ConstructionError {
    /// A help page does not follow the expected section grammar.
    #[error("[{path}]: error in help line {line} ({text:?}): {reason}")]
    MalformedHelp {
        path: String,
        line: usize,
        text: String,
        reason: String,
    },

    /// Running the wrapped program failed, timed out or exited non-zero.
    #[error("[{path}]: {message}")]
    HelpSource { path: String, message: String },

    /// Discovery visited more topics than allowed.
    #[error("sub-command discovery exceeded the budget of {0} topics")]
    TopicBudgetExceeded(usize),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ConstructionError>;

/// Readable form of a sub-command path for diagnostics.
pub(crate) fn path_label(path: &[String]) -> String {
    if path.is_empty() {
        "<main command>".to_string()
    } else {
        path.join(" ")
    }
}
