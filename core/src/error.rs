//! Error types for model construction and command parsing.
//!
//! [`ModelError`] covers structural problems found while assembling a
//! [`MetadataModel`](crate::MetadataModel). [`CommandError`] covers failures
//! while classifying or rewriting one invocation.

use thiserror::Error;

/// Structural failure while assembling or customising a topic tree.
///
/// All variants are fatal for the model being built: a partially attributed
/// tree would misclassify flags later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A topic path was added before its parent.
    #[error("topic '{0}' has no parent topic")]
    OrphanTopic(String),

    /// The same topic path was added twice.
    #[error("topic '{0}' is defined more than once")]
    DuplicateTopic(String),

    /// Two children (or a child and an alias) of one topic share a name.
    #[error("[{topic}]: sub-command name '{name}' is defined more than once")]
    DuplicateSubcommand { topic: String, name: String },

    /// One topic declares the same flag spelling with different meanings.
    #[error("[{topic}]: flag '{flag}' is declared more than once with different definitions")]
    ConflictingOption { topic: String, flag: String },

    /// Children of one topic report incompatible inherited definitions for
    /// a flag that is attributed to that topic.
    #[error(
        "[{topic}]: inherited flag '{flag}' has conflicting definitions in sub-commands: {}",
        sources.join(", ")
    )]
    ConflictingPersistentOption {
        topic: String,
        flag: String,
        sources: Vec<String>,
    },

    /// An option descriptor without any flag spelling.
    #[error("[{0}]: option has no flag spellings")]
    EmptyOption(String),

    /// A lookup by full topic name failed.
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),
}

/// Failure while classifying, resolving or rewriting an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A flag matches behaviourally distinct options in several
    /// descendant sub-commands.
    #[error(
        "option '{flag}' is ambiguous under '{topic}'; it has different meanings in: {}",
        paths.join(", ")
    )]
    AmbiguousOption {
        flag: String,
        topic: String,
        paths: Vec<String>,
    },

    /// A flag matches nothing and strict resolution was requested.
    #[error("unknown option '{flag}' for '{topic}'")]
    UnknownOption { flag: String, topic: String },

    /// The token stream cannot be a valid invocation.
    #[error("malformed command line: {0}")]
    MalformedInvocation(String),
}

/// Displays a space-joined topic path, using a readable placeholder for the
/// root topic.
pub(crate) fn display_path(full_name: &str) -> String {
    if full_name.is_empty() {
        "<main command>".to_string()
    } else {
        full_name.to_string()
    }
}
