//! Snapshot validation.
//!
//! Checks the structural invariants of a [`ModelSnapshot`] before it is
//! trusted as a cache: flag spellings, duplicate flags within one topic, and
//! duplicate sub-command names or aliases within one scope.
//!
//! # Examples
//!
//! ```
//! use help_mirror_core::*;
//!
//! let mut snapshot = ModelSnapshot {
//!     version: "v3.0.0".to_string(),
//!     help_data: TopicSnapshot::default(),
//! };
//! snapshot.help_data.options.push(OptionSnapshot {
//!     flags: vec!["--verbose".to_string(), "-v".to_string()],
//!     description: "Verbose output".to_string(),
//!     value_name: Some("int".to_string()),
//!     persistent: true,
//! });
//! assert!(validate_snapshot(&snapshot).is_empty());
//!
//! // Invalid: short flag missing leading dash
//! snapshot.help_data.options[0].flags[1] = "v".to_string();
//! assert!(!validate_snapshot(&snapshot).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{ModelSnapshot, OptionSnapshot, TopicSnapshot};

/// Snapshot validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Snapshot version string is empty.
    #[error("snapshot version cannot be empty")]
    EmptyVersion,
    /// Short flag is not a dash followed by one character.
    #[error("invalid short flag format: {0}")]
    InvalidShortFlag(String),
    /// Long flag does not start with `--` or is too short.
    #[error("invalid long flag format: {0}")]
    InvalidLongFlag(String),
    /// An option has no spellings.
    #[error("[{0}]: option must define at least one flag")]
    MissingFlagName(String),
    /// Two options of one topic share a spelling.
    #[error("[{topic}]: duplicate flag {flag}")]
    DuplicateFlag { topic: String, flag: String },
    /// A sub-command name or alias is empty or repeated within one scope.
    #[error("[{topic}]: duplicate or empty sub-command name '{name}'")]
    DuplicateSubcommand { topic: String, name: String },
}

/// Validates a whole snapshot. Validation stops at the first problem, so the
/// returned list is either empty or holds exactly one error.
pub fn validate_snapshot(snapshot: &ModelSnapshot) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if snapshot.version.trim().is_empty() {
        errors.push(ValidationError::EmptyVersion);
        return errors;
    }

    let mut path = Vec::new();
    errors.extend(validate_topic(&snapshot.help_data, &mut path));
    errors
}

fn validate_topic(topic: &TopicSnapshot, path: &mut Vec<String>) -> Vec<ValidationError> {
    let mut errors = validate_options(&topic.options, &path.join(" "));
    if !errors.is_empty() {
        return errors;
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for (name, child) in &topic.subcommands {
        let own_alias = child.aliases.iter().filter(|alias| *alias != name);
        for key in std::iter::once(name).chain(own_alias) {
            if key.trim().is_empty() || !seen.insert(key.as_str()) {
                errors.push(ValidationError::DuplicateSubcommand {
                    topic: path.join(" "),
                    name: key.clone(),
                });
                return errors;
            }
        }

        path.push(name.clone());
        errors.extend(validate_topic(child, path));
        path.pop();
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

fn validate_options(options: &[OptionSnapshot], topic: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for option in options {
        if option.flags.is_empty() {
            errors.push(ValidationError::MissingFlagName(topic.to_string()));
            return errors;
        }

        for flag in &option.flags {
            if flag.starts_with("--") {
                if flag.len() < 3 {
                    errors.push(ValidationError::InvalidLongFlag(flag.clone()));
                    return errors;
                }
            } else if !flag.starts_with('-') || flag.chars().count() != 2 {
                errors.push(ValidationError::InvalidShortFlag(flag.clone()));
                return errors;
            }

            if !seen.insert(flag.as_str()) {
                errors.push(ValidationError::DuplicateFlag {
                    topic: topic.to_string(),
                    flag: flag.clone(),
                });
                return errors;
            }
        }
    }

    errors
}
