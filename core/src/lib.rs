//! Command metadata model and command-line rewriting for wrapped CLIs.
//!
//! This crate models a multi-level, cobra-style program whose grammar is
//! only known from its `--help` output:
//!
//! - [`OptionDescriptor`]: one flag with its synonym spellings and arity.
//! - [`TopicNode`]: one sub-command level, with declared and persistent
//!   (inherited) options.
//! - [`MetadataModel`]: the rooted topic tree, assembled by
//!   [`ModelBuilder`] from per-level [`TopicDraft`]s, and its cache form
//!   [`ModelSnapshot`].
//! - [`OptionResolver`]: maps a flag spelling to a descriptor at a topic,
//!   searching descendants when needed.
//! - [`ParsedCommand`]: a classified invocation that can be queried and
//!   rewritten.
//!
//! Nothing here performs I/O; fetching help text and caching live in
//! `help-mirror-discovery`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use help_mirror_core::*;
//!
//! let mut builder = ModelBuilder::new("v3.100.0");
//! builder.add_topic(Vec::<String>::new(), TopicDraft::default()).unwrap();
//! builder.add_topic(["up"], TopicDraft {
//!     aliases: vec!["update".to_string()],
//!     options: vec![DeclaredOption::local(OptionDescriptor::boolean(["--yes", "-y"], "Approve"))],
//!     ..Default::default()
//! }).unwrap();
//! let model = Arc::new(builder.build().unwrap());
//!
//! let mut cmd = ParsedCommand::parse(Arc::clone(&model), ["update", "-y"]).unwrap();
//! assert_eq!(cmd.final_subcommand_path(), vec!["up"]);
//! assert!(cmd.remove_option("--yes").unwrap());
//! assert_eq!(cmd.final_arg_list(), vec!["update"]);
//! ```

mod command;
mod error;
mod model;
mod option;
mod resolve;
mod rewrite;
mod snapshot;
mod topic;
mod validate;

pub use command::{OptionToken, ParseOptions, ParsedCommand, Token, ValueStyle};
pub use error::{CommandError, ModelError};
pub use model::{DeclaredOption, MetadataModel, ModelBuilder, TopicDraft};
pub use option::{DescriptorComparison, OptionDescriptor};
pub use resolve::OptionResolver;
pub use snapshot::{ModelSnapshot, OptionSnapshot, TopicSnapshot};
pub use topic::{TopicId, TopicNode};
pub use validate::{ValidationError, validate_snapshot};
