//! Builds a [`MetadataModel`] for a wrapped program from its help output.
//!
//! - [`HelpSource`]: where help pages come from; [`ProcessHelpSource`] runs
//!   the program, [`MapHelpSource`] serves canned text.
//! - [`help::parse_help_page`]: the section-grammar parser for one page.
//! - [`build_model`]: recursive discovery, sequential or on a bounded
//!   worker pool ([`BuildOptions`]).
//! - [`MetadataCache`] and [`load_or_build`]: the version-keyed cache file.
//! - [`MirrorConfig`]: YAML settings tying the above together.
//!
//! # Example
//!
//! ```
//! use help_mirror_discovery::{BuildOptions, MapHelpSource, build_model};
//!
//! let source = MapHelpSource::new("v1.2.3").with_page("", "\
//! Example tool
//!
//! Usage:
//!   tool [command]
//!
//! Available Commands:
//!   run         Run something
//!
//! Flags:
//!   -h, --help   help for tool
//! ").with_page("run", "\
//! Usage:
//!   tool run [flags]
//!
//! Flags:
//!   -n, --name string   Name of the thing
//! ");
//!
//! let model = build_model(&source, &BuildOptions::default()).unwrap();
//! let run = model.topic_by_full_name("run").unwrap();
//! assert_eq!(run.title(), "Run something");
//! assert!(run.local_option("-n").unwrap().has_value());
//! ```
//!
//! [`MetadataModel`]: help_mirror_core::MetadataModel

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod help;
pub mod source;

pub use builder::{BuildOptions, DEFAULT_MAX_TOPICS, build_model, build_model_with_version};
pub use cache::{MetadataCache, load_or_build};
pub use config::{ExtraOption, MirrorConfig};
pub use error::{ConstructionError, Result};
pub use source::{HelpSource, MapHelpSource, ProcessHelpSource};
