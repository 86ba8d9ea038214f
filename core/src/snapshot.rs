//! Serializable form of a [`MetadataModel`], used for the on-disk cache.
//!
//! The document has two top-level fields, `version` and `help_data`; the
//! latter nests one [`TopicSnapshot`] per primary sub-command name. Alias
//! entries are not repeated in `subcommands`; they are listed in the child's
//! `aliases` instead.
//!
//! Persistent options are stored on the level that owns them, flagged with
//! `persistent: true`, so a model restored from a snapshot needs no
//! attribution pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::{DeclaredOption, MetadataModel, ModelBuilder, OptionDescriptor, TopicDraft, TopicId};

/// Top-level cache document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: String,
    pub help_data: TopicSnapshot,
}

/// One topic and, recursively, its primary children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSnapshot {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub usage: String,
    #[serde(default)]
    pub epilog: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub examples: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSnapshot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subcommands: BTreeMap<String, TopicSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSnapshot {
    pub flags: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub persistent: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl OptionSnapshot {
    fn descriptor(&self) -> OptionDescriptor {
        OptionDescriptor::new(
            self.flags.iter().cloned(),
            self.value_name.as_deref(),
            &self.description,
        )
    }
}

impl MetadataModel {
    /// Captures the model in its cache form.
    pub fn to_snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            version: self.version().to_string(),
            help_data: self.topic_snapshot(self.root_id()),
        }
    }

    fn topic_snapshot(&self, id: TopicId) -> TopicSnapshot {
        let topic = self.topic(id);
        TopicSnapshot {
            title: topic.title().to_string(),
            description: topic.description().to_string(),
            usage: topic.usage().to_string(),
            epilog: topic.epilog().to_string(),
            parent_description: topic.parent_description().map(String::from),
            aliases: topic.aliases().to_vec(),
            examples: topic.examples().to_string(),
            options: topic
                .options()
                .iter()
                .map(|opt| OptionSnapshot {
                    flags: opt.flags().to_vec(),
                    description: opt.description().to_string(),
                    value_name: opt.value_name().map(String::from),
                    persistent: topic.declares_persistent(opt.canonical_flag()),
                })
                .collect(),
            subcommands: topic
                .subcommands()
                .iter()
                .map(|(name, child)| (name.clone(), self.topic_snapshot(*child)))
                .collect(),
        }
    }

    /// Rebuilds a model from its cache form.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if the snapshot describes an inconsistent
    /// tree (for example an alias colliding with a sibling name).
    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Result<Self, ModelError> {
        let mut builder = ModelBuilder::new(snapshot.version.clone());
        let mut stack: Vec<(Vec<String>, &TopicSnapshot)> = vec![(Vec::new(), &snapshot.help_data)];

        while let Some((path, topic)) = stack.pop() {
            for (name, child) in &topic.subcommands {
                let mut child_path = path.clone();
                child_path.push(name.clone());
                stack.push((child_path, child));
            }

            let draft = TopicDraft {
                title: topic.title.clone(),
                description: topic.description.clone(),
                usage: topic.usage.clone(),
                examples: topic.examples.clone(),
                epilog: topic.epilog.clone(),
                parent_description: topic.parent_description.clone(),
                aliases: topic.aliases.clone(),
                options: topic
                    .options
                    .iter()
                    .map(|opt| DeclaredOption {
                        descriptor: opt.descriptor(),
                        persistent: opt.persistent,
                    })
                    .collect(),
                inherited_options: Vec::new(),
            };
            builder.add_topic(path, draft)?;
        }

        builder.build()
    }
}
