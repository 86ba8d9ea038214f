//! The metadata model: a rooted topic tree with scoped option visibility.
//!
//! A model is assembled from one [`TopicDraft`] per sub-command path through
//! [`ModelBuilder`]. Drafts carry what a single help page says: the options
//! declared at that level and, separately, the options the page reports as
//! inherited. [`ModelBuilder::build`] attributes every inherited option to
//! the shallowest level that documents it as inheritable, then accumulates
//! the persistent set of each node from its parent's.
//!
//! # Example
//!
//! ```
//! use help_mirror_core::*;
//!
//! let stack_flag = OptionDescriptor::new(["--stack", "-s"], Some("string"), "The stack");
//!
//! let mut builder = ModelBuilder::new("v3.0.0");
//! builder.add_topic(Vec::<String>::new(), TopicDraft::default()).unwrap();
//! builder.add_topic(["stack"], TopicDraft {
//!     options: vec![DeclaredOption::local(stack_flag.clone())],
//!     ..Default::default()
//! }).unwrap();
//! builder.add_topic(["stack", "rm"], TopicDraft {
//!     inherited_options: vec![stack_flag],
//!     ..Default::default()
//! }).unwrap();
//!
//! let model = builder.build().unwrap();
//! let stack = model.topic_by_full_name("stack").unwrap();
//! assert!(stack.declares_persistent("--stack"));
//! let rm = model.topic_by_full_name("stack rm").unwrap();
//! assert!(rm.persistent_option("-s").is_some());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ModelError, display_path};
use crate::{DescriptorComparison, OptionDescriptor, TopicId, TopicNode};

/// An option declared on a help page, optionally already known to be
/// persistent (as recorded in a cache snapshot).
#[derive(Debug, Clone)]
pub struct DeclaredOption {
    pub descriptor: OptionDescriptor,
    pub persistent: bool,
}

impl DeclaredOption {
    pub fn local(descriptor: OptionDescriptor) -> Self {
        Self {
            descriptor,
            persistent: false,
        }
    }

    pub fn persistent(descriptor: OptionDescriptor) -> Self {
        Self {
            descriptor,
            persistent: true,
        }
    }
}

/// Everything one help page (or one cached topic) contributes to the tree.
#[derive(Debug, Clone, Default)]
pub struct TopicDraft {
    pub title: String,
    pub description: String,
    pub usage: String,
    pub examples: String,
    pub epilog: String,
    pub parent_description: Option<String>,
    pub aliases: Vec<String>,
    /// Options from the page's `Flags:` section.
    pub options: Vec<DeclaredOption>,
    /// Options from the page's `Global Flags:` section, not yet attributed
    /// to any ancestor.
    pub inherited_options: Vec<OptionDescriptor>,
}

/// Collects drafts keyed by path and assembles a [`MetadataModel`].
///
/// Drafts may be added in any order; parents must exist by the time
/// [`build`](Self::build) runs.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    version: String,
    drafts: BTreeMap<Vec<String>, TopicDraft>,
}

impl ModelBuilder {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            drafts: BTreeMap::new(),
        }
    }

    /// Registers the draft for one sub-command path.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateTopic`] if the path was already added.
    pub fn add_topic<I, S>(&mut self, path: I, draft: TopicDraft) -> Result<(), ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        if self.drafts.contains_key(&path) {
            return Err(ModelError::DuplicateTopic(display_path(&path.join(" "))));
        }
        self.drafts.insert(path, draft);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Assembles the tree, attributes persistent options and builds the
    /// flat full-name index.
    ///
    /// # Errors
    ///
    /// Fails on a missing parent or root, duplicate child names or aliases,
    /// conflicting declarations within one topic, and conflicting inherited
    /// definitions attributed to the same topic.
    pub fn build(self) -> Result<MetadataModel, ModelError> {
        let mut topics: Vec<TopicNode> = Vec::with_capacity(self.drafts.len());
        let mut inherited: Vec<Vec<OptionDescriptor>> = Vec::with_capacity(self.drafts.len());
        let mut by_path: BTreeMap<Vec<String>, TopicId> = BTreeMap::new();

        if !self.drafts.contains_key(&Vec::new()) {
            return Err(ModelError::OrphanTopic(display_path("")));
        }

        // BTreeMap order puts every path after its prefixes, so parents are
        // always created first and arena order is a valid top-down order.
        for (path, draft) in self.drafts {
            let id = TopicId(topics.len());
            let parent = if path.is_empty() {
                None
            } else {
                let parent_path = &path[..path.len() - 1];
                let parent_id = by_path
                    .get(parent_path)
                    .copied()
                    .ok_or_else(|| ModelError::OrphanTopic(path.join(" ")))?;
                Some(parent_id)
            };

            let mut node = TopicNode::new(id, parent, path.clone());
            node.title = draft.title;
            node.description = draft.description;
            node.usage = draft.usage;
            node.examples = draft.examples;
            node.epilog = draft.epilog;
            node.parent_description = draft.parent_description;
            node.aliases = draft.aliases;
            for declared in draft.options {
                declare_option(&mut node, Arc::new(declared.descriptor), declared.persistent)?;
            }

            if let Some(parent_id) = parent {
                let short = node.short_name().to_string();
                let parent_node = &mut topics[parent_id.0];
                register_child(parent_node, &short, id)?;
                parent_node.subcommands.insert(short, id);
                for alias in &node.aliases {
                    register_child(parent_node, alias, id)?;
                }
            }

            by_path.insert(path, id);
            topics.push(node);
            inherited.push(draft.inherited_options);
        }

        attribute_persistent_options(&mut topics, &inherited)?;

        let mut model = MetadataModel {
            version: self.version,
            topics,
            by_full_name: BTreeMap::new(),
        };
        model.reindex();
        debug!(
            version = %model.version,
            topics = model.topics.len(),
            "Assembled metadata model"
        );
        Ok(model)
    }
}

fn register_child(parent: &mut TopicNode, name: &str, child: TopicId) -> Result<(), ModelError> {
    if parent.children.contains_key(name) {
        return Err(ModelError::DuplicateSubcommand {
            topic: display_path(&parent.full_name()),
            name: name.to_string(),
        });
    }
    parent.children.insert(name.to_string(), child);
    Ok(())
}

/// Adds a declared option to a node, sharing an existing equal descriptor.
///
/// Returns the descriptor actually stored for the option.
fn declare_option(
    node: &mut TopicNode,
    descriptor: Arc<OptionDescriptor>,
    persistent: bool,
) -> Result<Arc<OptionDescriptor>, ModelError> {
    if descriptor.flags().is_empty() {
        return Err(ModelError::EmptyOption(display_path(&node.full_name())));
    }

    let mut stored: Option<Arc<OptionDescriptor>> = None;
    for flag in descriptor.flags() {
        if let Some(existing) = node.added_options.get(flag) {
            if !existing.equivalent(&descriptor, DescriptorComparison::default()) {
                return Err(ModelError::ConflictingOption {
                    topic: display_path(&node.full_name()),
                    flag: flag.clone(),
                });
            }
            stored = Some(Arc::clone(existing));
        }
    }

    let stored = match stored {
        Some(existing) => existing,
        None => {
            node.option_list.push(Arc::clone(&descriptor));
            descriptor
        }
    };
    for flag in stored.flags() {
        node.added_options.insert(flag.clone(), Arc::clone(&stored));
        if persistent {
            node.added_persistent_options
                .insert(flag.clone(), Arc::clone(&stored));
        }
    }
    Ok(stored)
}

/// Attributes each child's inherited options to the shallowest level that
/// can own them, then accumulates the persistent set of every node.
///
/// `topics` must be in top-down order; `inherited[i]` is the raw
/// `Global Flags:` list of `topics[i]`.
fn attribute_persistent_options(
    topics: &mut [TopicNode],
    inherited: &[Vec<OptionDescriptor>],
) -> Result<(), ModelError> {
    for idx in 0..topics.len() {
        let context: BTreeMap<String, Arc<OptionDescriptor>> = match topics[idx].parent {
            Some(parent) => topics[parent.0].persistent_options.clone(),
            None => BTreeMap::new(),
        };

        let children: Vec<TopicId> = topics[idx].subcommands.values().copied().collect();
        // flag -> (descriptor, path of the child that first reported it)
        let mut attributed: BTreeMap<String, (OptionDescriptor, String)> = BTreeMap::new();

        for child in children {
            let child_name = topics[child.0].full_name();
            for reported in &inherited[child.0] {
                if reported.flags().iter().any(|f| context.contains_key(f)) {
                    continue;
                }
                let canonical = reported.canonical_flag().to_string();
                if let Some((first, source)) = attributed.get(&canonical) {
                    if !first.equivalent(reported, DescriptorComparison::strict()) {
                        return Err(ModelError::ConflictingPersistentOption {
                            topic: display_path(&topics[idx].full_name()),
                            flag: canonical,
                            sources: vec![source.clone(), child_name.clone()],
                        });
                    }
                    continue;
                }
                attributed.insert(canonical, (reported.clone(), child_name.clone()));
            }
        }

        let node = &mut topics[idx];
        for (flag, (descriptor, source)) in attributed {
            if let Some(existing) = node.added_options.get(&flag) {
                if !existing.equivalent(&descriptor, DescriptorComparison::default()) {
                    return Err(ModelError::ConflictingPersistentOption {
                        topic: display_path(&node.full_name()),
                        flag,
                        sources: vec![display_path(&node.full_name()), source],
                    });
                }
            }
            declare_option(node, Arc::new(descriptor), true)?;
        }

        let mut accumulated = context;
        for (flag, descriptor) in &node.added_persistent_options {
            accumulated.insert(flag.clone(), Arc::clone(descriptor));
        }
        node.persistent_options = accumulated;
    }
    Ok(())
}

/// The rooted topic tree of a wrapped program at one version.
///
/// Read-only once built apart from [`add_option`](Self::add_option), which
/// is meant for injecting wrapper-owned options right after loading. Parsed
/// commands share the model through an `Arc`.
#[derive(Debug, Clone)]
pub struct MetadataModel {
    version: String,
    topics: Vec<TopicNode>,
    by_full_name: BTreeMap<String, TopicId>,
}

impl MetadataModel {
    /// The wrapped program's version string this model was built from.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn root_id(&self) -> TopicId {
        TopicId(0)
    }

    pub fn root(&self) -> &TopicNode {
        &self.topics[0]
    }

    /// Returns the node for an id handed out by this model.
    ///
    /// # Panics
    ///
    /// Panics if `id` comes from a different model.
    pub fn topic(&self, id: TopicId) -> &TopicNode {
        &self.topics[id.0]
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Looks up a topic by its space-joined path (`""` is the root).
    pub fn topic_by_full_name(&self, full_name: &str) -> Option<&TopicNode> {
        self.topic_id_by_full_name(full_name)
            .map(|id| self.topic(id))
    }

    pub fn topic_id_by_full_name(&self, full_name: &str) -> Option<TopicId> {
        let normalized = full_name.split_whitespace().collect::<Vec<_>>().join(" ");
        self.by_full_name.get(&normalized).copied()
    }

    /// Walks the tree from the root through primary names and aliases.
    pub fn find_topic<S: AsRef<str>>(&self, path: &[S]) -> Option<TopicId> {
        let mut current = self.root_id();
        for segment in path {
            current = self.topic(current).child(segment.as_ref())?;
        }
        Some(current)
    }

    /// Root first, then every descendant depth-first in sorted name order.
    pub fn iter_topics(&self) -> impl Iterator<Item = &TopicNode> {
        std::iter::once(self.root_id())
            .chain(self.descendants(self.root_id()))
            .map(|id| self.topic(id))
    }

    /// Every strict descendant of `id`, depth-first, parents before children.
    pub fn descendants(&self, id: TopicId) -> Vec<TopicId> {
        let mut out = Vec::new();
        let mut stack: Vec<TopicId> = self.topic(id).subcommands.values().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.topic(next).subcommands.values().rev().copied());
        }
        out
    }

    /// Ids from the root down to and including `id`.
    pub fn ancestry(&self, id: TopicId) -> Vec<TopicId> {
        let mut chain = vec![id];
        let mut current = self.topic(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.topic(parent).parent;
        }
        chain.reverse();
        chain
    }

    /// Injects an option at `topic`, typically one owned by the wrapper
    /// rather than the wrapped program.
    ///
    /// A persistent option becomes visible in every descendant.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ConflictingOption`] if one of the flags is
    /// already declared at `topic` with a different meaning.
    pub fn add_option(
        &mut self,
        topic: TopicId,
        descriptor: OptionDescriptor,
        persistent: bool,
    ) -> Result<(), ModelError> {
        declare_option(&mut self.topics[topic.0], Arc::new(descriptor), persistent)?;
        if persistent {
            for id in std::iter::once(topic).chain(self.descendants(topic)) {
                let mut accumulated = match self.topics[id.0].parent {
                    Some(parent) => self.topics[parent.0].persistent_options.clone(),
                    None => BTreeMap::new(),
                };
                let node = &mut self.topics[id.0];
                for (flag, descriptor) in &node.added_persistent_options {
                    accumulated.insert(flag.clone(), Arc::clone(descriptor));
                }
                node.persistent_options = accumulated;
            }
        }
        Ok(())
    }

    /// Like [`add_option`](Self::add_option), addressing the topic by name.
    pub fn add_option_by_name(
        &mut self,
        full_name: &str,
        descriptor: OptionDescriptor,
        persistent: bool,
    ) -> Result<(), ModelError> {
        let id = self
            .topic_id_by_full_name(full_name)
            .ok_or_else(|| ModelError::UnknownTopic(display_path(full_name)))?;
        self.add_option(id, descriptor, persistent)
    }

    fn reindex(&mut self) {
        self.by_full_name = self
            .topics
            .iter()
            .map(|topic| (topic.full_name(), topic.id))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_flag() -> OptionDescriptor {
        OptionDescriptor::new(["--stack", "-s"], Some("string"), "The name of the stack")
    }

    fn color_flag() -> OptionDescriptor {
        OptionDescriptor::new(["--color"], Some("string"), "Colorize output")
    }

    fn sample_builder() -> ModelBuilder {
        let mut builder = ModelBuilder::new("v3.100.0");
        builder
            .add_topic(
                Vec::<String>::new(),
                TopicDraft {
                    options: vec![DeclaredOption::local(color_flag())],
                    ..Default::default()
                },
            )
            .unwrap();
        builder
            .add_topic(
                ["stack"],
                TopicDraft {
                    aliases: vec!["st".to_string()],
                    options: vec![DeclaredOption::local(stack_flag())],
                    inherited_options: vec![color_flag()],
                    ..Default::default()
                },
            )
            .unwrap();
        builder
            .add_topic(
                ["stack", "rm"],
                TopicDraft {
                    options: vec![DeclaredOption::local(OptionDescriptor::boolean(
                        ["--preserve-config"],
                        "Do not delete the stack configuration",
                    ))],
                    inherited_options: vec![color_flag(), stack_flag()],
                    ..Default::default()
                },
            )
            .unwrap();
        builder
            .add_topic(
                ["up"],
                TopicDraft {
                    inherited_options: vec![color_flag()],
                    ..Default::default()
                },
            )
            .unwrap();
        builder
    }

    #[test]
    fn test_persistent_attribution_picks_shallowest_level() {
        let model = sample_builder().build().unwrap();

        assert!(model.root().declares_persistent("--color"));
        let stack = model.topic_by_full_name("stack").unwrap();
        assert!(stack.declares_persistent("--stack"));
        assert!(!stack.declares_persistent("--color"));

        let rm = model.topic_by_full_name("stack rm").unwrap();
        assert!(rm.persistent_option("--color").is_some());
        assert!(rm.persistent_option("-s").is_some());
        assert!(rm.added_persistent_options.is_empty());

        let up = model.topic_by_full_name("up").unwrap();
        assert!(up.persistent_option("--stack").is_none());
    }

    #[test]
    fn test_aliases_resolve_to_same_topic() {
        let model = sample_builder().build().unwrap();
        let by_alias = model.find_topic(&["st", "rm"]).unwrap();
        let by_name = model.find_topic(&["stack", "rm"]).unwrap();
        assert_eq!(by_alias, by_name);
        assert_eq!(model.topic(by_alias).full_name(), "stack rm");
        // Aliases are lookup entries only; the flat index has one entry per node.
        assert_eq!(model.len(), 4);
        assert!(model.topic_by_full_name("st").is_none());
    }

    #[test]
    fn test_conflicting_inherited_definitions_fail() {
        let mut builder = ModelBuilder::new("v1");
        builder.add_topic(Vec::<String>::new(), TopicDraft::default()).unwrap();
        builder
            .add_topic(
                ["a"],
                TopicDraft {
                    inherited_options: vec![OptionDescriptor::boolean(["--verbose"], "Verbose")],
                    ..Default::default()
                },
            )
            .unwrap();
        builder
            .add_topic(
                ["b"],
                TopicDraft {
                    inherited_options: vec![OptionDescriptor::new(
                        ["--verbose"],
                        Some("int"),
                        "Verbose",
                    )],
                    ..Default::default()
                },
            )
            .unwrap();

        let err = builder.build().unwrap_err();
        assert_eq!(
            err,
            ModelError::ConflictingPersistentOption {
                topic: "<main command>".to_string(),
                flag: "--verbose".to_string(),
                sources: vec!["a".to_string(), "b".to_string()],
            }
        );
    }

    #[test]
    fn test_missing_parent_is_rejected() {
        let mut builder = ModelBuilder::new("v1");
        builder.add_topic(Vec::<String>::new(), TopicDraft::default()).unwrap();
        builder.add_topic(["stack", "rm"], TopicDraft::default()).unwrap();
        assert_eq!(
            builder.build().unwrap_err(),
            ModelError::OrphanTopic("stack rm".to_string())
        );
    }

    #[test]
    fn test_alias_collision_is_rejected() {
        let mut builder = ModelBuilder::new("v1");
        builder.add_topic(Vec::<String>::new(), TopicDraft::default()).unwrap();
        builder
            .add_topic(
                ["list"],
                TopicDraft {
                    aliases: vec!["ls".to_string()],
                    ..Default::default()
                },
            )
            .unwrap();
        builder.add_topic(["ls"], TopicDraft::default()).unwrap();
        assert!(matches!(
            builder.build(),
            Err(ModelError::DuplicateSubcommand { .. })
        ));
    }

    #[test]
    fn test_add_persistent_option_propagates_to_descendants() {
        let mut model = sample_builder().build().unwrap();
        model
            .add_option(
                model.root_id(),
                OptionDescriptor::boolean(["--raw-pulumi"], "Run without rewriting"),
                true,
            )
            .unwrap();
        for topic in model.iter_topics() {
            assert!(
                topic.persistent_option("--raw-pulumi").is_some(),
                "missing at '{}'",
                topic.full_name()
            );
        }
    }

    #[test]
    fn test_add_option_rejects_redefinition() {
        let mut model = sample_builder().build().unwrap();
        let stack = model.topic_id_by_full_name("stack").unwrap();
        let err = model
            .add_option(stack, OptionDescriptor::boolean(["--stack"], "flag"), false)
            .unwrap_err();
        assert!(matches!(err, ModelError::ConflictingOption { .. }));
    }

    #[test]
    fn test_iter_topics_is_depth_first_sorted() {
        let model = sample_builder().build().unwrap();
        let names: Vec<String> = model.iter_topics().map(|t| t.full_name()).collect();
        assert_eq!(names, vec!["", "stack", "stack rm", "up"]);
    }
}
