//! Topic nodes: one per sub-command level of the wrapped program.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::OptionDescriptor;

/// Index of a [`TopicNode`] inside its [`MetadataModel`](crate::MetadataModel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicId(pub(crate) usize);

impl TopicId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One sub-command level, including the root (empty path).
///
/// Nodes live in the model's arena and refer to each other by [`TopicId`].
/// `children` holds both primary names and aliases; `subcommands` holds
/// primary names only, so the tree can be walked without visiting a node
/// twice.
#[derive(Debug, Clone)]
pub struct TopicNode {
    pub(crate) id: TopicId,
    pub(crate) parent: Option<TopicId>,
    pub(crate) path: Vec<String>,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) usage: String,
    pub(crate) examples: String,
    pub(crate) epilog: String,
    pub(crate) parent_description: Option<String>,
    pub(crate) aliases: Vec<String>,
    pub(crate) subcommands: BTreeMap<String, TopicId>,
    pub(crate) children: BTreeMap<String, TopicId>,
    /// Declared options in declaration order.
    pub(crate) option_list: Vec<Arc<OptionDescriptor>>,
    /// Declared options keyed by every spelling.
    pub(crate) added_options: BTreeMap<String, Arc<OptionDescriptor>>,
    /// Options for which this is the shallowest inheritable level.
    pub(crate) added_persistent_options: BTreeMap<String, Arc<OptionDescriptor>>,
    /// Ancestors' persistent options plus this level's own.
    pub(crate) persistent_options: BTreeMap<String, Arc<OptionDescriptor>>,
}

impl TopicNode {
    pub(crate) fn new(id: TopicId, parent: Option<TopicId>, path: Vec<String>) -> Self {
        Self {
            id,
            parent,
            path,
            title: String::new(),
            description: String::new(),
            usage: String::new(),
            examples: String::new(),
            epilog: String::new(),
            parent_description: None,
            aliases: Vec::new(),
            subcommands: BTreeMap::new(),
            children: BTreeMap::new(),
            option_list: Vec::new(),
            added_options: BTreeMap::new(),
            added_persistent_options: BTreeMap::new(),
            persistent_options: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> TopicId {
        self.id
    }

    pub fn parent(&self) -> Option<TopicId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The sub-command path, empty for the main command.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The space-joined path used as the model's flat index key.
    pub fn full_name(&self) -> String {
        self.path.join(" ")
    }

    /// The last path segment, empty for the main command.
    pub fn short_name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn examples(&self) -> &str {
        &self.examples
    }

    pub fn epilog(&self) -> &str {
        &self.epilog
    }

    /// The one-line description the parent's `Available Commands:` gave.
    pub fn parent_description(&self) -> Option<&str> {
        self.parent_description.as_deref()
    }

    /// Short description for listings: the parent's blurb, else the title.
    pub fn summary(&self) -> &str {
        self.parent_description.as_deref().unwrap_or(&self.title)
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Looks up a child by primary name or alias.
    pub fn child(&self, name: &str) -> Option<TopicId> {
        self.children.get(name).copied()
    }

    /// Primary child names mapped to their topics, sorted by name.
    pub fn subcommands(&self) -> &BTreeMap<String, TopicId> {
        &self.subcommands
    }

    /// Options declared at this level, in help-text order.
    pub fn options(&self) -> &[Arc<OptionDescriptor>] {
        &self.option_list
    }

    /// Option declared at this level under `flag`.
    pub fn local_option(&self, flag: &str) -> Option<&Arc<OptionDescriptor>> {
        self.added_options.get(flag)
    }

    /// Option inheritable at this level (from an ancestor or this level).
    pub fn persistent_option(&self, flag: &str) -> Option<&Arc<OptionDescriptor>> {
        self.persistent_options.get(flag)
    }

    /// Returns `true` if this level is where `flag` first becomes
    /// inheritable.
    pub fn declares_persistent(&self, flag: &str) -> bool {
        self.added_persistent_options.contains_key(flag)
    }

    /// Distinct options inheritable from ancestors (not declared here).
    pub fn inherited_options(&self) -> Vec<Arc<OptionDescriptor>> {
        let mut out: Vec<Arc<OptionDescriptor>> = Vec::new();
        for opt in self.persistent_options.values() {
            if self.added_persistent_options.contains_key(opt.canonical_flag()) {
                continue;
            }
            if !out.iter().any(|o| Arc::ptr_eq(o, opt)) {
                out.push(Arc::clone(opt));
            }
        }
        out
    }
}
