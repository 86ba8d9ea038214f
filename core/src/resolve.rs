//! Option resolution: which descriptor a flag spelling refers to at a topic.
//!
//! Resolution order is fixed:
//!
//! 1. options declared at the topic itself,
//! 2. the topic's accumulated persistent options,
//! 3. options declared anywhere below the topic.
//!
//! Step 3 lets callers inspect a command whose leaf is not chosen yet. It
//! fails with [`CommandError::AmbiguousOption`] when the matches disagree.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CommandError, display_path};
use crate::{DescriptorComparison, MetadataModel, OptionDescriptor, TopicId};

impl MetadataModel {
    /// Looks `flag` up among the options visible at `topic` without
    /// descending: local declarations first, then persistent ones.
    pub fn visible_option(&self, topic: TopicId, flag: &str) -> Option<&Arc<OptionDescriptor>> {
        let node = self.topic(topic);
        node.local_option(flag)
            .or_else(|| node.persistent_option(flag))
    }

    /// Collects every strict descendant of `topic` that declares `flag`,
    /// keyed by the descendant's full name.
    pub fn descendant_options(
        &self,
        topic: TopicId,
        flag: &str,
    ) -> BTreeMap<String, Arc<OptionDescriptor>> {
        self.descendants(topic)
            .into_iter()
            .filter_map(|id| {
                let node = self.topic(id);
                node.local_option(flag)
                    .map(|opt| (node.full_name(), Arc::clone(opt)))
            })
            .collect()
    }
}

/// Resolves flag spellings against a [`MetadataModel`].
///
/// # Example
///
/// ```
/// use help_mirror_core::*;
///
/// let mut builder = ModelBuilder::new("v1");
/// builder.add_topic(Vec::<String>::new(), TopicDraft::default()).unwrap();
/// builder.add_topic(["up"], TopicDraft {
///     options: vec![DeclaredOption::local(OptionDescriptor::new(["--target"], Some("stringArray"), "Targets"))],
///     ..Default::default()
/// }).unwrap();
/// builder.add_topic(["refresh"], TopicDraft {
///     options: vec![DeclaredOption::local(OptionDescriptor::boolean(["--target"], "Target mode"))],
///     ..Default::default()
/// }).unwrap();
/// let model = builder.build().unwrap();
///
/// let resolver = OptionResolver::new(&model);
/// let err = resolver.resolve(model.root_id(), "--target").unwrap_err();
/// assert!(matches!(err, CommandError::AmbiguousOption { .. }));
///
/// let up = model.topic_id_by_full_name("up").unwrap();
/// assert!(resolver.resolve(up, "--target").unwrap().unwrap().has_value());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct OptionResolver<'m> {
    model: &'m MetadataModel,
    comparison: DescriptorComparison,
    allow_unknown: bool,
}

impl<'m> OptionResolver<'m> {
    /// Strict resolver using the default descriptor comparison.
    pub fn new(model: &'m MetadataModel) -> Self {
        Self {
            model,
            comparison: DescriptorComparison::default(),
            allow_unknown: false,
        }
    }

    /// Sets how descendant matches are collapsed before deciding ambiguity.
    pub fn with_comparison(mut self, comparison: DescriptorComparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// When `true`, an unresolvable flag yields `Ok(None)` instead of
    /// [`CommandError::UnknownOption`].
    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    pub fn model(&self) -> &'m MetadataModel {
        self.model
    }

    /// Resolves `flag` in the context of `topic`.
    ///
    /// # Errors
    ///
    /// [`CommandError::AmbiguousOption`] if descendants disagree about the
    /// flag, and [`CommandError::UnknownOption`] if nothing matches and
    /// unknown flags are not allowed.
    pub fn resolve(
        &self,
        topic: TopicId,
        flag: &str,
    ) -> Result<Option<Arc<OptionDescriptor>>, CommandError> {
        if let Some(found) = self.model.visible_option(topic, flag) {
            return Ok(Some(Arc::clone(found)));
        }

        let matches = self.model.descendant_options(topic, flag);
        let mut distinct: Vec<&Arc<OptionDescriptor>> = Vec::new();
        for descriptor in matches.values() {
            if !distinct
                .iter()
                .any(|seen| seen.equivalent(descriptor, self.comparison))
            {
                distinct.push(descriptor);
            }
        }

        match distinct.as_slice() {
            [] if self.allow_unknown => Ok(None),
            [] => Err(CommandError::UnknownOption {
                flag: flag.to_string(),
                topic: display_path(&self.model.topic(topic).full_name()),
            }),
            [single] => Ok(Some(Arc::clone(single))),
            _ => Err(CommandError::AmbiguousOption {
                flag: flag.to_string(),
                topic: display_path(&self.model.topic(topic).full_name()),
                paths: matches.keys().map(|path| display_path(path)).collect(),
            }),
        }
    }

    /// Best-effort lookup that never fails: ambiguity and unknown flags both
    /// yield `None`.
    pub fn resolve_lenient(&self, topic: TopicId, flag: &str) -> Option<Arc<OptionDescriptor>> {
        self.allow_unknown(true).resolve(topic, flag).ok().flatten()
    }
}
