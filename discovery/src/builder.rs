//! Recursive sub-command discovery.
//!
//! Starting from the root, every help page is fetched and parsed, and every
//! sub-command it lists is queued. The sequential walk uses an explicit
//! depth-first work stack; the parallel walk fetches one tree level at a
//! time on a bounded `rayon` pool and joins before descending. Both feed the
//! same [`ModelBuilder`], so they produce identical models.

use std::time::Instant;

use help_mirror_core::{MetadataModel, ModelBuilder};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{ConstructionError, Result, path_label};
use crate::help::{HelpPage, parse_help_page};
use crate::source::HelpSource;

/// Upper bound on the number of help pages fetched for one model.
pub const DEFAULT_MAX_TOPICS: usize = 4096;

/// Discovery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Concurrent help fetches; `0` and `1` both mean sequential.
    pub jobs: usize,
    /// Abort discovery after this many topics.
    pub max_topics: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            max_topics: DEFAULT_MAX_TOPICS,
        }
    }
}

/// A discovered but not yet fetched topic.
#[derive(Debug, Clone)]
struct PendingTopic {
    path: Vec<String>,
    parent_description: Option<String>,
}

impl PendingTopic {
    fn root() -> Self {
        Self {
            path: Vec::new(),
            parent_description: None,
        }
    }

    fn children(&self, page: &HelpPage) -> Vec<PendingTopic> {
        page.subcommands
            .iter()
            .map(|entry| {
                let mut path = self.path.clone();
                path.push(entry.name.clone());
                PendingTopic {
                    path,
                    parent_description: Some(entry.description.clone()),
                }
            })
            .collect()
    }

    fn fetch(&self, source: &dyn HelpSource) -> Result<HelpPage> {
        debug!(topic = %path_label(&self.path), "Fetching help");
        let text = source.fetch_help(&self.path)?;
        parse_help_page(&self.path, self.parent_description.as_deref(), &text)
    }
}

/// Fetches the version, then discovers the whole tree.
pub fn build_model(source: &dyn HelpSource, options: &BuildOptions) -> Result<MetadataModel> {
    let version = source.fetch_version()?;
    build_model_with_version(source, version, options)
}

/// Discovers the whole tree for an already known version string.
///
/// # Errors
///
/// Any failed fetch, malformed page, modelling conflict or exceeded topic
/// budget aborts the build.
pub fn build_model_with_version(
    source: &dyn HelpSource,
    version: String,
    options: &BuildOptions,
) -> Result<MetadataModel> {
    let started = Instant::now();
    let mut builder = ModelBuilder::new(version.clone());

    if options.jobs <= 1 {
        discover_sequential(source, options, &mut builder)?;
    } else {
        discover_parallel(source, options, &mut builder)?;
    }

    let topics = builder.len();
    let model = builder.build()?;
    info!(
        version = %version,
        topics,
        jobs = options.jobs.max(1),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Built metadata model from help text"
    );
    Ok(model)
}

fn discover_sequential(
    source: &dyn HelpSource,
    options: &BuildOptions,
    builder: &mut ModelBuilder,
) -> Result<()> {
    let mut stack = vec![PendingTopic::root()];
    let mut visited = 0usize;

    while let Some(topic) = stack.pop() {
        visited += 1;
        if visited > options.max_topics {
            return Err(ConstructionError::TopicBudgetExceeded(options.max_topics));
        }
        let page = topic.fetch(source)?;
        // Reversed so siblings are visited in listing order.
        stack.extend(topic.children(&page).into_iter().rev());
        builder.add_topic(topic.path, page.into_draft(topic.parent_description))?;
    }
    Ok(())
}

fn discover_parallel(
    source: &dyn HelpSource,
    options: &BuildOptions,
    builder: &mut ModelBuilder,
) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()?;

    let mut frontier = vec![PendingTopic::root()];
    let mut visited = 0usize;
    let mut depth = 0usize;

    while !frontier.is_empty() {
        visited += frontier.len();
        if visited > options.max_topics {
            return Err(ConstructionError::TopicBudgetExceeded(options.max_topics));
        }
        debug!(depth, topics = frontier.len(), "Fetching help level");

        let pages: Vec<Result<HelpPage>> =
            pool.install(|| frontier.par_iter().map(|topic| topic.fetch(source)).collect());

        let mut next = Vec::new();
        for (topic, page) in frontier.into_iter().zip(pages) {
            let page = page?;
            next.extend(topic.children(&page));
            builder.add_topic(topic.path, page.into_draft(topic.parent_description))?;
        }
        frontier = next;
        depth += 1;
    }
    Ok(())
}
