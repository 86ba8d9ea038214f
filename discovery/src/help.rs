//! Parser for one cobra-style `--help` page.
//!
//! Pages follow a fixed section order:
//!
//! ```text
//! <title>                      (optional, followed by a blank line)
//! <long description>
//!
//! Usage:
//!   <usage lines>
//!
//! Aliases:                     (optional)
//!   <name>, <alias>, ...
//!
//! Examples:                    (optional)
//!   <example lines>
//!
//! Available Commands:          (optional)
//!   <name>   <one-line description>
//!
//! Flags:
//!   -s, --long value   <description>
//!
//! Global Flags:                (optional)
//!       --long value   <description>
//!
//! <epilog>
//! ```
//!
//! Sections may be missing, except `Usage:` and `Flags:`, but never out of
//! order. Any deviation is a [`ConstructionError::MalformedHelp`].

use std::sync::LazyLock;

use help_mirror_core::{DeclaredOption, OptionDescriptor, TopicDraft};
use regex::Regex;

use crate::error::{ConstructionError, Result, path_label};

static OPTION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\A  (?:(?P<short>-[a-zA-Z0-9]), |    )(?P<long>--[a-zA-Z0-9_.\-]+)(?: (?P<value_name>[a-zA-Z0-9_]+)(?:\[=(?P<default>[^\]]+)\])?:?)?  \s*(?P<description>[^ ].*)\z",
    )
    .expect("static regex must compile")
});

static SUBCOMMAND_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^  (?P<name>[a-zA-Z0-9\-]+)\s+(?P<description>[^ ].*)$")
        .expect("static regex must compile")
});

const SECTION_HEADERS: &[&str] = &[
    "Usage:",
    "Aliases:",
    "Examples:",
    "Available Commands:",
    "Flags:",
    "Global Flags:",
];

/// Indent that marks a continuation of the previous option's description.
const CONTINUATION_INDENT: &str = "        ";

/// One row of an `Available Commands:` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcommandEntry {
    pub name: String,
    pub description: String,
}

/// Everything extracted from one help page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpPage {
    pub title: String,
    pub description: String,
    pub usage: String,
    pub aliases: Vec<String>,
    pub examples: String,
    pub subcommands: Vec<SubcommandEntry>,
    /// `Flags:` section.
    pub options: Vec<OptionDescriptor>,
    /// `Global Flags:` section.
    pub inherited_options: Vec<OptionDescriptor>,
    pub epilog: String,
}

impl HelpPage {
    /// Converts the page into a model draft. `parent_description` is the
    /// parent's one-line summary of this command, if any.
    pub fn into_draft(self, parent_description: Option<String>) -> TopicDraft {
        TopicDraft {
            title: self.title,
            description: self.description,
            usage: self.usage,
            examples: self.examples,
            epilog: self.epilog,
            parent_description,
            aliases: self.aliases,
            options: self.options.into_iter().map(DeclaredOption::local).collect(),
            inherited_options: self.inherited_options,
        }
    }
}

/// Parses one `Flags:`/`Global Flags:` entry, with continuation lines
/// already joined by `'\n'`.
///
/// # Examples
///
/// ```
/// use help_mirror_discovery::help::parse_option_line;
///
/// let opt = parse_option_line("  -s, --stack string   The name of the stack to operate on").unwrap();
/// assert_eq!(opt.flags(), ["--stack", "-s"]);
/// assert_eq!(opt.value_name(), Some("string"));
///
/// let opt = parse_option_line("      --non-interactive   Disable interactive mode").unwrap();
/// assert!(!opt.has_value());
/// assert!(parse_option_line("not an option").is_none());
/// ```
pub fn parse_option_line(line: &str) -> Option<OptionDescriptor> {
    let caps = OPTION_LINE_RE.captures(line)?;
    let long = caps.name("long")?.as_str();
    let mut flags = vec![long];
    if let Some(short) = caps.name("short") {
        flags.push(short.as_str());
    }
    let value_name = caps.name("value_name").map(|m| m.as_str());
    let description = caps.name("description").map_or("", |m| m.as_str());
    Some(OptionDescriptor::new(flags, value_name, description))
}

/// Parses the help page of the topic at `path`.
///
/// `parent_description` supplies the title for pages that have none.
///
/// # Errors
///
/// Returns [`ConstructionError::MalformedHelp`] naming the path and the
/// offending line when the page does not match the section grammar.
pub fn parse_help_page(
    path: &[String],
    parent_description: Option<&str>,
    text: &str,
) -> Result<HelpPage> {
    let lines: Vec<&str> = text.trim_end().split('\n').map(str::trim_end).collect();
    let mut cursor = PageCursor {
        path,
        lines,
        pos: 0,
    };
    cursor.parse(parent_description)
}

struct PageCursor<'a> {
    path: &'a [String],
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> PageCursor<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn error(&self, reason: impl Into<String>) -> ConstructionError {
        self.error_at(self.pos, reason)
    }

    fn error_at(&self, pos: usize, reason: impl Into<String>) -> ConstructionError {
        ConstructionError::MalformedHelp {
            path: path_label(self.path),
            line: pos + 1,
            text: self.lines.get(pos).copied().unwrap_or_default().to_string(),
            reason: reason.into(),
        }
    }

    fn expect_blank(&mut self) -> Result<()> {
        match self.peek() {
            Some("") => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(self.error("expected a blank line")),
            None => Err(self.error("unexpected end of help text")),
        }
    }

    fn join(&self, start: usize, end: usize) -> String {
        self.lines[start..end].join("\n")
    }

    /// Consumes an indented block (blank lines allowed) that must be
    /// followed by a blank line and a non-indented line.
    fn indented_block(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(line) = self.peek() {
            if !line.is_empty() && !line.starts_with(' ') {
                break;
            }
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.error("unexpected end of help text"));
        }
        if self.pos == start || self.lines[self.pos - 1] != "" {
            return Err(self.error("section must end with a blank line"));
        }
        Ok(self.join(start, self.pos - 1))
    }

    fn parse(&mut self, parent_description: Option<&str>) -> Result<HelpPage> {
        let mut page = HelpPage::default();
        if self.lines.len() < 3 {
            return Err(self.error_at(self.lines.len(), "help text is too short"));
        }

        let description_start = if self.lines[1].is_empty() && !is_header(self.lines[0]) {
            page.title = self.lines[0].to_string();
            2
        } else {
            page.title = match parent_description {
                Some(text) => text.to_string(),
                None => format!("Subcommand '{}'", self.path.join(" ")),
            };
            0
        };

        self.pos = description_start;
        loop {
            match self.peek() {
                Some("Usage:") => break,
                Some(line) if is_header(line) => {
                    return Err(self.error(format!("section '{line}' appears before 'Usage:'")));
                }
                Some(_) => self.pos += 1,
                None => return Err(self.error("missing 'Usage:' section")),
            }
        }
        if self.pos > description_start {
            if self.lines[self.pos - 1] != "" {
                return Err(self.error("'Usage:' must follow a blank line"));
            }
            page.description = self.join(description_start, self.pos - 1);
        }
        self.pos += 1;
        page.usage = self.indented_block()?;

        if self.peek() == Some("Aliases:") {
            self.pos += 1;
            let own_name = self.path.last().map(String::as_str).unwrap_or_default();
            let aliases: Vec<String> = self
                .peek()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .map(String::from)
                .collect();
            if aliases.is_empty() {
                return Err(self.error("'Aliases:' section is empty"));
            }
            page.aliases = aliases.into_iter().filter(|a| a != own_name).collect();
            self.pos += 1;
            self.expect_blank()?;
        }

        if self.peek() == Some("Examples:") {
            self.pos += 1;
            page.examples = self.indented_block()?;
        }

        if self.peek() == Some("Available Commands:") {
            self.pos += 1;
            while let Some(line) = self.peek() {
                if line.is_empty() {
                    break;
                }
                let caps = SUBCOMMAND_LINE_RE
                    .captures(line)
                    .ok_or_else(|| self.error("invalid sub-command line"))?;
                page.subcommands.push(SubcommandEntry {
                    name: caps["name"].to_string(),
                    description: caps["description"].to_string(),
                });
                self.pos += 1;
            }
            self.expect_blank()?;
        }

        match self.peek() {
            Some("Flags:") => self.pos += 1,
            Some(line) if is_header(line) => {
                return Err(self.error(format!("section '{line}' is out of order")));
            }
            _ => return Err(self.error("expected 'Flags:' section")),
        }
        page.options = self.option_block()?;

        if self.peek() == Some("Global Flags:") {
            self.pos += 1;
            page.inherited_options = self.option_block()?;
        }

        let epilog_start = self.pos;
        while let Some(line) = self.peek() {
            if is_header(line) {
                return Err(self.error(format!("section '{line}' is out of order")));
            }
            self.pos += 1;
        }
        page.epilog = self.join(epilog_start, self.lines.len());
        Ok(page)
    }

    /// Reads option entries up to the next blank line (which is consumed).
    fn option_block(&mut self) -> Result<Vec<OptionDescriptor>> {
        let mut options = Vec::new();
        while let Some(line) = self.peek() {
            if line.is_empty() {
                self.pos += 1;
                break;
            }
            let start = self.pos;
            let mut entry = line.to_string();
            while let Some(next) = self.lines.get(self.pos + 1) {
                if !next.starts_with(CONTINUATION_INDENT) {
                    break;
                }
                entry.push('\n');
                entry.push_str(next.trim_start());
                self.pos += 1;
            }
            let option = parse_option_line(&entry)
                .ok_or_else(|| self.error_at(start, "invalid flag description line"))?;
            options.push(option);
            self.pos += 1;
        }
        Ok(options)
    }
}

fn is_header(line: &str) -> bool {
    SECTION_HEADERS.contains(&line)
}
