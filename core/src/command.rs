//! Tokenizing and classifying one invocation of the wrapped program.
//!
//! Parsing runs two passes over the raw arguments. The first pass only
//! locates the sub-command path: it walks non-option words through the
//! topic tree and skips option values using whatever context has been
//! reached so far. The second pass classifies every argument against the
//! final topic, where option arity is known precisely.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::error::CommandError;
use crate::{DescriptorComparison, MetadataModel, OptionDescriptor, OptionResolver, TopicId, TopicNode};

/// How an option's value was (or will be) written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueStyle {
    /// `--stack prod`
    Separate,
    /// `--stack=prod` or `-sprod`
    Attached,
}

/// One flag occurrence, with its value if it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionToken {
    /// The spelling used on the command line.
    pub flag: String,
    pub value: Option<String>,
    pub style: ValueStyle,
    /// `None` when the flag could not be resolved in permissive mode.
    pub descriptor: Option<Arc<OptionDescriptor>>,
}

impl OptionToken {
    /// A flag with no value.
    pub fn bare(flag: impl Into<String>, descriptor: Option<Arc<OptionDescriptor>>) -> Self {
        Self {
            flag: flag.into(),
            value: None,
            style: ValueStyle::Separate,
            descriptor,
        }
    }

    /// Every spelling this occurrence can be found under.
    pub fn synonyms(&self) -> Vec<String> {
        match &self.descriptor {
            Some(descriptor) => descriptor.flags().to_vec(),
            None => vec![self.flag.clone()],
        }
    }

    fn push_args(&self, out: &mut Vec<String>) {
        match (&self.value, self.style) {
            (None, _) => out.push(self.flag.clone()),
            (Some(value), ValueStyle::Separate) => {
                out.push(self.flag.clone());
                out.push(value.clone());
            }
            (Some(value), ValueStyle::Attached) if self.flag.starts_with("--") => {
                out.push(format!("{}={value}", self.flag));
            }
            // `-sVALUE` only reads back the same when the value cannot be
            // mistaken for the `=` separator or for more clustered flags.
            (Some(value), ValueStyle::Attached)
                if self.descriptor.as_ref().is_some_and(|d| d.has_value())
                    && !value.is_empty()
                    && !value.starts_with('=') =>
            {
                out.push(format!("{}{value}", self.flag));
            }
            (Some(value), ValueStyle::Attached) => out.push(format!("{}={value}", self.flag)),
        }
    }
}

/// A classified command-line element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A segment of the sub-command path.
    Subcommand(String),
    Positional(String),
    Option(OptionToken),
    /// A literal `--`; everything after it is positional.
    Terminator,
}

impl Token {
    pub fn as_option(&self) -> Option<&OptionToken> {
        match self {
            Token::Option(opt) => Some(opt),
            _ => None,
        }
    }

    pub(crate) fn push_args(&self, out: &mut Vec<String>) {
        match self {
            Token::Subcommand(word) | Token::Positional(word) => out.push(word.clone()),
            Token::Option(opt) => opt.push_args(out),
            Token::Terminator => out.push("--".to_string()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Subcommand(word) => write!(f, "subcommand {word}"),
            Token::Positional(word) => write!(f, "positional {word}"),
            Token::Terminator => write!(f, "terminator --"),
            Token::Option(opt) => {
                write!(f, "option {}", opt.flag)?;
                if let Some(value) = &opt.value {
                    write!(f, " = {value:?}")?;
                }
                match &opt.descriptor {
                    Some(descriptor) => write!(f, " ({})", descriptor.flags().join(", ")),
                    None => write!(f, " (unresolved)"),
                }
            }
        }
    }
}

/// Knobs for classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Keep unknown flags as valueless tokens instead of failing.
    pub allow_unknown: bool,
    /// Strictness used to decide whether descendant matches are ambiguous.
    pub comparison: DescriptorComparison,
    /// Flags the caller refuses to pass through (any synonym matches).
    pub forbidden: Vec<String>,
}

/// One classified invocation bound to a shared [`MetadataModel`].
///
/// Derived state (`final_topic`, `subcommand_token_index`, the option
/// index) is always recomputed from scratch by a full parse; mutations
/// such as [`set_option`](Self::set_option) go through the same path.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use help_mirror_core::*;
///
/// let mut builder = ModelBuilder::new("v1");
/// builder.add_topic(Vec::<String>::new(), TopicDraft::default()).unwrap();
/// builder.add_topic(["stack"], TopicDraft {
///     options: vec![DeclaredOption::persistent(
///         OptionDescriptor::new(["--stack", "-s"], Some("string"), "The stack"))],
///     ..Default::default()
/// }).unwrap();
/// builder.add_topic(["stack", "rm"], TopicDraft {
///     options: vec![DeclaredOption::local(
///         OptionDescriptor::boolean(["--preserve-config"], "Keep config"))],
///     ..Default::default()
/// }).unwrap();
/// let model = Arc::new(builder.build().unwrap());
///
/// let mut cmd = ParsedCommand::parse(model, ["stack", "rm", "--preserve-config", "x"]).unwrap();
/// assert_eq!(cmd.final_subcommand_path(), vec!["stack", "rm"]);
/// assert_eq!(cmd.positional_args(), vec!["x"]);
///
/// cmd.set_option("--stack", Some("prod")).unwrap();
/// assert_eq!(
///     cmd.final_arg_list(),
///     vec!["stack", "rm", "--stack", "prod", "--preserve-config", "x"]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    model: Arc<MetadataModel>,
    options: ParseOptions,
    pub(crate) tokens: Vec<Token>,
    final_topic: TopicId,
    subcommand_token_index: usize,
    option_index: BTreeMap<String, Vec<usize>>,
}

struct Classification {
    tokens: Vec<Token>,
    final_topic: TopicId,
    subcommand_token_index: usize,
    option_index: BTreeMap<String, Vec<usize>>,
}

impl ParsedCommand {
    /// Parses strictly: unknown flags are an error.
    pub fn parse<I, S>(model: Arc<MetadataModel>, args: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::parse_with_options(model, args, ParseOptions::default())
    }

    pub fn parse_with_options<I, S>(
        model: Arc<MetadataModel>,
        args: I,
        options: ParseOptions,
    ) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let classified = classify(&model, &args, &options)?;
        Ok(Self {
            model,
            options,
            tokens: classified.tokens,
            final_topic: classified.final_topic,
            subcommand_token_index: classified.subcommand_token_index,
            option_index: classified.option_index,
        })
    }

    /// Replaces this command with a fresh parse of `args`, leaving it
    /// untouched on error.
    pub(crate) fn reparse(&mut self, args: &[String]) -> Result<(), CommandError> {
        let classified = classify(&self.model, args, &self.options)?;
        self.tokens = classified.tokens;
        self.final_topic = classified.final_topic;
        self.subcommand_token_index = classified.subcommand_token_index;
        self.option_index = classified.option_index;
        Ok(())
    }

    pub fn model(&self) -> &Arc<MetadataModel> {
        &self.model
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.options
    }

    pub(crate) fn resolver(&self) -> OptionResolver<'_> {
        OptionResolver::new(&self.model)
            .with_comparison(self.options.comparison)
            .allow_unknown(self.options.allow_unknown)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn final_topic(&self) -> &TopicNode {
        self.model.topic(self.final_topic)
    }

    pub fn final_topic_id(&self) -> TopicId {
        self.final_topic
    }

    /// Primary path of the deepest matched topic. Aliases used on the
    /// command line are reported under their primary names.
    pub fn final_subcommand_path(&self) -> Vec<String> {
        self.final_topic().path().to_vec()
    }

    /// Index in [`tokens`](Self::tokens) right after the last sub-command
    /// path segment, or `0` for the main command.
    pub fn subcommand_token_index(&self) -> usize {
        self.subcommand_token_index
    }

    /// The flattened argument list to hand to a process launcher.
    pub fn final_arg_list(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            token.push_args(&mut out);
        }
        out
    }

    pub fn positional_args(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|token| match token {
                Token::Positional(word) => Some(word.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every occurrence of the option `flag` refers to, in command-line order.
    pub fn option_occurrences(&self, flag: &str) -> Vec<&OptionToken> {
        self.option_index
            .get(flag)
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.tokens[idx].as_option())
            .collect()
    }

    pub(crate) fn option_token_indices(&self, flag: &str) -> &[usize] {
        self.option_index.get(flag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns `true` if any synonym of `flag` appears on the command line.
    pub fn has_option(&self, flag: &str) -> bool {
        self.option_index.contains_key(flag)
    }

    /// Returns `true` if `flag` is declared at the final topic or inherited
    /// there, without looking at descendants.
    pub fn allows_option(&self, flag: &str) -> bool {
        self.model.visible_option(self.final_topic, flag).is_some()
    }

    /// Value of the last occurrence of `flag`, if it appears with a value.
    pub fn get_option_str(&self, flag: &str) -> Option<&str> {
        self.option_occurrences(flag)
            .last()
            .and_then(|opt| opt.value.as_deref())
    }

    /// Boolean value of the last occurrence of `flag`: `Some(true)` for a
    /// bare flag, the parsed value for `--flag=value`, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::MalformedInvocation`] if the value is not a
    /// recognised boolean spelling.
    pub fn get_option_bool(&self, flag: &str) -> Result<Option<bool>, CommandError> {
        let Some(last) = self.option_occurrences(flag).last().copied() else {
            return Ok(None);
        };
        match last.value.as_deref() {
            None => Ok(Some(true)),
            Some(value) => parse_bool(value).map(Some).ok_or_else(|| {
                CommandError::MalformedInvocation(format!(
                    "option '{}' expects a boolean value, got '{value}'",
                    last.flag
                ))
            }),
        }
    }
}

/// Accepts the spellings Go's `strconv.ParseBool` accepts, which is what
/// cobra-based programs understand.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn is_option_syntax(arg: &str) -> bool {
    arg.starts_with('-') && arg != "-" && arg != "--"
}

/// Number of extra arguments an option word consumes, judged loosely in the
/// context reached so far. Unresolvable or ambiguous flags count as
/// valueless.
fn provisional_value_count(resolver: &OptionResolver<'_>, topic: TopicId, arg: &str) -> usize {
    if let Some(long) = arg.strip_prefix("--") {
        if long.contains('=') {
            return 0;
        }
        return match resolver.resolve_lenient(topic, arg) {
            Some(descriptor) if descriptor.has_value() => 1,
            _ => 0,
        };
    }

    let body = &arg[1..];
    for (pos, ch) in body.char_indices() {
        // `-y=false`: the rest is an inline value, never more flags.
        if ch == '=' && pos > 0 {
            return 0;
        }
        let flag = format!("-{ch}");
        match resolver.resolve_lenient(topic, &flag) {
            Some(descriptor) if descriptor.has_value() => {
                let rest = &body[pos + ch.len_utf8()..];
                return usize::from(rest.is_empty());
            }
            None if pos == 0 => return 0,
            _ => {}
        }
    }
    0
}

/// Pass one: returns the final topic and the argument positions that form
/// the sub-command path.
fn discover_path(model: &MetadataModel, args: &[String]) -> (TopicId, Vec<usize>) {
    let resolver = OptionResolver::new(model).allow_unknown(true);
    let mut topic = model.root_id();
    let mut positions = Vec::new();
    let mut idx = 0;

    while idx < args.len() {
        let arg = args[idx].as_str();
        if arg == "--" {
            break;
        }
        if is_option_syntax(arg) {
            idx += 1 + provisional_value_count(&resolver, topic, arg);
            continue;
        }
        match model.topic(topic).child(arg) {
            Some(child) => {
                topic = child;
                positions.push(idx);
                idx += 1;
            }
            None => break,
        }
    }
    (topic, positions)
}

fn take_value(
    args: &[String],
    idx: usize,
    flag: &str,
    path_positions: &[usize],
) -> Result<String, CommandError> {
    let Some(value) = args.get(idx) else {
        return Err(CommandError::MalformedInvocation(format!(
            "option '{flag}' requires a value"
        )));
    };
    if path_positions.contains(&idx) {
        return Err(CommandError::MalformedInvocation(format!(
            "option '{flag}' requires a value but is followed by sub-command '{value}'"
        )));
    }
    Ok(value.clone())
}

/// Pass two: classifies every argument in the context of the final topic.
fn classify(
    model: &MetadataModel,
    args: &[String],
    options: &ParseOptions,
) -> Result<Classification, CommandError> {
    let (final_topic, path_positions) = discover_path(model, args);
    let resolver = OptionResolver::new(model)
        .with_comparison(options.comparison)
        .allow_unknown(options.allow_unknown);

    let mut tokens = Vec::with_capacity(args.len());
    let mut subcommand_token_index = 0;
    let mut idx = 0;

    while idx < args.len() {
        let arg = args[idx].as_str();

        if path_positions.contains(&idx) {
            tokens.push(Token::Subcommand(arg.to_string()));
            subcommand_token_index = tokens.len();
            idx += 1;
        } else if arg == "--" {
            tokens.push(Token::Terminator);
            tokens.extend(args[idx + 1..].iter().cloned().map(Token::Positional));
            break;
        } else if arg.starts_with("--") {
            let (flag, attached) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (arg, None),
            };
            let descriptor = resolver.resolve(final_topic, flag)?;
            let token = match attached {
                Some(value) => OptionToken {
                    flag: flag.to_string(),
                    value: Some(value.to_string()),
                    style: ValueStyle::Attached,
                    descriptor,
                },
                None if descriptor.as_ref().is_some_and(|d| d.has_value()) => {
                    let value = take_value(args, idx + 1, flag, &path_positions)?;
                    idx += 1;
                    OptionToken {
                        flag: flag.to_string(),
                        value: Some(value),
                        style: ValueStyle::Separate,
                        descriptor,
                    }
                }
                None => OptionToken::bare(flag, descriptor),
            };
            tokens.push(Token::Option(token));
            idx += 1;
        } else if is_option_syntax(arg) {
            idx += classify_short_cluster(&resolver, final_topic, args, idx, &path_positions, &mut tokens)?;
        } else {
            tokens.push(Token::Positional(arg.to_string()));
            idx += 1;
        }
    }

    let mut option_index: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (pos, token) in tokens.iter().enumerate() {
        if let Token::Option(opt) = token {
            for synonym in opt.synonyms() {
                if options.forbidden.contains(&synonym) {
                    return Err(CommandError::MalformedInvocation(format!(
                        "option '{}' is not allowed here",
                        opt.flag
                    )));
                }
                option_index.entry(synonym).or_default().push(pos);
            }
        }
    }

    trace!(
        topic = %model.topic(final_topic).full_name(),
        tokens = tokens.len(),
        "Classified command line"
    );

    Ok(Classification {
        tokens,
        final_topic,
        subcommand_token_index,
        option_index,
    })
}

/// Expands `-abc` into single-character flags. Returns how many raw
/// arguments were consumed.
fn classify_short_cluster(
    resolver: &OptionResolver<'_>,
    topic: TopicId,
    args: &[String],
    idx: usize,
    path_positions: &[usize],
    tokens: &mut Vec<Token>,
) -> Result<usize, CommandError> {
    let arg = args[idx].as_str();
    let body = &arg[1..];

    for (pos, ch) in body.char_indices() {
        let flag = format!("-{ch}");
        let descriptor = resolver.resolve(topic, &flag)?;
        match descriptor {
            None if pos == 0 => {
                tokens.push(Token::Option(OptionToken::bare(arg, None)));
                return Ok(1);
            }
            Some(descriptor) if descriptor.has_value() => {
                let rest = &body[pos + ch.len_utf8()..];
                if rest.is_empty() {
                    let value = take_value(args, idx + 1, &flag, path_positions)?;
                    tokens.push(Token::Option(OptionToken {
                        flag,
                        value: Some(value),
                        style: ValueStyle::Separate,
                        descriptor: Some(descriptor),
                    }));
                    return Ok(2);
                }
                let value = rest.strip_prefix('=').unwrap_or(rest);
                tokens.push(Token::Option(OptionToken {
                    flag,
                    value: Some(value.to_string()),
                    style: ValueStyle::Attached,
                    descriptor: Some(descriptor),
                }));
                return Ok(1);
            }
            descriptor => {
                let rest = &body[pos + ch.len_utf8()..];
                match rest.strip_prefix('=') {
                    Some(value) => {
                        tokens.push(Token::Option(OptionToken {
                            flag,
                            value: Some(value.to_string()),
                            style: ValueStyle::Attached,
                            descriptor,
                        }));
                        return Ok(1);
                    }
                    None => tokens.push(Token::Option(OptionToken::bare(flag, descriptor))),
                }
            }
        }
    }
    Ok(1)
}
