use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use help_mirror_core::{MetadataModel, OptionResolver, ParseOptions, ParsedCommand, TopicNode};
use help_mirror_discovery::{MirrorConfig, load_or_build};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "help-mirror")]
#[command(about = "Mirror a cobra-style CLI's sub-command tree and rewrite its invocations")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Wrapped program; overrides the configured one.
    #[arg(long, global = true)]
    program: Option<PathBuf>,
    /// Metadata cache file; overrides the configured one.
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,
    /// Delete the metadata cache before loading.
    #[arg(long, global = true)]
    clean: bool,
    /// Concurrent help fetches while rebuilding the cache.
    #[arg(long, global = true)]
    jobs: Option<usize>,
    /// Keep unknown flags instead of failing.
    #[arg(long, global = true)]
    allow_unknown: bool,
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the sub-command tree.
    Dump(DumpArgs),
    /// List every sub-command and alias with its description.
    Subcommands(SubcommandsArgs),
    /// Classify an invocation of the wrapped program.
    Parse(ParseArgs),
    /// Apply option edits to an invocation and print the resulting arguments.
    Rewrite(RewriteArgs),
    /// Resolve a flag in the context of a sub-command.
    Resolve(ResolveArgs),
}

#[derive(Debug, Args)]
struct DumpArgs {
    /// Print the cache document instead of the tree.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct SubcommandsArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Arguments as they would be passed to the wrapped program.
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct RewriteArgs {
    /// Set an option, replacing existing occurrences (FLAG or FLAG=VALUE).
    #[arg(long = "set", value_name = "FLAG[=VALUE]", allow_hyphen_values = true)]
    set: Vec<String>,
    /// Remove every occurrence of an option.
    #[arg(long = "unset", value_name = "FLAG", allow_hyphen_values = true)]
    unset: Vec<String>,
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Space-separated sub-command path; empty for the main command.
    #[arg(long, default_value = "")]
    topic: String,
    #[arg(allow_hyphen_values = true)]
    flag: String,
}

const MAIN_COMMAND_NAME: &str = "<main>";

#[derive(Debug)]
struct SubcommandRow {
    name: String,
    description: String,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.global.log_level.parse().unwrap_or_default()),
        )
        .init();

    let result = load_model(&cli.global).and_then(|model| {
        let model = Arc::new(model);
        match cli.command {
            Command::Dump(args) => run_dump(&model, args),
            Command::Subcommands(args) => run_subcommands(&model, args),
            Command::Parse(args) => run_parse(model, &cli.global, args),
            Command::Rewrite(args) => run_rewrite(model, &cli.global, args),
            Command::Resolve(args) => run_resolve(&model, &cli.global, args),
        }
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn load_config(global: &GlobalArgs) -> Result<MirrorConfig, String> {
    let mut config = match (&global.config, &global.program) {
        (Some(path), _) => MirrorConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        (None, Some(program)) => MirrorConfig::new(program),
        (None, None) => return Err("either --config or --program is required".to_string()),
    };

    if let Some(program) = &global.program {
        config.program = program.clone();
    }
    if let Some(cache_file) = &global.cache_file {
        config.cache_file = Some(cache_file.clone());
    }
    if let Some(jobs) = global.jobs {
        config.jobs = jobs;
    }
    Ok(config)
}

fn load_model(global: &GlobalArgs) -> Result<MetadataModel, String> {
    let config = load_config(global)?;
    let cache = config.cache();

    if global.clean {
        let removed = cache.clear().map_err(|e| {
            format!("Failed to remove cache '{}': {e}", cache.path().display())
        })?;
        info!(path = %cache.path().display(), removed, "Cleaned metadata cache");
    }

    let source = config.help_source();
    let mut model = load_or_build(&source, Some(&cache), &config.build_options())
        .map_err(|e| e.to_string())?;
    config
        .apply_extra_options(&mut model)
        .map_err(|e| e.to_string())?;
    debug!(version = %model.version(), topics = model.len(), "Metadata model ready");
    Ok(model)
}

fn parse_options(global: &GlobalArgs) -> ParseOptions {
    ParseOptions {
        allow_unknown: global.allow_unknown,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// dump / subcommands
// ---------------------------------------------------------------------------

fn run_dump(model: &MetadataModel, args: DumpArgs) -> Result<(), String> {
    if args.json {
        let json = serde_json::to_string_pretty(&model.to_snapshot())
            .map_err(|e| format!("Failed to serialize model: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    println!("version: {}", model.version());
    for topic in model.iter_topics() {
        let depth = topic.path().len();
        let indent = "  ".repeat(depth);
        let name = if topic.is_root() {
            "<main command>".to_string()
        } else {
            topic.short_name().to_string()
        };
        print!("{indent}{name}");
        if !topic.aliases().is_empty() {
            print!(" ({})", topic.aliases().join(", "));
        }
        println!(": {}", topic.summary());
        for option in topic.options() {
            let marker = if topic.declares_persistent(option.canonical_flag()) {
                " [persistent]"
            } else {
                ""
            };
            println!("{indent}    {option}{marker}");
        }
    }
    Ok(())
}

/// Every topic and alias with its description, sorted by name. The main
/// command is listed as `<main>`.
fn subcommand_rows(model: &MetadataModel) -> Vec<SubcommandRow> {
    let mut rows = Vec::new();
    for topic in model.iter_topics() {
        let name = if topic.is_root() {
            MAIN_COMMAND_NAME.to_string()
        } else {
            topic.full_name()
        };
        rows.push(SubcommandRow {
            name,
            description: topic.summary().to_string(),
        });
        for alias in topic.aliases() {
            rows.push(SubcommandRow {
                name: alias_full_name(topic, alias),
                description: format!("Alias for '{}'", topic.full_name()),
            });
        }
    }
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

fn alias_full_name(topic: &TopicNode, alias: &str) -> String {
    let mut path = topic.path().to_vec();
    path.pop();
    path.push(alias.to_string());
    path.join(" ")
}

fn run_subcommands(model: &MetadataModel, args: SubcommandsArgs) -> Result<(), String> {
    let rows = subcommand_rows(model);
    if args.json {
        let map: BTreeMap<String, String> = rows
            .into_iter()
            .map(|row| (row.name, row.description))
            .collect();
        let json = serde_json::to_string_pretty(&map)
            .map_err(|e| format!("Failed to serialize sub-commands: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let width = rows
        .iter()
        .map(|row| row.name.len())
        .chain(std::iter::once("Command".len()))
        .max()
        .unwrap_or(0);
    println!("{:width$}  Description", "Command");
    println!("{}  {}", "-".repeat(width), "-".repeat("Description".len()));
    for row in rows {
        println!("{:width$}  {}", row.name, row.description);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// parse / rewrite / resolve
// ---------------------------------------------------------------------------

fn run_parse(model: Arc<MetadataModel>, global: &GlobalArgs, args: ParseArgs) -> Result<(), String> {
    let cmd = ParsedCommand::parse_with_options(model, args.args, parse_options(global))
        .map_err(|e| e.to_string())?;

    let path = cmd.final_subcommand_path();
    if path.is_empty() {
        println!("sub-command: <main command>");
    } else {
        println!("sub-command: {}", path.join(" "));
    }
    for (index, token) in cmd.tokens().iter().enumerate() {
        println!("  [{index}] {token}");
    }
    Ok(())
}

fn split_assignment(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (raw, None),
    }
}

fn run_rewrite(
    model: Arc<MetadataModel>,
    global: &GlobalArgs,
    args: RewriteArgs,
) -> Result<(), String> {
    let mut cmd = ParsedCommand::parse_with_options(model, args.args, parse_options(global))
        .map_err(|e| e.to_string())?;

    for flag in &args.unset {
        let removed = cmd.remove_option(flag).map_err(|e| e.to_string())?;
        debug!(flag = %flag, removed, "Unset option");
    }
    for raw in &args.set {
        let (flag, value) = split_assignment(raw);
        cmd.set_option(flag, value).map_err(|e| e.to_string())?;
    }

    let json = serde_json::to_string(&cmd.final_arg_list())
        .map_err(|e| format!("Failed to serialize arguments: {e}"))?;
    println!("{json}");
    Ok(())
}

fn run_resolve(model: &MetadataModel, global: &GlobalArgs, args: ResolveArgs) -> Result<(), String> {
    let path: Vec<&str> = args.topic.split_whitespace().collect();
    let topic = model
        .find_topic(&path)
        .ok_or_else(|| format!("unknown sub-command '{}'", args.topic))?;

    let resolver = OptionResolver::new(model).allow_unknown(global.allow_unknown);
    match resolver.resolve(topic, &args.flag) {
        Ok(Some(descriptor)) => {
            println!("{descriptor}");
            Ok(())
        }
        Ok(None) => {
            println!("{}: unknown", args.flag);
            Ok(())
        }
        Err(err) => Err(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("--stack=prod"), ("--stack", Some("prod")));
        assert_eq!(split_assignment("--yes"), ("--yes", None));
        assert_eq!(split_assignment("--message=a=b"), ("--message", Some("a=b")));
        assert_eq!(split_assignment("--message="), ("--message", Some("")));
    }

    #[test]
    fn test_cli_accepts_trailing_arguments() {
        let cli = Cli::try_parse_from([
            "help-mirror",
            "--program",
            "/opt/pulumi/bin/pulumi",
            "rewrite",
            "--set",
            "--stack=prod",
            "--unset",
            "-y",
            "--",
            "stack",
            "rm",
            "-y",
        ])
        .unwrap();
        match cli.command {
            Command::Rewrite(args) => {
                assert_eq!(args.set, vec!["--stack=prod"]);
                assert_eq!(args.unset, vec!["-y"]);
                assert_eq!(args.args, vec!["stack", "rm", "-y"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.global.program, Some(PathBuf::from("/opt/pulumi/bin/pulumi")));
    }
}
