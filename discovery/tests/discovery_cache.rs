//! Discovery and caching over recorded pulumi help pages.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use help_mirror_core::{CommandError, OptionResolver, ParsedCommand};
use help_mirror_discovery::{
    BuildOptions, ExtraOption, MapHelpSource, MetadataCache, MirrorConfig, build_model,
    load_or_build,
};

const TOPICS: &[&str] = &["", "refresh", "stack", "stack ls", "stack rm", "stack select", "up"];

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/pulumi")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

fn fixture_name(full_name: &str) -> String {
    if full_name.is_empty() {
        "root.txt".to_string()
    } else {
        format!("{}.txt", full_name.replace(' ', "-"))
    }
}

fn pulumi_source(version: &str) -> MapHelpSource {
    TOPICS.iter().fold(MapHelpSource::new(version), |source, topic| {
        source.with_page(topic, fixture(&fixture_name(topic)))
    })
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[test]
fn builds_full_tree_from_recorded_help() {
    let source = pulumi_source("v3.100.0");
    let model = build_model(&source, &BuildOptions::default()).unwrap();

    assert_eq!(model.len(), TOPICS.len());
    assert_eq!(source.fetch_count(), TOPICS.len());
    let names: Vec<String> = model.iter_topics().map(|t| t.full_name()).collect();
    assert_eq!(names, TOPICS);

    let root = model.root();
    assert_eq!(root.title(), "Pulumi - Modern Infrastructure as Code");
    for flag in ["--color", "-C", "--non-interactive", "--verbose"] {
        assert!(root.declares_persistent(flag), "{flag} should be persistent at the root");
    }
    assert!(!root.declares_persistent("--help"));

    let stack = model.topic_by_full_name("stack").unwrap();
    assert!(stack.declares_persistent("--stack"));
    assert!(!stack.declares_persistent("--show-ids"));

    let select = model.topic_by_full_name("stack select").unwrap();
    assert_eq!(
        select.examples(),
        "  pulumi stack select dev\n  pulumi stack select --create prod"
    );
    let secrets = select.local_option("--secrets-provider").unwrap();
    assert!(secrets.description().contains('\n'));

    let up = model.topic_by_full_name("up").unwrap();
    assert_eq!(up.aliases(), ["update"]);
    assert_eq!(up.parent_description(), Some("Create or update the resources in a stack"));
}

#[test]
fn parallel_discovery_matches_sequential() {
    let sequential = build_model(&pulumi_source("v1"), &BuildOptions::default()).unwrap();
    let parallel = build_model(
        &pulumi_source("v1"),
        &BuildOptions {
            jobs: 3,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(parallel.to_snapshot(), sequential.to_snapshot());
}

#[test]
fn root_flags_resolve_through_descendants() {
    let model = build_model(&pulumi_source("v1"), &BuildOptions::default()).unwrap();
    let resolver = OptionResolver::new(&model);

    // Every sub-command that declares -s agrees on its meaning.
    let stack = resolver.resolve(model.root_id(), "-s").unwrap().unwrap();
    assert_eq!(stack.canonical_flag(), "--stack");

    match resolver.resolve(model.root_id(), "-y") {
        Err(CommandError::AmbiguousOption { paths, .. }) => {
            assert_eq!(paths, vec!["refresh", "stack rm", "up"]);
        }
        other => panic!("expected ambiguity, got {other:?}"),
    }
}

#[test]
fn parses_invocations_against_recorded_tree() {
    let model = Arc::new(build_model(&pulumi_source("v1"), &BuildOptions::default()).unwrap());

    let cmd = ParsedCommand::parse(
        Arc::clone(&model),
        ["-C", "/srv/infra", "stack", "rm", "-s", "dev", "--yes"],
    )
    .unwrap();
    assert_eq!(cmd.final_subcommand_path(), ["stack", "rm"]);
    assert_eq!(cmd.get_option_str("--cwd"), Some("/srv/infra"));
    assert_eq!(cmd.get_option_str("--stack"), Some("dev"));
    assert_eq!(cmd.get_option_bool("-y").unwrap(), Some(true));

    let cmd = ParsedCommand::parse(Arc::clone(&model), ["update", "-t", "urn:a", "-t", "urn:b"]).unwrap();
    assert_eq!(cmd.final_subcommand_path(), ["up"]);
    assert_eq!(cmd.option_occurrences("--target").len(), 2);
    assert_eq!(cmd.get_option_str("--target"), Some("urn:b"));
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[test]
fn second_load_uses_cache_without_fetching_help() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MetadataCache::new(dir.path().join("help_metadata.json"));

    let first_source = pulumi_source("v3.100.0");
    let built = load_or_build(&first_source, Some(&cache), &BuildOptions::default()).unwrap();
    assert_eq!(first_source.fetch_count(), TOPICS.len());
    assert!(cache.path().exists());

    let second_source = pulumi_source("v3.100.0");
    let cached = load_or_build(&second_source, Some(&cache), &BuildOptions::default()).unwrap();
    assert_eq!(second_source.fetch_count(), 0);
    assert_eq!(cached.to_snapshot(), built.to_snapshot());
}

#[test]
fn version_change_forces_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MetadataCache::new(dir.path().join("help_metadata.json"));

    load_or_build(&pulumi_source("v3.100.0"), Some(&cache), &BuildOptions::default()).unwrap();

    let upgraded = pulumi_source("v3.101.0");
    let model = load_or_build(&upgraded, Some(&cache), &BuildOptions::default()).unwrap();
    assert_eq!(upgraded.fetch_count(), TOPICS.len());
    assert_eq!(model.version(), "v3.101.0");

    let raw = fs::read_to_string(cache.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["version"], "v3.101.0");
}

#[test]
fn corrupt_cache_is_rebuilt_and_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("help_metadata.json");
    fs::write(&path, "{\"version\": \"v1\", \"help_data\": ").unwrap();
    let cache = MetadataCache::new(&path);

    let source = pulumi_source("v1");
    load_or_build(&source, Some(&cache), &BuildOptions::default()).unwrap();
    assert_eq!(source.fetch_count(), TOPICS.len());
    assert!(cache.load("v1").is_some());
}

#[test]
fn unwritable_cache_does_not_fail_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "").unwrap();
    let cache = MetadataCache::new(blocker.join("help_metadata.json"));

    let model = load_or_build(&pulumi_source("v1"), Some(&cache), &BuildOptions::default()).unwrap();
    assert_eq!(model.len(), TOPICS.len());
}

#[test]
fn cached_and_rebuilt_models_rewrite_identically() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MetadataCache::new(dir.path().join("help_metadata.json"));

    let fresh = Arc::new(load_or_build(&pulumi_source("v1"), Some(&cache), &BuildOptions::default()).unwrap());
    let cached = Arc::new(cache.load("v1").unwrap());

    for invocation in [
        args(&["stack", "rm", "dev", "-f"]),
        args(&["--color", "never", "up", "-m", "deploy", "-y"]),
        args(&["stack", "ls", "--json", "--", "-a"]),
        args(&["refresh", "-t", "--non-interactive"]),
    ] {
        let mut a = ParsedCommand::parse(Arc::clone(&fresh), &invocation).unwrap();
        let mut b = ParsedCommand::parse(Arc::clone(&cached), &invocation).unwrap();
        assert_eq!(a.final_arg_list(), b.final_arg_list());
        assert_eq!(a.final_subcommand_path(), b.final_subcommand_path());

        a.set_option_str("--stack", "prod").unwrap();
        b.set_option_str("--stack", "prod").unwrap();
        assert_eq!(a.final_arg_list(), b.final_arg_list());
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn extra_options_are_visible_after_loading() {
    let mut config = MirrorConfig::new("/opt/pulumi/bin/pulumi");
    config.extra_options.push(ExtraOption {
        topic: String::new(),
        flags: vec!["--raw-pulumi".to_string()],
        description: "Run pulumi without rewriting arguments".to_string(),
        value_name: None,
        persistent: true,
    });

    let mut model = build_model(&pulumi_source("v1"), &config.build_options()).unwrap();
    config.apply_extra_options(&mut model).unwrap();
    let model = Arc::new(model);

    let mut cmd = ParsedCommand::parse(model, ["stack", "select", "--raw-pulumi", "dev"]).unwrap();
    assert!(cmd.allows_option("--raw-pulumi"));
    assert_eq!(cmd.take_option_bool("--raw-pulumi").unwrap(), Some(true));
    assert_eq!(cmd.final_arg_list(), args(&["stack", "select", "dev"]));
}

#[test]
fn extra_option_for_unknown_topic_is_an_error() {
    let mut config = MirrorConfig::new("/opt/pulumi/bin/pulumi");
    config.extra_options.push(ExtraOption {
        topic: "stack nope".to_string(),
        flags: vec!["--x".to_string()],
        description: String::new(),
        value_name: None,
        persistent: false,
    });

    let mut model = build_model(&pulumi_source("v1"), &BuildOptions::default()).unwrap();
    let err = config.apply_extra_options(&mut model).unwrap_err();
    assert!(err.to_string().contains("stack nope"), "{err}");
}
