//! Behavioural properties of parsing and rewriting over a small pulumi-like
//! topic tree.

use std::sync::Arc;

use help_mirror_core::*;

fn build_model() -> MetadataModel {
    let stack_flag = OptionDescriptor::new(["--stack", "-s"], Some("string"), "The name of the stack");
    let color_flag = OptionDescriptor::new(["--color"], Some("string"), "Colorize output");
    let yes_flag = OptionDescriptor::boolean(["--yes", "-y"], "Automatically approve");

    let mut builder = ModelBuilder::new("v3.100.0");
    builder
        .add_topic(
            Vec::<String>::new(),
            TopicDraft {
                title: "Pulumi - Modern Infrastructure as Code".to_string(),
                options: vec![DeclaredOption::local(color_flag.clone())],
                ..Default::default()
            },
        )
        .unwrap();
    builder
        .add_topic(
            ["stack"],
            TopicDraft {
                options: vec![DeclaredOption::local(stack_flag.clone())],
                inherited_options: vec![color_flag.clone()],
                ..Default::default()
            },
        )
        .unwrap();
    builder
        .add_topic(
            ["stack", "rm"],
            TopicDraft {
                aliases: vec!["remove".to_string()],
                options: vec![
                    DeclaredOption::local(OptionDescriptor::boolean(
                        ["--preserve-config"],
                        "Do not delete the stack configuration",
                    )),
                    DeclaredOption::local(yes_flag.clone()),
                ],
                inherited_options: vec![color_flag.clone(), stack_flag.clone()],
                ..Default::default()
            },
        )
        .unwrap();
    builder
        .add_topic(
            ["stack", "ls"],
            TopicDraft {
                options: vec![DeclaredOption::local(OptionDescriptor::boolean(
                    ["--all", "-a"],
                    "List all stacks",
                ))],
                inherited_options: vec![color_flag.clone(), stack_flag],
                ..Default::default()
            },
        )
        .unwrap();
    builder
        .add_topic(
            ["up"],
            TopicDraft {
                aliases: vec!["update".to_string()],
                options: vec![
                    DeclaredOption::local(yes_flag),
                    DeclaredOption::local(OptionDescriptor::new(
                        ["--target", "-t"],
                        Some("stringArray"),
                        "Specify a single resource URN to update",
                    )),
                ],
                inherited_options: vec![color_flag.clone()],
                ..Default::default()
            },
        )
        .unwrap();
    builder
        .add_topic(
            ["refresh"],
            TopicDraft {
                options: vec![DeclaredOption::local(OptionDescriptor::boolean(
                    ["--target", "-t"],
                    "Refresh only the targeted resources",
                ))],
                inherited_options: vec![color_flag],
                ..Default::default()
            },
        )
        .unwrap();
    builder.build().unwrap()
}

fn model() -> Arc<MetadataModel> {
    Arc::new(build_model())
}

fn sample_invocations() -> Vec<Vec<&'static str>> {
    vec![
        vec!["stack", "rm", "--preserve-config", "x"],
        vec!["stack", "remove", "-ys", "dev"],
        vec!["--color", "never", "stack", "ls", "-a"],
        vec!["update", "-t", "urn:a", "--target=urn:b", "--yes"],
        vec!["refresh", "-t", "--color=auto"],
        vec!["stack", "--stack=prod", "rm", "--", "-y"],
        vec!["stack", "rm", "-s=", "-y=false"],
        vec!["stack", "rm", "-s==x"],
        vec![],
    ]
}

// -----------------------------------------------------------------------------
// Scenarios
// -----------------------------------------------------------------------------

#[test]
fn test_scenario_trailing_word_is_positional() {
    let cmd = ParsedCommand::parse(model(), ["stack", "rm", "--preserve-config", "x"]).unwrap();
    assert_eq!(cmd.final_subcommand_path(), vec!["stack", "rm"]);

    let occurrence = cmd.option_occurrences("--preserve-config")[0];
    assert!(!occurrence.descriptor.as_ref().unwrap().has_value());
    assert_eq!(occurrence.value, None);
    assert_eq!(cmd.positional_args(), vec!["x"]);
}

#[test]
fn test_scenario_set_option_after_path() {
    let mut cmd = ParsedCommand::parse(model(), ["stack", "rm", "--preserve-config", "x"]).unwrap();
    cmd.set_option("--stack", Some("prod")).unwrap();
    assert_eq!(
        cmd.final_arg_list(),
        vec!["stack", "rm", "--stack", "prod", "--preserve-config", "x"]
    );
}

// -----------------------------------------------------------------------------
// Properties
// -----------------------------------------------------------------------------

#[test]
fn test_reparse_is_idempotent() {
    let model = model();
    for args in sample_invocations() {
        let first = ParsedCommand::parse(Arc::clone(&model), args.clone()).unwrap();
        let again = ParsedCommand::parse(Arc::clone(&model), first.final_arg_list()).unwrap();
        assert_eq!(again.final_arg_list(), first.final_arg_list(), "args: {args:?}");
        assert_eq!(again.tokens(), first.tokens(), "args: {args:?}");
    }
}

#[test]
fn test_alias_transparency() {
    let model = model();
    let by_alias = ParsedCommand::parse(Arc::clone(&model), ["stack", "remove", "-y"]).unwrap();
    let by_name = ParsedCommand::parse(Arc::clone(&model), ["stack", "rm", "-y"]).unwrap();
    assert_eq!(by_alias.final_subcommand_path(), by_name.final_subcommand_path());
    assert_eq!(by_alias.final_topic_id(), by_name.final_topic_id());

    let up = ParsedCommand::parse(model, ["update"]).unwrap();
    assert_eq!(up.final_subcommand_path(), vec!["up"]);
    assert_eq!(up.final_arg_list(), vec!["update"]);
}

#[test]
fn test_persistent_options_resolve_in_every_descendant() {
    let model = build_model();
    let resolver = OptionResolver::new(&model);
    for topic in model.iter_topics() {
        let declared: Vec<_> = topic
            .options()
            .iter()
            .filter(|opt| topic.declares_persistent(opt.canonical_flag()))
            .cloned()
            .collect();
        for descendant in model.descendants(topic.id()) {
            for opt in &declared {
                for flag in opt.flags() {
                    let resolved = resolver.resolve(descendant, flag).unwrap().unwrap();
                    assert_eq!(*resolved, **opt);
                }
            }
        }
    }
}

#[test]
fn test_sibling_arity_conflict_is_ambiguous() {
    let model = build_model();
    let err = OptionResolver::new(&model)
        .resolve(model.root_id(), "--target")
        .unwrap_err();
    assert_eq!(
        err,
        CommandError::AmbiguousOption {
            flag: "--target".to_string(),
            topic: "<main command>".to_string(),
            paths: vec!["refresh".to_string(), "up".to_string()],
        }
    );

    // The same conflict surfaces when parsing a command with no leaf yet.
    let err = ParsedCommand::parse(Arc::new(model), ["-t", "x"]).unwrap_err();
    assert!(matches!(err, CommandError::AmbiguousOption { .. }));
}

#[test]
fn test_descendant_search_classifies_prefix_commands() {
    let cmd = ParsedCommand::parse(model(), ["stack", "-y"]).unwrap();
    assert_eq!(cmd.final_subcommand_path(), vec!["stack"]);
    assert!(cmd.has_option("--yes"));
    assert!(!cmd.allows_option("--yes"));
}

#[test]
fn test_remove_then_set_leaves_one_occurrence() {
    let mut cmd = ParsedCommand::parse(
        model(),
        ["stack", "rm", "-s", "a", "x", "--stack=b", "-ys", "c"],
    )
    .unwrap();

    assert!(cmd.remove_option("--stack").unwrap());
    assert!(!cmd.has_option("-s"));
    assert!(!cmd.remove_option("-s").unwrap());

    cmd.set_option("-s", Some("prod")).unwrap();
    let occurrences = cmd.option_occurrences("--stack");
    assert_eq!(occurrences.len(), 1);
    assert_eq!(occurrences[0].value.as_deref(), Some("prod"));
    assert_eq!(cmd.subcommand_token_index(), 2);
    assert_eq!(cmd.tokens()[2].as_option().unwrap().flag, "-s");
    assert_eq!(
        cmd.final_arg_list(),
        vec!["stack", "rm", "-s", "prod", "x", "-y"]
    );
}

#[test]
fn test_failed_mutation_leaves_command_unchanged() {
    let mut cmd = ParsedCommand::parse(model(), ["stack", "rm", "--stack", "dev"]).unwrap();
    let before = cmd.final_arg_list();

    let err = cmd.set_option("--stack", None).unwrap_err();
    assert!(matches!(err, CommandError::MalformedInvocation(_)));
    assert_eq!(cmd.final_arg_list(), before);

    let err = cmd.set_option("--bogus", Some("1")).unwrap_err();
    assert!(matches!(err, CommandError::UnknownOption { .. }));
    assert_eq!(cmd.final_arg_list(), before);
}

#[test]
fn test_boolean_helpers() {
    let mut cmd = ParsedCommand::parse(model(), ["up", "-y", "--yes=false"]).unwrap();
    assert_eq!(cmd.get_option_bool("--yes"), Ok(Some(false)));
    assert_eq!(cmd.take_option_bool("-y"), Ok(Some(false)));
    assert_eq!(cmd.final_arg_list(), vec!["up"]);
    assert_eq!(cmd.take_option_bool("-y"), Ok(None));

    cmd.set_option_bool("-y", false).unwrap();
    assert_eq!(cmd.final_arg_list(), vec!["up", "--yes=false"]);
    cmd.set_option_bool("--yes", true).unwrap();
    assert_eq!(cmd.final_arg_list(), vec!["up", "--yes"]);
}

#[test]
fn test_insert_keeps_existing_occurrences() {
    let mut cmd = ParsedCommand::parse(model(), ["up", "--target", "a"]).unwrap();
    cmd.insert_option("-t", Some("b")).unwrap();
    assert_eq!(cmd.final_arg_list(), vec!["up", "-t", "b", "--target", "a"]);
    assert_eq!(cmd.get_option_str("--target"), Some("a"));

    assert_eq!(cmd.take_option_str("-t"), Ok(Some("a".to_string())));
    assert!(!cmd.has_option("--target"));
}

#[test]
fn test_wrapper_option_injected_at_root() {
    let mut model = build_model();
    model
        .add_option_by_name(
            "",
            OptionDescriptor::boolean(["--raw-pulumi"], "Pass the command through unmodified"),
            true,
        )
        .unwrap();

    let mut cmd = ParsedCommand::parse(Arc::new(model), ["stack", "ls", "--raw-pulumi"]).unwrap();
    assert!(cmd.allows_option("--raw-pulumi"));
    assert_eq!(cmd.take_option_bool("--raw-pulumi"), Ok(Some(true)));
    assert_eq!(cmd.final_arg_list(), vec!["stack", "ls"]);
}

#[test]
fn test_restored_model_rewrites_identically() {
    let built = model();
    let json = serde_json::to_string(&built.to_snapshot()).unwrap();
    let snapshot: ModelSnapshot = serde_json::from_str(&json).unwrap();
    assert!(validate_snapshot(&snapshot).is_empty());
    let restored = Arc::new(MetadataModel::from_snapshot(&snapshot).unwrap());

    for args in sample_invocations() {
        let mut a = ParsedCommand::parse(Arc::clone(&built), args.clone()).unwrap();
        let mut b = ParsedCommand::parse(Arc::clone(&restored), args.clone()).unwrap();
        assert_eq!(a.final_arg_list(), b.final_arg_list(), "args: {args:?}");

        a.set_option("--color", Some("always")).unwrap();
        b.set_option("--color", Some("always")).unwrap();
        assert_eq!(a.final_arg_list(), b.final_arg_list(), "args: {args:?}");
    }
}
