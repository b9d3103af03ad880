//! End-to-end dispatch through the demo tree with an injected home directory
//! and environment, capturing everything the commands print.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use cmdlayer::cli::{self, build_resolver, build_root};
use cmdlayer::config::CONFIG_FILE_NAME;
use cmdlayer::util::testing;
use cmdlayer::{
    ArgPolicy, CommandError, CommandNode, CommandResult, Dispatcher, ExecContext, FlagSpec,
    ProcessEnv, Resolver, RunCommand,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

#[fixture]
fn home() -> TempDir {
    TempDir::new().expect("temp home")
}

fn env_for(home: &TempDir) -> ProcessEnv {
    ProcessEnv::default().with_home(home.path())
}

fn run(argv: &[&str], env: ProcessEnv) -> (i32, String) {
    let mut buf = Vec::new();
    let code = cli::run_with_env(argv.iter().copied(), env, &mut buf);
    (code, String::from_utf8(buf).expect("utf8 output"))
}

// ============================================================
// Argument validation through the dispatcher
// ============================================================

#[rstest]
fn given_valid_names_when_args_then_action_prints_them(home: TempDir) {
    let (code, out) = run(&["root", "args", "xieyang", "yuyi"], env_for(&home));

    assert_eq!(code, 0, "output: {out}");
    assert!(out.contains("args cmd run begin"));
    assert!(out.contains("received args: [xieyang yuyi]"));
    assert!(out.contains("args cmd run end"));
}

#[rstest]
fn given_unknown_name_when_args_then_error_and_action_skipped(home: TempDir) {
    let (code, out) = run(&["root", "args", "foo"], env_for(&home));

    assert_eq!(code, cmdlayer::exitcode::USAGE);
    assert!(out.contains("invalid argument \"foo\" for \"root args\""));
    assert!(!out.contains("args cmd run begin"));
    assert_eq!(out.lines().count(), 1, "single error line: {out}");
}

#[rstest]
#[case(&["root", "cusargs"], false, "too few arguments")]
#[case(&["root", "cusargs", "a"], true, "[a]")]
#[case(&["root", "cusargs", "a", "b"], true, "[a b]")]
#[case(&["root", "cusargs", "a", "b", "c"], false, "too many arguments")]
fn given_argument_count_when_cusargs_then_range_enforced(
    home: TempDir,
    #[case] argv: &[&str],
    #[case] runs: bool,
    #[case] expected: &str,
) {
    let (code, out) = run(argv, env_for(&home));

    assert_eq!(code == 0, runs, "output: {out}");
    assert!(out.contains(expected), "output: {out}");
    assert_eq!(out.contains("run cusargs cmd begin"), runs);
}

#[rstest]
fn given_unknown_subcommand_when_root_then_command_not_found(home: TempDir) {
    let (code, out) = run(&["root", "nope"], env_for(&home));

    assert_eq!(code, cmdlayer::exitcode::USAGE);
    assert!(out.contains("unknown command \"nope\" for \"root\""));
    assert!(!out.contains("root cmd run begin"));
}

#[rstest]
fn given_unknown_flag_when_root_then_parse_error_line(home: TempDir) {
    let (code, out) = run(&["root", "--bogus"], env_for(&home));

    assert_eq!(code, cmdlayer::exitcode::USAGE);
    assert!(out.contains("--bogus"), "output: {out}");
    assert_eq!(out.lines().count(), 1, "single error line: {out}");
}

// ============================================================
// Config layering through the dispatcher
// ============================================================

#[rstest]
fn given_no_config_file_when_root_then_action_runs_with_defaults(home: TempDir) {
    let (code, out) = run(&["root"], env_for(&home));

    assert_eq!(code, 0, "output: {out}");
    assert!(out.contains("config file not found"));
    let lines: Vec<&str> = out.lines().collect();
    let begin = lines
        .iter()
        .position(|l| *l == "root cmd run begin")
        .expect("action ran");
    assert_eq!(lines[begin + 1], "true YOUR NAME   ");
    assert_eq!(lines[begin + 3], "default author");
    assert_eq!(lines[begin + 4], "default license");
    assert_eq!(lines[begin + 5], "root cmd run end");
}

#[rstest]
fn given_home_config_when_root_then_file_values_used(home: TempDir) {
    let path = home.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "author: File Author\nlicense: MIT\n").unwrap();

    let (code, out) = run(&["root"], env_for(&home));

    assert_eq!(code, 0);
    assert!(out.contains("Using config file"));
    assert!(out.contains(&path.display().to_string()));
    assert!(out.contains("\nFile Author\nMIT\n"), "output: {out}");
}

#[rstest]
fn given_author_flag_when_file_and_env_define_author_then_flag_wins(home: TempDir) {
    fs::write(home.path().join(CONFIG_FILE_NAME), "author: File Author\n").unwrap();
    let env = env_for(&home).with_var("AUTHOR", "Env Author");

    let (code, out) = run(&["root", "--author=Alice"], env);

    assert_eq!(code, 0);
    assert!(out.contains("true Alice   "), "output: {out}");
    assert!(out.contains("\nAlice\n"), "output: {out}");
    assert!(!out.contains("Env Author"));
}

#[rstest]
fn given_env_var_when_no_flag_then_env_overrides_file(home: TempDir) {
    fs::write(home.path().join(CONFIG_FILE_NAME), "license: MIT\n").unwrap();
    let env = env_for(&home).with_var("LICENSE", "Apache-2.0");

    let (_, out) = run(&["root"], env);

    assert!(out.contains("\nApache-2.0\n"), "output: {out}");
}

#[rstest]
fn given_null_author_in_file_and_empty_env_when_root_then_defaults_fill_in(home: TempDir) {
    fs::write(home.path().join(CONFIG_FILE_NAME), "author:\nlicense: MIT\n").unwrap();
    let env = env_for(&home).with_var("LICENSE", "");

    let (code, out) = run(&["root"], env);

    assert_eq!(code, 0);
    assert!(out.contains("\ndefault author\nMIT\n"), "output: {out}");
}

#[rstest]
fn given_broken_config_when_root_then_reported_and_action_still_runs(home: TempDir) {
    fs::write(home.path().join(CONFIG_FILE_NAME), "author: [oops\n").unwrap();

    let (code, out) = run(&["root"], env_for(&home));

    assert_eq!(code, 0);
    assert!(out.contains("cannot parse config file"), "output: {out}");
    assert!(out.contains("root cmd run begin"));
    assert!(out.contains("\ndefault author\n"));
}

#[rstest]
fn given_explicit_config_flag_when_add_then_path_and_value_visible(home: TempDir) {
    let custom = home.path().join("custom.yaml");
    fs::write(&custom, "author: Custom\n").unwrap();
    let custom_arg = format!("--config={}", custom.display());

    let (code, out) = run(&["root", "-s", "src", "add", &custom_arg], env_for(&home));

    assert_eq!(code, 0, "output: {out}");
    assert!(out.contains("run init cmd begin"));
    assert!(
        out.contains(&format!("true YOUR NAME {} Custom  src", custom.display())),
        "output: {out}"
    );
}

#[rstest]
fn given_init_alias_when_invoked_then_add_runs(home: TempDir) {
    let (code, out) = run(&["root", "init", "-l", "MIT"], env_for(&home));

    assert_eq!(code, 0, "output: {out}");
    assert!(out.contains("run init cmd begin"));
    assert!(out.contains("default author MIT "), "output: {out}");
}

#[rstest]
fn given_help_flag_when_root_then_help_written_and_success(home: TempDir) {
    let (code, out) = run(&["root", "--help"], env_for(&home));

    assert_eq!(code, 0);
    assert!(out.contains("cusargs"));
    assert!(out.contains("--author"));
}

#[rstest]
fn given_completion_without_shell_when_run_then_too_few(home: TempDir) {
    let (code, out) = run(&["root", "completion"], env_for(&home));

    assert_eq!(code, cmdlayer::exitcode::USAGE);
    assert!(out.contains("too few arguments"));
}

// ============================================================
// Framework behavior with a custom tree
// ============================================================

/// Records the flag values and args it was run with.
#[derive(Clone, Default)]
struct Probe {
    seen: Rc<RefCell<Vec<String>>>,
}

impl RunCommand for Probe {
    fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult<()> {
        let mut seen = self.seen.borrow_mut();
        seen.push(ctx.command_path());
        seen.push(ctx.flags().lookup("token")?.value().to_string());
        seen.push(ctx.config().get_string("token"));
        seen.extend(ctx.args().iter().cloned());
        Ok(())
    }
}

fn probe_tree(probe: &Probe) -> CommandNode {
    let mut root = CommandNode::new("tool", probe.clone())
        .flag(FlagSpec::string("token", "none").short('t').persistent());
    let mut remote = CommandNode::new("remote", probe.clone());
    remote.register(CommandNode::new("add", probe.clone()).args(ArgPolicy::exact(1)));
    root.register(remote);
    root
}

fn probe_resolver() -> Resolver {
    let mut resolver = Resolver::new();
    resolver.bind_flag("token", "token");
    resolver
}

#[rstest]
fn given_persistent_flag_on_root_when_nested_command_runs_then_visible(home: TempDir) {
    let probe = Probe::default();
    let mut dispatcher = Dispatcher::new(probe_tree(&probe), probe_resolver()).with_env(env_for(&home));
    let mut buf = Vec::new();

    dispatcher
        .execute(["tool", "remote", "add", "-t", "secret", "origin"], &mut buf)
        .expect("execute");

    assert_eq!(
        *probe.seen.borrow(),
        vec!["tool remote add", "secret", "secret", "origin"]
    );
}

#[rstest]
fn given_persistent_flag_before_subcommand_when_run_then_traverses(home: TempDir) {
    let probe = Probe::default();
    let mut dispatcher = Dispatcher::new(probe_tree(&probe), probe_resolver()).with_env(env_for(&home));
    let mut buf = Vec::new();

    dispatcher
        .execute(["tool", "--token", "early", "remote"], &mut buf)
        .expect("execute");

    assert_eq!(*probe.seen.borrow(), vec!["tool remote", "early", "early"]);
}

#[rstest]
fn given_unsupplied_bound_flag_when_no_default_then_flag_default_resolves(home: TempDir) {
    let probe = Probe::default();
    let mut dispatcher = Dispatcher::new(probe_tree(&probe), probe_resolver()).with_env(env_for(&home));
    let mut buf = Vec::new();

    dispatcher.execute(["tool", "remote"], &mut buf).expect("execute");

    assert_eq!(*probe.seen.borrow(), vec!["tool remote", "none", "none"]);
}

#[rstest]
fn given_failing_validator_when_execute_then_error_returned_and_probe_untouched(home: TempDir) {
    let probe = Probe::default();
    let mut dispatcher = Dispatcher::new(probe_tree(&probe), probe_resolver()).with_env(env_for(&home));
    let mut buf = Vec::new();

    let err = dispatcher
        .execute(["tool", "remote", "add"], &mut buf)
        .unwrap_err();

    assert!(matches!(err, CommandError::TooFewArguments { .. }));
    assert!(probe.seen.borrow().is_empty());
    assert!(!dispatcher.resolver().is_initialized());
}

#[rstest]
fn given_two_executions_when_same_dispatcher_then_config_initialized_once(home: TempDir) {
    let probe = Probe::default();
    let mut dispatcher = Dispatcher::new(probe_tree(&probe), probe_resolver()).with_env(env_for(&home));
    let mut first = Vec::new();
    let mut second = Vec::new();

    dispatcher.execute(["tool", "-t", "a"], &mut first).expect("first");
    dispatcher.execute(["tool", "-t", "b"], &mut second).expect("second");

    let first = String::from_utf8(first).unwrap();
    let second = String::from_utf8(second).unwrap();
    assert!(first.contains("config file not found"));
    assert!(second.is_empty(), "no second load report: {second}");
    assert_eq!(
        *probe.seen.borrow(),
        vec!["tool", "a", "a", "tool", "b", "a"]
    );
}

#[test]
fn given_demo_tree_when_built_then_names_and_policies_match() {
    let root = build_root();
    assert_eq!(root.name(), "root");
    let names: Vec<&str> = root.children().iter().map(CommandNode::name).collect();
    assert_eq!(names, vec!["add", "args", "cusargs", "completion"]);
    assert_eq!(
        root.find(&["cusargs"]).map(|c| c.policy().clone()),
        Some(ArgPolicy::range(1, 2))
    );
    assert!(build_resolver().keys().contains("author"));
}
