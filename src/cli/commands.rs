use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::cli::output::bracketed;
use crate::command::{CommandNode, RunCommand};
use crate::config::Resolver;
use crate::dispatch::ExecContext;
use crate::errors::{CommandError, CommandResult};
use crate::flags::{FlagSet, FlagSpec};
use crate::validate::ArgPolicy;

pub const ROOT_NAME: &str = "root";

/// Values accepted by `args`.
pub const VALID_NAMES: [&str; 3] = ["xieyang", "yuyue", "yuyi"];

/// Shells `completion` can generate scripts for.
pub const SHELLS: [&str; 5] = ["bash", "elvish", "fish", "powershell", "zsh"];

/// The full demo tree: root plus `add`, `args`, `cusargs` and `completion`.
pub fn build_root() -> CommandNode {
    let mut root = CommandNode::new(ROOT_NAME, RootCmd)
        .short("short desc")
        .long("Long desc")
        .version(env!("CARGO_PKG_VERSION"))
        .flag(FlagSpec::boolean("viper", true).persistent().help("use Viper for configuration"))
        .flag(
            FlagSpec::string("author", "YOUR NAME")
                .short('a')
                .persistent()
                .help("author name for copyright attribution"),
        )
        .flag(
            FlagSpec::string("config", "")
                .persistent()
                .help("config file (default is $HOME/.cobra.yaml)"),
        )
        .flag(
            FlagSpec::string("license", "")
                .short('l')
                .persistent()
                .help("name of license for the project"),
        )
        .flag(FlagSpec::string("source", "").short('s').help("source directory to read from"));

    root.register(
        CommandNode::new("add", AddCmd)
            .alias("init")
            .short("short init")
            .long("Long init"),
    );
    root.register(
        CommandNode::new("args", ArgsCmd)
            .short("accept only known names")
            .args(ArgPolicy::only_valid(VALID_NAMES)),
    );
    root.register(
        CommandNode::new("cusargs", CusArgsCmd)
            .short("accept one or two arguments")
            .args(ArgPolicy::range(1, 2)),
    );
    root.register(
        CommandNode::new("completion", CompletionCmd)
            .short("generate the autocompletion script for the specified shell")
            .args(ArgPolicy::All(vec![
                ArgPolicy::exact(1),
                ArgPolicy::only_valid(SHELLS),
            ])),
    );
    root
}

/// Resolver with the demo's defaults and flag bindings.
pub fn build_resolver() -> Resolver {
    let mut resolver = Resolver::new();
    resolver.use_config_flag("config");
    resolver.bind_flag("author", "author");
    resolver.bind_flag("license", "license");
    resolver.set_default("author", "default author");
    resolver.set_default("license", "default license");
    resolver
}

/// Current values of `names`, space separated.
fn flag_line(flags: &FlagSet, names: &[&str]) -> CommandResult<String> {
    let values = names
        .iter()
        .map(|name| flags.lookup(name).map(|flag| flag.value().to_string()))
        .collect::<CommandResult<Vec<_>>>()?;
    Ok(values.join(" "))
}

pub struct RootCmd;

impl RunCommand for RootCmd {
    #[instrument(level = "debug", skip_all)]
    fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult<()> {
        let flags = flag_line(ctx.flags(), &["viper", "author", "config", "license", "source"])?;
        let author = ctx.config().get_string("author");
        let license = ctx.config().get_string("license");

        let out = ctx.out();
        writeln!(out, "root cmd run begin")?;
        writeln!(out, "{flags}")?;
        writeln!(out, "----------------------------------")?;
        writeln!(out, "{author}")?;
        writeln!(out, "{license}")?;
        writeln!(out, "root cmd run end")?;
        Ok(())
    }
}

pub struct AddCmd;

impl RunCommand for AddCmd {
    #[instrument(level = "debug", skip_all)]
    fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult<()> {
        let flags = ctx.flags();
        let line = [
            flags.lookup("viper")?.value().to_string(),
            flags.lookup("author")?.value().to_string(),
            flags.lookup("config")?.value().to_string(),
            ctx.config().get_string("author"),
            flags.lookup("license")?.value().to_string(),
            flags.lookup_in_parent("source")?.value().to_string(),
        ]
        .join(" ");

        let out = ctx.out();
        writeln!(out, "run init cmd begin")?;
        writeln!(out, "{line}")?;
        writeln!(out, "run init cmd end")?;
        Ok(())
    }
}

pub struct ArgsCmd;

impl RunCommand for ArgsCmd {
    fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult<()> {
        let args = bracketed(ctx.args());
        let out = ctx.out();
        writeln!(out, "args cmd run begin")?;
        writeln!(out, "received args: {args}")?;
        writeln!(out, "args cmd run end")?;
        Ok(())
    }
}

pub struct CusArgsCmd;

impl RunCommand for CusArgsCmd {
    fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult<()> {
        let args = bracketed(ctx.args());
        let out = ctx.out();
        writeln!(out, "run cusargs cmd begin")?;
        writeln!(out, "{args}")?;
        writeln!(out, "run cusargs cmd end")?;
        Ok(())
    }
}

pub struct CompletionCmd;

impl RunCommand for CompletionCmd {
    fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult<()> {
        let raw = ctx.args().first().cloned().unwrap_or_default();
        let shell: Shell = raw.parse().map_err(|_| CommandError::InvalidArgument {
            command: ctx.command_path(),
            arg: raw.clone(),
        })?;
        debug!(%shell, "generating completions");

        let mut cli = ctx.cli().clone();
        let bin_name = cli.get_name().to_string();
        generate(shell, &mut cli, bin_name, ctx.out());
        Ok(())
    }
}
