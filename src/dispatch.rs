//! Resolve the invoked command, validate, initialize config once, run.

use std::ffi::OsString;
use std::io::Write;

use clap::error::ErrorKind;
use clap::ArgMatches;
use tracing::{debug, instrument};

use crate::cli::output;
use crate::command::{CommandNode, ARGS_ID};
use crate::config::{LoadOutcome, ProcessEnv, Resolver};
use crate::errors::{CommandError, CommandResult};
use crate::flags::{Flag, FlagSet};

/// Everything a command action gets to see.
pub struct ExecContext<'a> {
    path: Vec<String>,
    args: Vec<String>,
    flags: FlagSet,
    config: &'a Resolver,
    cli: &'a clap::Command,
    out: &'a mut dyn Write,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        path: Vec<String>,
        args: Vec<String>,
        flags: FlagSet,
        config: &'a Resolver,
        cli: &'a clap::Command,
        out: &'a mut dyn Write,
    ) -> Self {
        Self {
            path,
            args,
            flags,
            config,
            cli,
            out,
        }
    }

    /// Names from the root to the invoked command, space separated.
    pub fn command_path(&self) -> String {
        self.path.join(" ")
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn config(&self) -> &Resolver {
        self.config
    }

    /// The full clap definition, rooted at the top-level command.
    pub fn cli(&self) -> &clap::Command {
        self.cli
    }

    pub fn out(&mut self) -> &mut (dyn Write + 'a) {
        &mut *self.out
    }
}

pub struct Dispatcher {
    root: CommandNode,
    resolver: Resolver,
    env: ProcessEnv,
    cli: clap::Command,
}

impl Dispatcher {
    pub fn new(root: CommandNode, resolver: Resolver) -> Self {
        let cli = root.to_clap();
        Self {
            root,
            resolver,
            env: ProcessEnv::capture(),
            cli,
        }
    }

    pub fn with_env(mut self, env: ProcessEnv) -> Self {
        self.env = env;
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Parse `argv` (program name first) and run the matched command.
    ///
    /// Help and version requests are written to `out` and succeed.
    #[instrument(level = "debug", skip_all)]
    pub fn execute<I, T>(&mut self, argv: I, out: &mut dyn Write) -> CommandResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = match self.cli.try_get_matches_from_mut(argv) {
            Ok(matches) => matches,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                write!(out, "{}", e.render())?;
                return Ok(());
            }
            Err(e) => return Err(parse_error(&e)),
        };

        let (nodes, levels) = resolve_path(&self.root, &matches)?;
        let (node, leaf) = match (nodes.last(), levels.last()) {
            (Some(node), Some(leaf)) => (*node, *leaf),
            _ => return Err(CommandError::Parse("no command matched".into())),
        };

        let mut flags = FlagSet::new();
        for (level_node, own) in nodes.iter().zip(&levels) {
            let parsed = level_node
                .flags()
                .iter()
                .map(|spec| {
                    let source = if spec.is_persistent() { leaf } else { *own };
                    Flag::from_matches(spec, source)
                })
                .collect();
            flags.push_level(level_node.name(), parsed);
        }

        let args: Vec<String> = leaf
            .get_many::<String>(ARGS_ID)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        let path: Vec<String> = nodes.iter().map(|n| n.name().to_string()).collect();
        let command_path = path.join(" ");
        debug!(command = %command_path, ?args, "resolved command");

        // A top-level command with children treats a stray first argument as a
        // mistyped subcommand unless it declares its own argument policy.
        if nodes.len() == 1 && node.has_children() && node.policy().is_arbitrary() {
            if let Some(first) = args.first() {
                return Err(CommandError::CommandNotFound {
                    name: first.clone(),
                    parent: command_path,
                });
            }
        }
        node.policy().validate(&command_path, &args)?;

        match self.resolver.initialize(&self.env, &flags) {
            Some(LoadOutcome::Loaded(file)) => {
                output::notice(out, "Using config file", &file.display())?
            }
            Some(LoadOutcome::Skipped(reason)) => output::warning(out, reason)?,
            None => {}
        }

        let mut ctx = ExecContext::new(path, args, flags, &self.resolver, &self.cli, out);
        node.action().run(&mut ctx)
    }
}

/// Walk subcommand matches from the root, pairing each node with its matches.
fn resolve_path<'n, 'm>(
    root: &'n CommandNode,
    matches: &'m ArgMatches,
) -> CommandResult<(Vec<&'n CommandNode>, Vec<&'m ArgMatches>)> {
    let mut nodes = vec![root];
    let mut levels = vec![matches];
    let (mut node, mut current) = (root, matches);
    while let Some((name, sub)) = current.subcommand() {
        node = node.child(name).ok_or_else(|| CommandError::CommandNotFound {
            name: name.to_string(),
            parent: node.name().to_string(),
        })?;
        current = sub;
        nodes.push(node);
        levels.push(current);
    }
    Ok((nodes, levels))
}

/// First line of clap's rendering, without the `error: ` prefix.
fn parse_error(e: &clap::Error) -> CommandError {
    let rendered = e.render().to_string();
    let line = rendered.lines().next().unwrap_or_default();
    CommandError::Parse(line.trim_start_matches("error: ").to_string())
}
