//! Command tree: named nodes owning flags, an argument policy and an action.

use clap::{Arg, ArgAction};

use crate::dispatch::ExecContext;
use crate::errors::CommandResult;
use crate::flags::FlagSpec;
use crate::validate::ArgPolicy;

/// Id of the positional slot every command carries.
pub const ARGS_ID: &str = "args";

/// Body of a command, invoked after validation and config initialization.
pub trait RunCommand {
    fn run(&self, ctx: &mut ExecContext<'_>) -> CommandResult<()>;
}

pub struct CommandNode {
    name: String,
    short: String,
    long: String,
    version: Option<String>,
    aliases: Vec<String>,
    flags: Vec<FlagSpec>,
    policy: ArgPolicy,
    action: Box<dyn RunCommand>,
    children: Vec<CommandNode>,
}

impl CommandNode {
    pub fn new(name: impl Into<String>, action: impl RunCommand + 'static) -> Self {
        Self {
            name: name.into(),
            short: String::new(),
            long: String::new(),
            version: None,
            aliases: Vec::new(),
            flags: Vec::new(),
            policy: ArgPolicy::default(),
            action: Box::new(action),
            children: Vec::new(),
        }
    }

    pub fn short(mut self, text: impl Into<String>) -> Self {
        self.short = text.into();
        self
    }

    pub fn long(mut self, text: impl Into<String>) -> Self {
        self.long = text.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn flag(mut self, spec: FlagSpec) -> Self {
        self.flags.push(spec);
        self
    }

    pub fn args(mut self, policy: ArgPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach `child`; persistent flags of `self` become visible to it.
    pub fn register(&mut self, child: CommandNode) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> &[FlagSpec] {
        &self.flags
    }

    pub fn policy(&self) -> &ArgPolicy {
        &self.policy
    }

    pub fn action(&self) -> &dyn RunCommand {
        self.action.as_ref()
    }

    pub fn children(&self) -> &[CommandNode] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Direct child by name or alias.
    pub fn child(&self, name: &str) -> Option<&CommandNode> {
        self.children
            .iter()
            .find(|c| c.name == name || c.aliases.iter().any(|a| a == name))
    }

    /// Descend through children following `path` (names below `self`).
    pub fn find(&self, path: &[&str]) -> Option<&CommandNode> {
        path.iter()
            .try_fold(self, |node, name| node.child(name))
    }

    /// Build the clap command for this node and its subtree.
    pub fn to_clap(&self) -> clap::Command {
        let mut cmd = clap::Command::new(self.name.clone());
        if !self.short.is_empty() {
            cmd = cmd.about(self.short.clone());
        }
        if !self.long.is_empty() {
            cmd = cmd.long_about(self.long.clone());
        }
        if let Some(version) = &self.version {
            cmd = cmd.version(version.clone());
        }
        if !self.aliases.is_empty() {
            cmd = cmd.visible_aliases(self.aliases.clone());
        }
        for spec in &self.flags {
            cmd = cmd.arg(spec.to_arg());
        }
        cmd = cmd.arg(
            Arg::new(ARGS_ID)
                .action(ArgAction::Append)
                .num_args(0..)
                .value_name("ARGS"),
        );
        for child in &self.children {
            cmd = cmd.subcommand(child.to_clap());
        }
        cmd
    }
}

impl std::fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("flags", &self.flags)
            .field("policy", &self.policy)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
