//! Flag declarations and the parsed, per-invocation flag view.
//!
//! A [`FlagSpec`] is registered on a command node. Persistent specs are turned
//! into clap global args so every descendant accepts them. After parsing, the
//! dispatcher builds a [`FlagSet`] with one level per command on the invoked
//! path; lookups walk from the invoked command up through ancestors.

use std::collections::BTreeMap;
use std::fmt;

use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches};

use crate::errors::{CommandError, CommandResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagScope {
    /// Only the declaring command accepts the flag.
    Local,
    /// The declaring command and all its descendants accept the flag.
    Persistent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            FlagValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::Str(s) => Some(s),
            FlagValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{b}"),
            FlagValue::Str(s) => f.write_str(s),
        }
    }
}

/// Declaration of a named, typed flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    name: String,
    shorthand: Option<char>,
    default: FlagValue,
    scope: FlagScope,
    help: String,
}

impl FlagSpec {
    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(name.into(), FlagValue::Str(default.into()))
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name.into(), FlagValue::Bool(default))
    }

    fn new(name: String, default: FlagValue) -> Self {
        Self {
            name,
            shorthand: None,
            default,
            scope: FlagScope::Local,
            help: String::new(),
        }
    }

    pub fn short(mut self, letter: char) -> Self {
        self.shorthand = Some(letter);
        self
    }

    pub fn persistent(mut self) -> Self {
        self.scope = FlagScope::Persistent;
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = text.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shorthand(&self) -> Option<char> {
        self.shorthand
    }

    pub fn default_value(&self) -> &FlagValue {
        &self.default
    }

    pub fn scope(&self) -> FlagScope {
        self.scope
    }

    pub fn is_persistent(&self) -> bool {
        self.scope == FlagScope::Persistent
    }

    /// Build the clap argument for this declaration.
    ///
    /// No clap default is set: an absent value means "not supplied" and the
    /// declared default is applied when the [`Flag`] is materialized.
    /// Boolean flags take an optional `=value`, so `--viper` means true and
    /// `--viper=false` switches a true default off.
    pub fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name.clone())
            .long(self.name.clone())
            .global(self.is_persistent());
        if let Some(letter) = self.shorthand {
            arg = arg.short(letter);
        }

        let default = self.default.to_string();
        let help = match (self.help.is_empty(), default.is_empty()) {
            (true, true) => None,
            (true, false) => Some(format!("[default: {default}]")),
            (false, true) => Some(self.help.clone()),
            (false, false) => Some(format!("{} [default: {default}]", self.help)),
        };
        if let Some(help) = help {
            arg = arg.help(help);
        }

        match self.default {
            FlagValue::Bool(_) => arg
                .action(ArgAction::Set)
                .value_parser(value_parser!(bool))
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true"),
            FlagValue::Str(_) => arg
                .action(ArgAction::Set)
                .value_parser(value_parser!(String))
                .value_name("STRING"),
        }
    }
}

/// A declared flag together with its value for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    spec: FlagSpec,
    value: FlagValue,
    changed: bool,
}

impl Flag {
    pub fn new(spec: FlagSpec, value: FlagValue, changed: bool) -> Self {
        Self {
            spec,
            value,
            changed,
        }
    }

    /// Flag holding its declared default, as if never supplied.
    pub fn unchanged(spec: FlagSpec) -> Self {
        let value = spec.default.clone();
        Self::new(spec, value, false)
    }

    /// Read the flag out of clap matches, falling back to the declared default.
    pub fn from_matches(spec: &FlagSpec, matches: &ArgMatches) -> Self {
        let changed = matches!(
            matches.value_source(spec.name()),
            Some(ValueSource::CommandLine)
        );
        let value = match &spec.default {
            FlagValue::Bool(default) => FlagValue::Bool(
                matches
                    .get_one::<bool>(spec.name())
                    .copied()
                    .unwrap_or(*default),
            ),
            FlagValue::Str(default) => FlagValue::Str(
                matches
                    .get_one::<String>(spec.name())
                    .cloned()
                    .unwrap_or_else(|| default.clone()),
            ),
        };
        Self::new(spec.clone(), value, changed)
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn spec(&self) -> &FlagSpec {
        &self.spec
    }

    pub fn value(&self) -> &FlagValue {
        &self.value
    }

    /// True when the value came from the command line.
    pub fn changed(&self) -> bool {
        self.changed
    }
}

#[derive(Debug, Clone, Default)]
struct Level {
    command: String,
    flags: BTreeMap<String, Flag>,
}

/// Parsed flags along the invoked command path, root first.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    levels: Vec<Level>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the flags declared on the next command of the path.
    pub fn push_level(&mut self, command: impl Into<String>, flags: Vec<Flag>) {
        self.levels.push(Level {
            command: command.into(),
            flags: flags
                .into_iter()
                .map(|flag| (flag.name().to_string(), flag))
                .collect(),
        });
    }

    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Look a flag up as seen by the invoked command.
    pub fn lookup(&self, name: &str) -> CommandResult<&Flag> {
        self.lookup_at(self.depth(), name)
    }

    /// Look a flag up as seen by the parent of the invoked command.
    pub fn lookup_in_parent(&self, name: &str) -> CommandResult<&Flag> {
        match self.depth() {
            0 => Err(self.not_found(0, name)),
            depth => self.lookup_at(depth - 1, name),
        }
    }

    /// Own flags of the command at `depth` first, then persistent flags of its
    /// ancestors, nearest first.
    pub fn lookup_at(&self, depth: usize, name: &str) -> CommandResult<&Flag> {
        let Some(level) = self.levels.get(depth) else {
            return Err(self.not_found(depth, name));
        };
        if let Some(flag) = level.flags.get(name) {
            return Ok(flag);
        }
        self.levels[..depth]
            .iter()
            .rev()
            .filter_map(|ancestor| ancestor.flags.get(name))
            .find(|flag| flag.spec().is_persistent())
            .ok_or_else(|| self.not_found(depth, name))
    }

    /// Every flag on the path that was supplied on the command line.
    pub fn changed(&self) -> impl Iterator<Item = &Flag> {
        self.levels
            .iter()
            .flat_map(|level| level.flags.values())
            .filter(|flag| flag.changed())
    }

    fn not_found(&self, depth: usize, name: &str) -> CommandError {
        let end = (depth + 1).min(self.levels.len());
        let command = self.levels[..end]
            .iter()
            .map(|level| level.command.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        CommandError::FlagNotFound {
            command,
            flag: name.to_string(),
        }
    }
}
