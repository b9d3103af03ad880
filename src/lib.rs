//! Command tree with positional-argument validation and layered configuration.
//!
//! A root [`CommandNode`] owns flags, an [`ArgPolicy`] and an action; children
//! are attached with [`CommandNode::register`]. The [`Dispatcher`] parses the
//! process arguments through clap, validates the positional arguments of the
//! matched command, initializes the [`Resolver`] once (defaults, config file,
//! environment, supplied flags) and hands an [`ExecContext`] to the action.

pub mod cli;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod exitcode;
pub mod flags;
pub mod util;
pub mod validate;

pub use command::{CommandNode, RunCommand};
pub use config::{LoadOutcome, ProcessEnv, Resolver};
pub use dispatch::{Dispatcher, ExecContext};
pub use errors::{CommandError, CommandResult, ConfigLoadError};
pub use flags::{Flag, FlagScope, FlagSet, FlagSpec, FlagValue};
pub use validate::ArgPolicy;
