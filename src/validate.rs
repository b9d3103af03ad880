//! Positional-argument policies, checked before a command's action runs.

use tracing::trace;

use crate::errors::{CommandError, CommandResult};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArgPolicy {
    /// Any number of arguments with any value.
    #[default]
    Arbitrary,
    /// Between `min` and `max` arguments, inclusive.
    Range { min: usize, max: usize },
    /// Every argument must be one of the listed values.
    OnlyValid(Vec<String>),
    /// All inner policies must pass; the first failure is reported.
    All(Vec<ArgPolicy>),
}

impl ArgPolicy {
    pub fn exact(n: usize) -> Self {
        ArgPolicy::Range { min: n, max: n }
    }

    pub fn range(min: usize, max: usize) -> Self {
        ArgPolicy::Range { min, max }
    }

    pub fn only_valid<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgPolicy::OnlyValid(values.into_iter().map(Into::into).collect())
    }

    pub fn is_arbitrary(&self) -> bool {
        matches!(self, ArgPolicy::Arbitrary)
    }

    /// Check `args` for the command identified by `command` (its full path).
    pub fn validate(&self, command: &str, args: &[String]) -> CommandResult<()> {
        trace!(command, ?args, policy = ?self, "validating arguments");
        match self {
            ArgPolicy::Arbitrary => Ok(()),
            ArgPolicy::Range { min, .. } if args.len() < *min => {
                Err(CommandError::TooFewArguments {
                    command: command.to_string(),
                    min: *min,
                    received: args.len(),
                })
            }
            ArgPolicy::Range { max, .. } if args.len() > *max => {
                Err(CommandError::TooManyArguments {
                    command: command.to_string(),
                    max: *max,
                    received: args.len(),
                })
            }
            ArgPolicy::Range { .. } => Ok(()),
            ArgPolicy::OnlyValid(valid) => match args.iter().find(|arg| !valid.contains(arg)) {
                Some(arg) => Err(CommandError::InvalidArgument {
                    command: command.to_string(),
                    arg: arg.clone(),
                }),
                None => Ok(()),
            },
            ArgPolicy::All(policies) => policies
                .iter()
                .try_for_each(|policy| policy.validate(command, args)),
        }
    }
}
