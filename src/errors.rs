use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a command before (or while) its action runs.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("too few arguments for \"{command}\": requires at least {min}, received {received}")]
    TooFewArguments {
        command: String,
        min: usize,
        received: usize,
    },

    #[error("too many arguments for \"{command}\": accepts at most {max}, received {received}")]
    TooManyArguments {
        command: String,
        max: usize,
        received: usize,
    },

    #[error("invalid argument \"{arg}\" for \"{command}\"")]
    InvalidArgument { command: String, arg: String },

    #[error("unknown command \"{name}\" for \"{parent}\"")]
    CommandNotFound { name: String, parent: String },

    #[error("flag accessed but not defined: {flag} for \"{command}\"")]
    FlagNotFound { command: String, flag: String },

    #[error("{0}")]
    Parse(String),

    #[error("write output: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// True for the too-few / too-many family.
    pub fn is_argument_count(&self) -> bool {
        matches!(
            self,
            CommandError::TooFewArguments { .. } | CommandError::TooManyArguments { .. }
        )
    }

    /// Exit code reported by the binary for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Io(_) => crate::exitcode::IOERR,
            _ => crate::exitcode::USAGE,
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Problems locating or reading the config file. Never fatal.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("cannot determine home directory")]
    NoHomeDir,

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("cannot assemble configuration: {0}")]
    Build(#[from] config::ConfigError),
}
