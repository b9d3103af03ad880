//! CLI layer: the demo command set and the process-level entry point

pub mod commands;
pub mod output;

use std::ffi::OsString;
use std::io::Write;

pub use commands::{build_resolver, build_root};

use crate::config::ProcessEnv;
use crate::dispatch::Dispatcher;
use crate::exitcode;

/// Run the demo tree against `argv` and return the process exit code.
pub fn run<I, T>(argv: I, out: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    run_with_env(argv, ProcessEnv::capture(), out)
}

/// Like [`run`], reading home directory and environment from `env`.
///
/// Errors are printed as one line to `out`; they never panic or abort.
pub fn run_with_env<I, T>(argv: I, env: ProcessEnv, out: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut dispatcher = Dispatcher::new(build_root(), build_resolver()).with_env(env);
    match dispatcher.execute(argv, out) {
        Ok(()) => exitcode::OK,
        Err(e) => {
            tracing::debug!("command failed: {e:?}");
            // stdout may already be gone; the exit code still reports the failure
            let _ = output::error(out, &e);
            e.exit_code()
        }
    }
}
