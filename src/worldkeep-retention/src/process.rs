//! External process invocation for archivers and renderers.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

use crate::{RetentionError, Result};

/// Runs an external program with an argument vector.
///
/// Arguments are passed straight to the program, never through a shell.
pub trait ProcessRunner {
    fn execute(&self, program: &str, args: &[OsString]) -> io::Result<ExitStatus>;
}

/// Runs programs as child processes and waits for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn execute(&self, program: &str, args: &[OsString]) -> io::Result<ExitStatus> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status()
    }
}

/// Program plus argument template with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Substitute placeholders argument by argument.
    ///
    /// An argument that is exactly one placeholder receives the path
    /// unchanged; placeholders embedded in a longer argument are replaced
    /// with the path's lossy string form.
    pub fn expand(&self, vars: &[(&str, &Path)]) -> Vec<OsString> {
        self.args
            .iter()
            .map(|arg| {
                for (name, value) in vars {
                    if arg.strip_prefix('{').and_then(|a| a.strip_suffix('}')) == Some(*name) {
                        return value.as_os_str().to_os_string();
                    }
                }

                let mut expanded = arg.clone();
                for (name, value) in vars {
                    let placeholder = format!("{{{}}}", name);
                    if expanded.contains(&placeholder) {
                        expanded = expanded.replace(&placeholder, &value.to_string_lossy());
                    }
                }
                OsString::from(expanded)
            })
            .collect()
    }

    /// Expand and run; anything but a successful exit is an error.
    pub fn run(&self, runner: &dyn ProcessRunner, vars: &[(&str, &Path)]) -> Result<()> {
        let args = self.expand(vars);
        debug!(program = %self.program, args = ?args, "Running external command");

        let status = runner
            .execute(&self.program, &args)
            .map_err(|source| RetentionError::CommandSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(RetentionError::CommandFailed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}
