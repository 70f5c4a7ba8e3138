// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Everything pipxdot does to the system goes through an external process.
//! Commands are described as an [`Invocation`], and executed by some
//! [`CommandRunner`]. The default runner is [`SystemRunner`], which spawns
//! real child processes.
//!
//! # Argument Vectors Over Shell Strings
//!
//! Package names come straight from user configuration. Interpolating them
//! into a shell command line would allow them to inject shell syntax. Thus,
//! most commands are built as argument vectors that are never re-parsed by a
//! shell. The only exception is a command that genuinely needs a pipeline,
//! which is expressed as a fixed shell script that receives its values as
//! positional parameters.

use crate::config::InstallOptions;

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, instrument};

/// Description of an external command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Spawn program directly with argument vector.
    Exec { program: PathBuf, args: Vec<OsString> },

    /// Run fixed script through `sh -c`.
    ///
    /// Arguments are bound to the positional parameters `$1`, `$2`, etc.
    Shell { script: String, args: Vec<OsString> },
}

impl Invocation {
    /// Construct new direct program invocation.
    pub fn exec(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self::Exec {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Construct new shell script invocation.
    pub fn shell(
        script: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self::Shell {
            script: script.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Arguments passed to program or script.
    pub fn args(&self) -> &[OsString] {
        match self {
            Self::Exec { args, .. } | Self::Shell { args, .. } => args.as_slice(),
        }
    }

    /// Arguments as lossy UTF-8 strings.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Check if invocation goes through the shell.
    pub fn is_shell(&self) -> bool {
        matches!(self, Self::Shell { .. })
    }

    fn to_command(&self) -> Command {
        match self {
            Self::Exec { program, args } => {
                let mut command = Command::new(program);
                command.args(args);
                command
            }
            Self::Shell { script, args } => {
                // INVARIANT: First argument after script becomes $0.
                let mut command = Command::new("sh");
                command.arg("-c").arg(script).arg("sh").args(args);
                command
            }
        }
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let mut words = Vec::new();
        match self {
            Self::Exec { program, .. } => {
                words.push(program.to_string_lossy().into_owned());
            }
            Self::Shell { script, .. } => {
                words.extend(["sh".into(), "-c".into(), quote(script)]);
            }
        }
        words.extend(self.args_lossy().iter().map(|arg| quote(arg)));

        fmt.write_str(words.join(" ").as_str())
    }
}

fn quote(word: &str) -> String {
    shlex::try_quote(word)
        .map(|quoted| quoted.into_owned())
        .unwrap_or_else(|_| word.to_string())
}

/// Execute external commands.
pub trait CommandRunner {
    /// Execute invocation inside working directory, and wait for it to finish.
    ///
    /// Each stream flagged in `options` is redirected to the null device for
    /// the duration of the call. Returns exit code of the child process. A
    /// non-zero exit code is a normal result.
    ///
    /// # Errors
    ///
    /// - Return [`SyscallError::Spawn`] if child process could not be spawned
    ///   or waited on.
    fn run(&self, invocation: &Invocation, cwd: &Path, options: &InstallOptions) -> Result<i32>;
}

/// Runner that spawns real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip(self, invocation, options), level = "debug")]
    fn run(&self, invocation: &Invocation, cwd: &Path, options: &InstallOptions) -> Result<i32> {
        debug!("run {invocation}");

        // INVARIANT: Null sinks live only as long as this call.
        let status = invocation
            .to_command()
            .current_dir(cwd)
            .stdin(stream(options.stdin))
            .stdout(stream(options.stdout))
            .stderr(stream(options.stderr))
            .status()
            .map_err(|source| SyscallError::Spawn {
                source,
                command: invocation.to_string(),
            })?;

        // INVARIANT: Termination by signal has no exit code.
        let code = status.code().unwrap_or(-1);
        debug!("exit code {code}: {invocation}");

        Ok(code)
    }
}

fn stream(suppress: bool) -> Stdio {
    if suppress {
        Stdio::null()
    } else {
        Stdio::inherit()
    }
}

/// Command execution error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Child process could not be spawned.
    #[error("failed to run {command}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
