// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pipx plugin.
//!
//! Install Python applications through [pipx] from declarative
//! configuration. The plugin claims two directives:
//!
//! - `pipx`: install a list of package specifiers, skipping the ones that are
//!   already installed.
//! - `pipxfile`: replay pipxfiles exported by `pipx list --json`, installing,
//!   pinning, force reinstalling, or upgrading each package they describe.
//!
//! # Failure Handling
//!
//! Both directives always run through their entire payload. A package that
//! fails to install is logged and remembered, but never stops the remaining
//! packages from being processed. Only a pipxfile that cannot be loaded at
//! all aborts its directive.
//!
//! If the pipx executable cannot be found, then the plugin simply refuses to
//! claim any directive.
//!
//! [pipx]: https://pipx.pypa.io

pub mod install;
pub mod replay;

use crate::{
    config::InstallOptions,
    host::Context,
    path::locate_executable,
    plugin::{install::install_packages, replay::replay_pipxfiles},
    syscall::{CommandRunner, SystemRunner},
};

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Directive that installs a list of packages.
pub const PIPX_DIRECTIVE: &str = "pipx";

/// Directive that replays pipxfiles.
pub const PIPXFILE_DIRECTIVE: &str = "pipxfile";

/// Plugin interface between host and directive handlers.
pub trait Plugin {
    /// Check if plugin can handle target directive.
    fn can_handle(&self, directive: &str) -> bool;

    /// Handle directive with its payload.
    ///
    /// Returns true if every task of the directive succeeded.
    ///
    /// # Errors
    ///
    /// Return [`PluginError`] if the directive cannot be processed at all.
    fn handle(&self, directive: &str, payload: &Value) -> Result<bool>;
}

/// Plugin that installs packages through pipx.
#[derive(Debug)]
pub struct Pipx<'ctx, R = SystemRunner>
where
    R: CommandRunner,
{
    context: &'ctx Context,
    runner: R,
    executable: Option<PathBuf>,
}

impl<'ctx> Pipx<'ctx> {
    /// Construct new pipx plugin.
    ///
    /// Searches `PATH` for the pipx executable once, right here.
    pub fn new(context: &'ctx Context) -> Self {
        Self::with_runner(context, SystemRunner, locate_executable("pipx"))
    }
}

impl<'ctx, R> Pipx<'ctx, R>
where
    R: CommandRunner,
{
    /// Construct new pipx plugin with custom runner and executable.
    pub fn with_runner(context: &'ctx Context, runner: R, executable: Option<PathBuf>) -> Self {
        Self {
            context,
            runner,
            executable,
        }
    }

    /// Path to pipx executable, if found.
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Resolve install options for target directive.
    ///
    /// Built-in defaults first, then host defaults on top.
    pub fn install_options(&self, directive: &str) -> InstallOptions {
        let builtin = match directive {
            PIPXFILE_DIRECTIVE => InstallOptions::quiet(),
            _ => InstallOptions::inherit(),
        };

        match self.context.defaults(directive) {
            Some(layer) => builtin.merge(layer),
            None => builtin,
        }
    }
}

impl<R> Plugin for Pipx<'_, R>
where
    R: CommandRunner,
{
    fn can_handle(&self, directive: &str) -> bool {
        self.executable.is_some() && matches!(directive, PIPX_DIRECTIVE | PIPXFILE_DIRECTIVE)
    }

    #[instrument(skip(self, payload), level = "debug")]
    fn handle(&self, directive: &str, payload: &Value) -> Result<bool> {
        let executable = self
            .executable
            .as_deref()
            .ok_or(PluginError::MissingExecutable)?;
        let options = self.install_options(directive);
        debug!("install options for {directive:?}: {options:?}");

        let items = payload.as_array().ok_or_else(|| PluginError::Payload {
            directive: directive.to_string(),
            expect: "list",
        })?;

        let base = self.context.base_directory();
        match directive {
            PIPX_DIRECTIVE => Ok(install_packages(&self.runner, executable, base, items, &options)),
            PIPXFILE_DIRECTIVE => replay_pipxfiles(&self.runner, executable, base, items, &options),
            _ => Err(PluginError::UnknownDirective(directive.to_string())),
        }
    }
}

/// Result of installing a single package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Probe found package, nothing was done.
    AlreadyInstalled,

    /// Install command succeeded.
    Installed,

    /// Upgrade command succeeded.
    Upgraded,

    /// Package could not be installed.
    Failed,
}

impl InstallOutcome {
    /// Check if outcome counts as success.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Aggregate of install outcomes across a directive.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Report {
    failed: Vec<String>,
}

impl Report {
    /// Construct new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record outcome for item.
    pub fn record(&mut self, item: impl Into<String>, outcome: InstallOutcome) {
        if !outcome.is_success() {
            self.failed.push(item.into());
        }
    }

    /// Record failure for item.
    pub fn fail(&mut self, item: impl Into<String>) {
        self.failed.push(item.into());
    }

    /// Items that failed, in order of processing.
    pub fn failed(&self) -> &[String] {
        self.failed.as_slice()
    }

    /// Check if nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Plugin error types.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Pipx executable could not be found.
    #[error("pipx executable not found")]
    MissingExecutable,

    /// Directive is not handled by pipx plugin.
    #[error("pipx plugin cannot handle directive {0:?}")]
    UnknownDirective(String),

    /// Directive payload has wrong shape.
    #[error("payload of directive {directive:?} must be a {expect}")]
    Payload {
        directive: String,
        expect: &'static str,
    },

    /// Pipxfile cannot be loaded.
    #[error(transparent)]
    Manifest(#[from] crate::manifest::ManifestError),

    /// Pipxfile path cannot be expanded.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// Friendly result alias :3
pub type Result<T, E = PluginError> = std::result::Result<T, E>;


#[cfg(test)]
mod tests {
    use super::{testing::ScriptedRunner, *};
    use crate::config::OptionTable;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn can_handle_requires_executable() {
        let context = Context::new("/tmp");
        let found = Pipx::with_runner(&context, ScriptedRunner::new(|_| 0), Some("/bin/pipx".into()));
        assert!(found.can_handle("pipx"));
        assert!(found.can_handle("pipxfile"));
        assert!(!found.can_handle("brew"));

        let missing = Pipx::with_runner(&context, ScriptedRunner::new(|_| 0), None);
        assert!(!missing.can_handle("pipx"));
        assert!(!missing.can_handle("pipxfile"));
    }

    #[test]
    fn handle_rejects_misuse() {
        let context = Context::new("/tmp");
        let missing = Pipx::with_runner(&context, ScriptedRunner::new(|_| 0), None);
        assert!(matches!(
            missing.handle("pipx", &json!(["black"])),
            Err(PluginError::MissingExecutable)
        ));

        let found = Pipx::with_runner(&context, ScriptedRunner::new(|_| 0), Some("/bin/pipx".into()));
        assert!(matches!(
            found.handle("brew", &json!(["black"])),
            Err(PluginError::UnknownDirective(_))
        ));
        assert!(matches!(
            found.handle("pipx", &json!("black")),
            Err(PluginError::Payload { .. })
        ));
    }

    #[test]
    fn install_options_host_defaults_win() {
        let context = Context::new("/tmp").with_directive_defaults(
            "pipxfile",
            OptionTable::from([("stdout".to_string(), false)]),
        );
        let plugin = Pipx::with_runner(&context, ScriptedRunner::new(|_| 0), Some("/bin/pipx".into()));

        assert_eq!(plugin.install_options("pipx"), InstallOptions::inherit());
        assert_eq!(
            plugin.install_options("pipxfile"),
            InstallOptions {
                stdin: true,
                stdout: false,
                stderr: true,
            }
        );
    }

    #[test]
    fn handle_pipx_uses_merged_options() -> anyhow::Result<()> {
        let context = Context::new("/tmp").with_directive_defaults(
            "pipx",
            OptionTable::from([("stderr".to_string(), true)]),
        );
        let runner = ScriptedRunner::new(|inv| if inv.is_shell() { 1 } else { 0 });
        let plugin = Pipx::with_runner(&context, runner, Some("/bin/pipx".into()));

        assert!(plugin.handle("pipx", &json!(["flake8"]))?);

        let calls = plugin.runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, InstallOptions::quiet());
        assert_eq!(
            calls[1].1,
            InstallOptions {
                stdin: false,
                stdout: false,
                stderr: true,
            }
        );

        Ok(())
    }

    #[test]
    fn report_collects_failures() {
        let mut report = Report::new();
        report.record("black", InstallOutcome::AlreadyInstalled);
        report.record("ruff", InstallOutcome::Failed);
        report.record("flake8", InstallOutcome::Upgraded);
        report.fail("broken.json");

        assert!(!report.is_success());
        assert_eq!(report.failed(), ["ruff", "broken.json"]);
    }
}
