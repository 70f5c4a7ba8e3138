// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Single package installation.
//!
//! Handles the `pipx` directive. Each package specifier is probed first, and
//! only installed if pipx does not already list it.
//!
//! # Package Specifiers
//!
//! A package specifier names a package, optionally followed by extra
//! arguments for `pipx install`, e.g., `black --python python3.12`. The
//! specifier may also be a URL like `git+https://github.com/psf/black`. The
//! bare __package name__ is the first word of the specifier, minus any
//! leading path up to its last `/`. Paths in the trailing arguments never
//! affect it, e.g., `black --python /usr/bin/python3.12` still names `black`.

use crate::{
    config::InstallOptions,
    plugin::{InstallOutcome, Report},
    syscall::{CommandRunner, Invocation},
};

use regex::Regex;
use serde_json::Value;
use std::{ffi::OsStr, path::Path, sync::LazyLock};
use tracing::{debug, error, info, instrument, warn};

/// Probe exits with zero if pipx lists package `$2`.
///
/// `$1` is the pipx executable. Values are never interpolated into the
/// script itself. The first field of each listed line is compared literally
/// and case-insensitively, so `.` or `[` in a package name match only
/// themselves.
pub const PROBE_SCRIPT: &str =
    r#""$1" list --short | cut -d ' ' -f 1 | grep -q -i -x -F -- "$2""#;

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\S*/)?([^\s/]+)(?:\s.*)?$").expect("valid package name pattern")
});

/// Extract bare package name from package specifier.
pub fn package_name(specifier: &str) -> Option<&str> {
    PACKAGE_NAME
        .captures(specifier)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
}

/// Install single packages through pipx.
#[derive(Debug)]
pub struct PackageInstaller<'a, R>
where
    R: CommandRunner,
{
    runner: &'a R,
    executable: &'a Path,
    cwd: &'a Path,
}

impl<'a, R> PackageInstaller<'a, R>
where
    R: CommandRunner,
{
    /// Construct new package installer.
    pub fn new(runner: &'a R, executable: &'a Path, cwd: &'a Path) -> Self {
        Self {
            runner,
            executable,
            cwd,
        }
    }

    /// Command that checks if package is already installed.
    pub fn probe_command(&self, package_name: &str) -> Invocation {
        Invocation::shell(PROBE_SCRIPT, [self.executable.as_os_str(), OsStr::new(package_name)])
    }

    /// Command that installs package specifier.
    ///
    /// Returns `None` if the specifier has unbalanced quoting.
    pub fn install_command(&self, specifier: &str) -> Option<Invocation> {
        let words = shlex::split(specifier)?;
        Some(Invocation::exec(
            self.executable,
            std::iter::once("install".to_string()).chain(words),
        ))
    }

    /// Install package specifier unless it is already installed.
    ///
    /// The probe always runs with every stream suppressed. The install
    /// command uses the given options.
    #[instrument(skip(self, options), level = "debug")]
    pub fn install(&self, specifier: &str, options: &InstallOptions) -> InstallOutcome {
        if specifier.trim().is_empty() {
            error!("cannot process blank package name");
            return InstallOutcome::Failed;
        }

        let Some(name) = package_name(specifier) else {
            error!("cannot extract package name from {specifier:?}");
            return InstallOutcome::Failed;
        };

        let probe = self.probe_command(name);
        match self.runner.run(&probe, self.cwd, &InstallOptions::quiet()) {
            Ok(0) => {
                debug!("{specifier} already installed");
                return InstallOutcome::AlreadyInstalled;
            }
            Ok(_) => {}
            Err(err) => warn!("cannot probe {name}: {err:?}"),
        }

        let Some(command) = self.install_command(specifier) else {
            error!("package specifier {specifier:?} has unbalanced quotes");
            return InstallOutcome::Failed;
        };

        info!("installing {specifier}");
        match self.runner.run(&command, self.cwd, options) {
            Ok(0) => InstallOutcome::Installed,
            Ok(code) => {
                warn!("failed to install [{specifier}], exit code {code}");
                InstallOutcome::Failed
            }
            Err(err) => {
                warn!("failed to install [{specifier}]: {err:?}");
                InstallOutcome::Failed
            }
        }
    }
}

/// Install every package specifier of a `pipx` directive payload.
///
/// Items that are not strings are logged and counted as failures. Returns true
/// if every package is installed afterwards.
#[instrument(skip_all, level = "debug")]
pub fn install_packages<R>(
    runner: &R,
    executable: &Path,
    cwd: &Path,
    items: &[Value],
    options: &InstallOptions,
) -> bool
where
    R: CommandRunner,
{
    let installer = PackageInstaller::new(runner, executable, cwd);
    let mut report = Report::new();

    for item in items {
        let Some(specifier) = item.as_str() else {
            error!("invalid package specifier: {item}");
            report.fail(item.to_string());
            continue;
        };

        let outcome = installer.install(specifier, options);
        if !outcome.is_success() {
            error!("some packages were not installed");
        }
        report.record(specifier, outcome);
    }

    if report.is_success() {
        info!("all pipx packages have been installed");
    } else {
        warn!("failed to install: {}", report.failed().join(", "));
    }

    report.is_success()
}
