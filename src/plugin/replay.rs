// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pipxfile replay.
//!
//! Handles the `pipxfile` directive. Every package recorded in a pipxfile is
//! installed again, subject to the override policies of the pipxfile
//! reference:
//!
//! - __force__: pass `--force` to reinstall the package even if present.
//! - __lock__: pin the package to the version recorded in the pipxfile.
//! - __upgrade__: try `pipx upgrade` first, and fall back to `pipx install`
//!   if the upgrade fails.
//!
//! Locking and upgrading the same package makes no sense. A pipxfile
//! reference that does so for every package is skipped entirely, and a
//! package that ends up both locked and upgraded is skipped and counted as a
//! failure.

use crate::{
    config::{expand_path, InstallOptions, PipxfileRef, Policies},
    manifest::{ManifestEntry, PipxManifest},
    plugin::{InstallOutcome, Report, Result},
    syscall::{CommandRunner, Invocation},
};

use serde_json::Value;
use std::path::Path;
use tracing::{error, info, instrument, warn};

/// Override flags resolved for a single package.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overrides {
    pub force: bool,
    pub lock: bool,
    pub upgrade: bool,
}

impl Overrides {
    /// Resolve override policies for target package name.
    pub fn resolve(policies: &Policies, package: &str) -> Self {
        Self {
            force: policies.force.resolve(package),
            lock: policies.lock.resolve(package),
            upgrade: policies.upgrade.resolve(package),
        }
    }
}

/// Build pipx arguments for manifest entry, minus the subcommand.
pub fn pipx_args(entry: &ManifestEntry, overrides: &Overrides) -> Vec<String> {
    let mut args = vec![entry.specifier(overrides.lock)];

    if overrides.force {
        args.push("--force".into());
    }

    if entry.include_dependencies {
        args.push("--include-deps".into());
    }

    // INVARIANT: Pipx takes every pip argument as one value.
    if !entry.pip_args.is_empty() {
        args.push("--pip-args".into());
        args.push(entry.pip_args.join(" "));
    }

    args
}

/// Replay pipxfiles through pipx.
pub struct Replayer<'a, R>
where
    R: CommandRunner,
{
    runner: &'a R,
    executable: &'a Path,
    base: &'a Path,
    options: &'a InstallOptions,
    report: Report,
}

impl<'a, R> Replayer<'a, R>
where
    R: CommandRunner,
{
    /// Construct new pipxfile replayer.
    ///
    /// Relative pipxfile paths are resolved against `base`, which is also the
    /// working directory of every pipx command.
    pub fn new(
        runner: &'a R,
        executable: &'a Path,
        base: &'a Path,
        options: &'a InstallOptions,
    ) -> Self {
        Self {
            runner,
            executable,
            base,
            options,
            report: Report::new(),
        }
    }

    /// Replay one pipxfile reference.
    ///
    /// # Errors
    ///
    /// - Return [`PluginError::Config`](crate::plugin::PluginError::Config)
    ///   if path expansion fails.
    /// - Return [`PluginError::Manifest`](crate::plugin::PluginError::Manifest)
    ///   if pipxfile cannot be loaded.
    #[instrument(skip(self), level = "debug")]
    pub fn replay(&mut self, reference: &PipxfileRef) -> Result<()> {
        let policies = reference.policies();
        let path = reference.path();

        if policies.lock.is_always() && policies.upgrade.is_always() {
            error!("cannot lock and upgrade packages at the same time");
            self.report.fail(path.display().to_string());
            return Ok(());
        }

        info!("installing pipx packages from file {}", path.display());
        let manifest = PipxManifest::load(self.base.join(expand_path(path)?))?;

        for entry in &manifest.entries {
            let outcome = self.replay_entry(entry, &policies);
            self.report.record(entry.package_or_url.as_str(), outcome);
        }

        Ok(())
    }

    /// Record invalid pipxfile reference as failure.
    pub fn reject(&mut self, item: &Value) {
        error!("invalid pipxfile: {item}");
        self.report.fail(item.to_string());
    }

    /// Replay single manifest entry.
    pub fn replay_entry(&self, entry: &ManifestEntry, policies: &Policies) -> InstallOutcome {
        let overrides = Overrides::resolve(policies, entry.package.as_str());
        if overrides.lock && overrides.upgrade {
            error!(
                "cannot lock and upgrade {} at the same time",
                entry.package_or_url
            );
            return InstallOutcome::Failed;
        }

        let args = pipx_args(entry, &overrides);
        let specifier = args[0].as_str();

        if overrides.upgrade {
            info!("upgrading {specifier}");
            let upgrade = self.command("upgrade", &args);
            match self.runner.run(&upgrade, self.base, self.options) {
                Ok(0) => {
                    info!("upgraded {specifier}");
                    return InstallOutcome::Upgraded;
                }
                Ok(code) => info!("upgrade of {specifier} exited with {code}, installing instead"),
                Err(err) => warn!("cannot upgrade {specifier}: {err:?}"),
            }
        }

        info!("installing {specifier}");
        let install = self.command("install", &args);
        match self.runner.run(&install, self.base, self.options) {
            Ok(0) => {
                info!("installed {specifier}");
                InstallOutcome::Installed
            }
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

    /// Consume replayer, and produce report of everything replayed so far.
    pub fn finish(self) -> Report {
        self.report
    }

    fn command(&self, subcommand: &str, args: &[String]) -> Invocation {
        Invocation::exec(
            self.executable,
            std::iter::once(subcommand).chain(args.iter().map(String::as_str)),
        )
    }
}

/// Replay every pipxfile reference of a `pipxfile` directive payload.
///
/// Returns true if every package of every pipxfile was installed or
/// upgraded.
///
/// # Errors
///
/// - Return [`PluginError`](crate::plugin::PluginError) if a pipxfile cannot
///   be loaded. Packages of earlier pipxfiles stay installed.
#[instrument(skip_all, level = "debug")]
pub fn replay_pipxfiles<R>(
    runner: &R,
    executable: &Path,
    base: &Path,
    items: &[Value],
    options: &InstallOptions,
) -> Result<bool>
where
    R: CommandRunner,
{
    let mut replayer = Replayer::new(runner, executable, base, options);

    for item in items {
        match serde_json::from_value::<PipxfileRef>(item.clone()) {
            Ok(reference) => replayer.replay(&reference)?,
            Err(_) => replayer.reject(item),
        }
    }

    let report = replayer.finish();
    if !report.is_success() {
        warn!("failed to install: {}", report.failed().join(", "));
    }

    Ok(report.is_success())
}
