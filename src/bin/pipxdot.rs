// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use pipxdot::{
    config::{Directive, Dotfile, OptionTable, PipxfileRecord, Policy},
    host::{apply, Context},
    path::{config_base_dir, default_config_path},
    plugin::{Pipx, PIPXFILE_DIRECTIVE, PIPX_DIRECTIVE},
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::{
    env::current_dir,
    fs::read_to_string,
    path::PathBuf,
    process::exit,
};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "pipxdot [options] <pipxdot-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<bool> {
        match self.command {
            Command::Apply(opts) => run_apply(opts),
            Command::Install(opts) => run_install(opts),
            Command::Replay(opts) => run_replay(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run every directive of configuration file.
    #[command(override_usage = "pipxdot apply [options]")]
    Apply(ApplyOptions),

    /// Install packages unless already installed.
    #[command(override_usage = "pipxdot install [options] <package>...")]
    Install(InstallOptions),

    /// Replay pipxfiles exported by `pipx list --json`.
    #[command(override_usage = "pipxdot replay [options] <pipxfile>...")]
    Replay(ReplayOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ApplyOptions {
    /// Path to configuration file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Directory to resolve relative paths against.
    #[arg(short, long, value_name = "path")]
    pub base_directory: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallOptions {
    /// Package specifiers to install.
    #[arg(required = true, value_name = "package")]
    pub packages: Vec<String>,

    /// Hide output of pipx.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ReplayOptions {
    /// Pipxfiles to replay.
    #[arg(required = true, value_name = "pipxfile")]
    pub pipxfiles: Vec<PathBuf>,

    /// Reinstall all packages, or only the listed ones.
    #[arg(long, num_args = 0..=1, require_equals = true, value_delimiter = ',', value_name = "package")]
    pub force: Option<Vec<String>>,

    /// Pin all packages to their recorded version, or only the listed ones.
    #[arg(long, num_args = 0..=1, require_equals = true, value_delimiter = ',', value_name = "package")]
    pub lock: Option<Vec<String>>,

    /// Upgrade all packages, or only the listed ones.
    #[arg(long, num_args = 0..=1, require_equals = true, value_delimiter = ',', value_name = "package")]
    pub upgrade: Option<Vec<String>>,

    /// Show output of pipx.
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match run() {
        Ok(true) => exit(0),
        Ok(false) => exit(1),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

fn run() -> Result<bool> {
    Cli::parse().run()
}

fn run_apply(opts: ApplyOptions) -> Result<bool> {
    let config_path = match opts.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let content = read_to_string(&config_path)
        .with_context(|| format!("failed to read configuration at {:?}", config_path.display()))?;
    let dotfile: Dotfile = content.parse()?;

    let base_directory = opts
        .base_directory
        .or(dotfile.base_directory)
        .unwrap_or_else(|| config_base_dir(&config_path));
    let context = Context::new(base_directory).with_defaults(dotfile.defaults);
    let pipx = Pipx::new(&context);
    if pipx.executable().is_none() {
        warn!("pipx executable not found, pipx directives are disabled");
    }

    Ok(apply(&[&pipx], &dotfile.directives))
}

fn run_install(opts: InstallOptions) -> Result<bool> {
    let mut context = Context::new(current_dir()?);
    if opts.quiet {
        context = context.with_directive_defaults(PIPX_DIRECTIVE, streams(true));
    }

    let payload = Value::from(opts.packages);
    run_directive(&context, Directive::new(PIPX_DIRECTIVE, payload))
}

fn run_replay(opts: ReplayOptions) -> Result<bool> {
    let mut context = Context::new(current_dir()?);
    if opts.verbose {
        context = context.with_directive_defaults(PIPXFILE_DIRECTIVE, streams(false));
    }

    let mut references = Vec::new();
    for path in opts.pipxfiles {
        let record = PipxfileRecord {
            path,
            force: policy(opts.force.as_deref()),
            lock: policy(opts.lock.as_deref()),
            upgrade: policy(opts.upgrade.as_deref()),
        };
        references.push(serde_json::to_value(record)?);
    }

    run_directive(&context, Directive::new(PIPXFILE_DIRECTIVE, Value::Array(references)))
}

fn run_directive(context: &Context, directive: Directive) -> Result<bool> {
    let pipx = Pipx::new(context);
    if pipx.executable().is_none() {
        anyhow::bail!("pipx executable not found in PATH");
    }

    Ok(apply(&[&pipx], &[directive]))
}

fn policy(packages: Option<&[String]>) -> Policy {
    match packages {
        None => Policy::Uniform(false),
        Some([]) => Policy::Uniform(true),
        Some(packages) => packages.iter().cloned().collect(),
    }
}

fn streams(suppress: bool) -> OptionTable {
    ["stdin", "stdout", "stderr"]
        .into_iter()
        .map(|stream| (stream.to_string(), suppress))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn install_takes_quiet_flag() -> Result<()> {
        let cli = Cli::try_parse_from(["pipxdot", "install", "-q", "black", "ruff"])?;
        let Command::Install(opts) = cli.command else {
            anyhow::bail!("expected install command");
        };
        assert!(opts.quiet);
        assert_eq!(opts.packages, ["black", "ruff"]);

        Ok(())
    }

    #[test]
    fn replay_takes_verbose_flag_and_policies() -> Result<()> {
        let cli = Cli::try_parse_from([
            "pipxdot",
            "replay",
            "-v",
            "pipx.json",
            "--lock=ruff,black",
            "--upgrade",
        ])?;
        let Command::Replay(opts) = cli.command else {
            anyhow::bail!("expected replay command");
        };
        assert!(opts.verbose);
        assert_eq!(policy(opts.force.as_deref()), Policy::Uniform(false));
        assert_eq!(policy(opts.lock.as_deref()), Policy::from_iter(["ruff", "black"]));
        assert_eq!(policy(opts.upgrade.as_deref()), Policy::Uniform(true));

        // Replay is quiet unless asked otherwise.
        assert!(Cli::try_parse_from(["pipxdot", "replay", "-q", "pipx.json"]).is_err());

        Ok(())
    }

    #[test]
    fn streams_switch_every_stream() {
        let expect = OptionTable::from([
            ("stderr".to_string(), false),
            ("stdin".to_string(), false),
            ("stdout".to_string(), false),
        ]);
        assert_eq!(streams(false), expect);
    }
}
