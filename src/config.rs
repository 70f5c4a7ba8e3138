// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration that pipxdot uses to simplify the
//! process of serialization and deserialization. This covers both the
//! directive payloads handed to the [`Pipx`](crate::plugin::Pipx) plugin, and
//! the configuration file read by the `pipxdot` binary. File I/O is left to
//! the caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Per-directive default options supplied by the host.
///
/// Maps option name to its value, e.g., `stdout = true`.
pub type OptionTable = BTreeMap<String, bool>;

/// Stream suppression options for install commands.
///
/// Each flag marks a standard stream of the child process that should be
/// redirected to the null device.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
pub struct InstallOptions {
    /// Suppress standard input.
    pub stdin: bool,

    /// Suppress standard output.
    pub stdout: bool,

    /// Suppress standard error.
    pub stderr: bool,
}

impl InstallOptions {
    /// Suppress every stream.
    pub const fn quiet() -> Self {
        Self {
            stdin: true,
            stdout: true,
            stderr: true,
        }
    }

    /// Suppress no stream.
    pub const fn inherit() -> Self {
        Self {
            stdin: false,
            stdout: false,
            stderr: false,
        }
    }

    /// Layer option table on top of current options.
    ///
    /// Overrides key by key. Unknown keys are ignored.
    pub fn merge(mut self, layer: &OptionTable) -> Self {
        for (key, value) in layer {
            match key.as_str() {
                "stdin" => self.stdin = *value,
                "stdout" => self.stdout = *value,
                "stderr" => self.stderr = *value,
                _ => debug!("ignore unknown option {key:?}"),
            }
        }

        self
    }
}

/// Override policy for packages of a pipxfile.
///
/// Either applies to every package uniformly, or only to packages listed by
/// name.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Policy {
    /// Same answer for every package.
    Uniform(bool),

    /// True only for listed package names.
    PerPackage(BTreeSet<String>),
}

impl Policy {
    /// Resolve policy for target package name.
    pub fn resolve(&self, package: &str) -> bool {
        match self {
            Self::Uniform(value) => *value,
            Self::PerPackage(packages) => packages.contains(package),
        }
    }

    /// Check if policy is uniformly true.
    pub fn is_always(&self) -> bool {
        matches!(self, Self::Uniform(true))
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::Uniform(false)
    }
}

impl From<bool> for Policy {
    fn from(value: bool) -> Self {
        Self::Uniform(value)
    }
}

impl<S> FromIterator<S> for Policy
where
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::PerPackage(iter.into_iter().map(Into::into).collect())
    }
}

/// Reference to a pipxfile in a `pipxfile` directive.
///
/// Either a bare path with no overrides, or a record with a path and optional
/// force, lock, and upgrade policies.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PipxfileRef {
    /// Bare path to pipxfile.
    Path(PathBuf),

    /// Path to pipxfile with override policies.
    Detailed(PipxfileRecord),
}

impl PipxfileRef {
    /// Path to pipxfile.
    pub fn path(&self) -> &Path {
        match self {
            Self::Path(path) => path.as_path(),
            Self::Detailed(record) => record.path.as_path(),
        }
    }

    /// Override policies of reference.
    pub fn policies(&self) -> Policies {
        match self {
            Self::Path(_) => Policies::default(),
            Self::Detailed(record) => Policies {
                force: record.force.clone(),
                lock: record.lock.clone(),
                upgrade: record.upgrade.clone(),
            },
        }
    }
}

/// Pipxfile reference with override policies.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PipxfileRecord {
    /// Path to pipxfile.
    pub path: PathBuf,

    /// Reinstall packages even if they are already installed.
    #[serde(default)]
    pub force: Policy,

    /// Pin packages to version recorded in pipxfile.
    #[serde(default)]
    pub lock: Policy,

    /// Upgrade packages before falling back to install.
    #[serde(default)]
    pub upgrade: Policy,
}

/// Override policies of a pipxfile reference.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Policies {
    pub force: Policy,
    pub lock: Policy,
    pub upgrade: Policy,
}

/// Configuration file layout.
///
/// The `pipxdot` binary reads a TOML file that lists the directives to run in
/// order, along with default options for each directive.
///
/// # General Layout
///
/// ```toml
/// base_directory = "~/dotfiles"
///
/// [defaults.pipx]
/// stdout = true
///
/// [[directive]]
/// pipx = ["black", "flake8"]
///
/// [[directive]]
/// pipxfile = ["pipx.json", { path = "work.json", lock = ["ruff"] }]
/// ```
///
/// Each directive entry is a table with exactly one key: the name of the
/// directive. Its value is the payload handed to whatever plugin claims the
/// directive.
#[derive(Default, Debug, PartialEq, Clone)]
pub struct Dotfile {
    /// Directory that relative paths are resolved against.
    pub base_directory: Option<PathBuf>,

    /// Default options per directive.
    pub defaults: BTreeMap<String, OptionTable>,

    /// Directives in order of appearance.
    pub directives: Vec<Directive>,
}

impl FromStr for Dotfile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let layout: DotfileLayout = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on base directory field.
        let base_directory = layout
            .base_directory
            .as_deref()
            .map(expand_path)
            .transpose()?;

        let mut directives = Vec::new();
        for (index, table) in layout.directives.into_iter().enumerate() {
            // INVARIANT: One directive per table.
            if table.len() != 1 {
                return Err(ConfigError::DirectiveShape {
                    index,
                    keys: table.len(),
                });
            }

            for (name, payload) in table {
                directives.push(Directive {
                    name,
                    payload: serde_json::to_value(payload)?,
                });
            }
        }

        Ok(Self {
            base_directory,
            defaults: layout.defaults,
            directives,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DotfileLayout {
    base_directory: Option<PathBuf>,

    #[serde(default)]
    defaults: BTreeMap<String, OptionTable>,

    #[serde(default, rename = "directive")]
    directives: Vec<toml::Table>,
}

/// Single directive to hand off to a plugin.
#[derive(Debug, PartialEq, Clone)]
pub struct Directive {
    /// Name of directive.
    pub name: String,

    /// Raw payload of directive.
    pub payload: serde_json::Value,
}

impl Directive {
    /// Construct new directive.
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Perform shell expansion on path, e.g., `~` and `$VAR`.
///
/// # Errors
///
/// - Return [`ConfigError::ShellExpansion`] if variable lookup fails.
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Failed to convert directive payload.
    #[error(transparent)]
    Payload(#[from] serde_json::Error),

    /// Directive table does not name exactly one directive.
    #[error("directive entry {index} must have exactly one key, found {keys}")]
    DirectiveShape { index: usize, keys: usize },
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use serde_json::json;
    use simple_test_case::test_case;

    #[test_case(Policy::Uniform(true), "black", true; "uniform true")]
    #[test_case(Policy::Uniform(false), "black", false; "uniform false")]
    #[test_case(Policy::from_iter(["black", "ruff"]), "ruff", true; "listed")]
    #[test_case(Policy::from_iter(["black", "ruff"]), "flake8", false; "unlisted")]
    #[test]
    fn policy_resolve(policy: Policy, package: &str, expect: bool) {
        pretty_assertions::assert_eq!(policy.resolve(package), expect);
    }

    #[test]
    fn install_options_merge_overrides_key_by_key() {
        let layer = OptionTable::from([
            ("stdout".to_string(), false),
            ("verbose".to_string(), true),
        ]);
        let result = InstallOptions::quiet().merge(&layer);
        let expect = InstallOptions {
            stdin: true,
            stdout: false,
            stderr: true,
        };
        pretty_assertions::assert_eq!(result, expect);
    }

    #[test]
    fn deserialize_pipxfile_refs() -> anyhow::Result<()> {
        let result: Vec<PipxfileRef> = serde_json::from_value(json!([
            "pipx.json",
            { "path": "work.json", "force": true, "lock": ["ruff"] },
        ]))?;
        let expect = vec![
            PipxfileRef::Path("pipx.json".into()),
            PipxfileRef::Detailed(PipxfileRecord {
                path: "work.json".into(),
                force: Policy::Uniform(true),
                lock: Policy::from_iter(["ruff"]),
                upgrade: Policy::Uniform(false),
            }),
        ];
        pretty_assertions::assert_eq!(result, expect);
        pretty_assertions::assert_eq!(result[0].policies(), Policies::default());

        Ok(())
    }

    #[test]
    fn deserialize_pipxfile_ref_rejects_bad_shape() {
        assert!(serde_json::from_value::<PipxfileRef>(json!(42)).is_err());
        assert!(serde_json::from_value::<PipxfileRef>(json!({ "force": true })).is_err());
    }

    #[sealed_test(env = [("BLAH", "/home/blah/blah")])]
    fn deserialize_dotfile() -> anyhow::Result<()> {
        let result: Dotfile = r#"
            base_directory = "$BLAH/dotfiles"

            [defaults.pipx]
            stdout = true

            [[directive]]
            pipx = ["black", "flake8"]

            [[directive]]
            pipxfile = ["pipx.json", { path = "work.json", upgrade = true }]
        "#
        .parse()?;

        let expect = Dotfile {
            base_directory: Some("/home/blah/blah/dotfiles".into()),
            defaults: BTreeMap::from([(
                "pipx".to_string(),
                OptionTable::from([("stdout".to_string(), true)]),
            )]),
            directives: vec![
                Directive::new("pipx", json!(["black", "flake8"])),
                Directive::new(
                    "pipxfile",
                    json!(["pipx.json", { "path": "work.json", "upgrade": true }]),
                ),
            ],
        };
        pretty_assertions::assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_dotfile_rejects_multi_key_directive() {
        let result = r#"
            [[directive]]
            pipx = ["black"]
            pipxfile = ["pipx.json"]
        "#
        .parse::<Dotfile>();
        assert!(matches!(
            result,
            Err(ConfigError::DirectiveShape { index: 0, keys: 2 })
        ));
    }
}
