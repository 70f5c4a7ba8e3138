// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pipx manifest layout.
//!
//! A __pipxfile__ is the JSON document written by `pipx list --json`. It
//! records every virtual environment pipx manages under a top-level `venvs`
//! mapping. Replaying a pipxfile on another machine reproduces the same set
//! of installed applications.
//!
//! Only the fields needed for replay are read. Everything else in the
//! document is ignored.
//!
//! ```json
//! {
//!     "venvs": {
//!         "black": {
//!             "metadata": {
//!                 "main_package": {
//!                     "package": "black",
//!                     "package_or_url": "black",
//!                     "package_version": "24.2.0",
//!                     "include_dependencies": false,
//!                     "pip_args": []
//!                 }
//!             }
//!         }
//!     }
//! }
//! ```

use serde::Deserialize;
use std::{fs::read_to_string, path::{Path, PathBuf}, str::FromStr};

/// Parsed pipxfile.
///
/// Entries keep the order they have in the document.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PipxManifest {
    pub entries: Vec<ManifestEntry>,
}

impl PipxManifest {
    /// Read and parse pipxfile at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Read`] if file cannot be read.
    /// - Return [`ManifestError::Parse`] or [`ManifestError::Entry`] if file
    ///   content is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_to_string(path.as_ref()).map_err(|err| ManifestError::Read {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        content.parse()
    }
}

impl FromStr for PipxManifest {
    type Err = ManifestError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let layout: ManifestLayout = serde_json::from_str(data).map_err(ManifestError::Parse)?;

        let mut entries = Vec::with_capacity(layout.venvs.len());
        for (venv, record) in layout.venvs {
            let record: VenvRecord = serde_json::from_value(record)
                .map_err(|err| ManifestError::Entry { source: err, venv: venv.clone() })?;
            let main = record.metadata.main_package;
            entries.push(ManifestEntry {
                venv,
                package_or_url: main.package_or_url,
                package: main.package,
                package_version: main.package_version,
                include_dependencies: main.include_dependencies,
                pip_args: main.pip_args,
            });
        }

        Ok(Self { entries })
    }
}

/// Main package of one virtual environment in a pipxfile.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ManifestEntry {
    /// Name of virtual environment.
    pub venv: String,

    /// Package specifier, or URL, used to install the package.
    pub package_or_url: String,

    /// Bare package name.
    pub package: String,

    /// Version that was installed.
    pub package_version: String,

    /// Expose apps of dependencies too.
    pub include_dependencies: bool,

    /// Extra arguments handed to pip.
    pub pip_args: Vec<String>,
}

impl ManifestEntry {
    /// Package specifier, optionally pinned to the recorded version.
    ///
    /// Pinning appends `==<version>` unless the specifier already ends with
    /// the version.
    pub fn specifier(&self, lock: bool) -> String {
        if lock && !self.package_or_url.ends_with(self.package_version.as_str()) {
            format!("{}=={}", self.package_or_url, self.package_version)
        } else {
            self.package_or_url.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestLayout {
    venvs: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VenvRecord {
    metadata: VenvMetadata,
}

#[derive(Debug, Deserialize)]
struct VenvMetadata {
    main_package: MainPackage,
}

#[derive(Debug, Deserialize)]
struct MainPackage {
    package: String,
    package_or_url: String,
    package_version: String,

    #[serde(default)]
    include_dependencies: bool,

    #[serde(default)]
    pip_args: Vec<String>,
}

/// Pipxfile error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Pipxfile cannot be read.
    #[error("failed to read pipxfile at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Pipxfile is not a valid JSON document with a `venvs` mapping.
    #[error("failed to parse pipxfile")]
    Parse(#[source] serde_json::Error),

    /// Virtual environment record lacks required fields.
    #[error("malformed record for venv {venv:?}")]
    Entry {
        #[source]
        source: serde_json::Error,
        venv: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ManifestError> = std::result::Result<T, E>;
