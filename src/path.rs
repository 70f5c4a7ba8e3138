// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files and executables
//! that need to be interacted with, or managed in some way.

use std::{
    env::current_dir,
    ffi::OsStr,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Locate an executable through the `PATH` environment variable.
///
/// If `name` contains a path separator, then it is treated as a direct path
/// and tested as is. Otherwise, each directory of `PATH` is searched in order
/// for an existing executable file. First match wins.
///
/// Returns `None` if nothing could be found, so callers can disable whatever
/// feature depends on the executable instead of failing.
pub fn locate_executable(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    let found = which::which(name.as_ref()).ok();
    debug!("locate {:?}: {found:?}", name.as_ref());
    found
}

/// Locate an executable through an explicit search path.
///
/// Same rules as [`locate_executable`], except that `search_path` is used in
/// place of the `PATH` environment variable. Relative direct paths are
/// resolved against the current working directory.
pub fn locate_executable_in(
    name: impl AsRef<OsStr>,
    search_path: impl AsRef<OsStr>,
) -> Option<PathBuf> {
    let cwd = current_dir().ok()?;
    which::which_in(name.as_ref(), Some(search_path.as_ref()), cwd).ok()
}

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/pipxdot/config.toml` as the
/// default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("pipxdot").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine base directory for a configuration file.
///
/// Relative paths in a configuration file are resolved against the directory
/// that contains it.
pub fn config_base_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
