// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Install Python applications through pipx from dotfile configuration.
//!
//! Pipxdot is a dotfile manager plugin. A host hands it __directives__ read
//! from configuration, and pipxdot turns them into pipx commands:
//!
//! ```toml
//! [[directive]]
//! pipx = ["black", "git+https://github.com/astral-sh/ruff"]
//!
//! [[directive]]
//! pipxfile = [{ path = "pipx.json", lock = true }]
//! ```
//!
//! The `pipx` directive installs each listed package unless pipx already has
//! it. The `pipxfile` directive replays a manifest exported with
//! `pipx list --json`, which makes it easy to reproduce the same set of
//! applications on a new machine.
//!
//! # See Also
//!
//! 1. [`plugin`] for the directives themselves.
//! 2. [`host`] for embedding pipxdot into another dotfile manager.

pub mod config;
pub mod host;
pub mod manifest;
pub mod path;
pub mod plugin;
pub mod syscall;

pub use config::{Dotfile, InstallOptions, PipxfileRef, Policy};
pub use host::Context;
pub use plugin::{Pipx, Plugin};
