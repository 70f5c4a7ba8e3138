// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

#![cfg(unix)]


use anyhow::Result;
use std::{
    fs::{create_dir_all, read_to_string, set_permissions, write, OpenOptions, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// Fake pipx that keeps its state in plain files next to itself.
///
/// - `installed`: lines of `<package> <version>`, as `pipx list --short`
///   prints them.
/// - `fail`: package specifiers that `pipx install` refuses.
/// - `calls.log`: every argument list pipx was called with.
const FAKE_PIPX: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
printf '%s\n' "$*" >> "$dir/calls.log"
case "$1" in
    list)
        cat "$dir/installed" 2>/dev/null
        ;;
    install)
        if grep -q -x -F -- "$2" "$dir/fail" 2>/dev/null; then
            exit 1
        fi
        echo "$2 1.0.0" >> "$dir/installed"
        ;;
    upgrade)
        grep -q -- "^$2 " "$dir/installed" 2>/dev/null || exit 1
        ;;
esac
exit 0
"#;

pub(crate) struct PipxFixture {
    bin_dir: PathBuf,
}

impl PipxFixture {
    pub(crate) fn new(root: impl AsRef<Path>) -> Result<Self> {
        let bin_dir = root.as_ref().join("bin");
        create_dir_all(&bin_dir)?;

        let pipx = bin_dir.join("pipx");
        write(&pipx, FAKE_PIPX)?;

        // INVARIANT: Fake pipx must be executable to be found at all.
        set_permissions(&pipx, Permissions::from_mode(0o755))?;

        Ok(Self { bin_dir })
    }

    pub(crate) fn bin_dir(&self) -> &Path {
        self.bin_dir.as_path()
    }

    pub(crate) fn mark_installed(&self, package: &str, version: &str) -> Result<()> {
        self.append("installed", format!("{package} {version}"))
    }

    pub(crate) fn mark_broken(&self, specifier: &str) -> Result<()> {
        self.append("fail", specifier)
    }

    pub(crate) fn calls(&self) -> Result<Vec<String>> {
        let path = self.bin_dir.join("calls.log");
        if !path.exists() {
            return Ok(Vec::new());
        }

        Ok(read_to_string(path)?.lines().map(str::to_owned).collect())
    }

    fn append(&self, file: &str, line: impl AsRef<str>) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.bin_dir.join(file))?;
        writeln!(file, "{}", line.as_ref())?;
        Ok(())
    }
}
