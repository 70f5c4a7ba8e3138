// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host side of the plugin interface.
//!
//! The __host__ is whatever dotfile manager drives the plugins. It owns the
//! base directory that relative paths resolve against, the default options of
//! each directive, and the order that directives run in. The `pipxdot` binary
//! is one such host, but nothing in the plugin depends on it.

use crate::{
    config::{Directive, OptionTable},
    plugin::Plugin,
};

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument};

/// Host context shared with plugins.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Context {
    base_directory: PathBuf,
    defaults: BTreeMap<String, OptionTable>,
}

impl Context {
    /// Construct new context rooted at base directory.
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: base_directory.into(),
            defaults: BTreeMap::new(),
        }
    }

    /// Set default options for every directive.
    pub fn with_defaults(mut self, defaults: BTreeMap<String, OptionTable>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set default options for one directive.
    pub fn with_directive_defaults(
        mut self,
        directive: impl Into<String>,
        options: OptionTable,
    ) -> Self {
        self.defaults.insert(directive.into(), options);
        self
    }

    /// Directory that relative paths are resolved against.
    pub fn base_directory(&self) -> &Path {
        self.base_directory.as_path()
    }

    /// Default options for target directive.
    pub fn defaults(&self, directive: &str) -> Option<&OptionTable> {
        self.defaults.get(directive)
    }
}

/// Run directives through plugins in order.
///
/// Each directive goes to the first plugin that can handle it. A directive
/// that no plugin claims, or whose plugin fails, counts as a failure. All
/// directives are run regardless of earlier failures.
///
/// Returns true if every directive succeeded.
#[instrument(skip_all, level = "debug")]
pub fn apply(plugins: &[&dyn Plugin], directives: &[Directive]) -> bool {
    let mut success = true;

    for directive in directives {
        let Some(plugin) = plugins
            .iter()
            .find(|plugin| plugin.can_handle(directive.name.as_str()))
        else {
            error!("no plugin can handle directive {:?}", directive.name);
            success = false;
            continue;
        };

        match plugin.handle(directive.name.as_str(), &directive.payload) {
            Ok(true) => {}
            Ok(false) => {
                error!("some tasks of directive {:?} failed", directive.name);
                success = false;
            }
            Err(err) => {
                error!("directive {:?} failed: {err:?}", directive.name);
                success = false;
            }
        }
    }

    if success {
        info!("all directives have been applied");
    }

    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginError;
    use serde_json::{json, Value};
    use std::cell::RefCell;

    struct EchoPlugin {
        handled: RefCell<Vec<String>>,
    }

    impl Plugin for EchoPlugin {
        fn can_handle(&self, directive: &str) -> bool {
            directive.starts_with("echo")
        }

        fn handle(&self, directive: &str, payload: &Value) -> Result<bool, PluginError> {
            self.handled.borrow_mut().push(directive.to_string());
            match payload {
                Value::Bool(value) => Ok(*value),
                _ => Err(PluginError::Payload {
                    directive: directive.to_string(),
                    expect: "boolean",
                }),
            }
        }
    }

    #[test]
    fn apply_runs_every_directive() {
        let plugin = EchoPlugin {
            handled: RefCell::new(Vec::new()),
        };
        let directives = vec![
            Directive::new("echo1", json!(false)),
            Directive::new("unknown", json!(true)),
            Directive::new("echo2", json!("bad")),
            Directive::new("echo3", json!(true)),
        ];

        assert!(!apply(&[&plugin], &directives));
        assert_eq!(
            plugin.handled.borrow().as_slice(),
            ["echo1", "echo2", "echo3"]
        );
    }

    #[test]
    fn apply_succeeds_when_all_succeed() {
        let plugin = EchoPlugin {
            handled: RefCell::new(Vec::new()),
        };
        let directives = vec![Directive::new("echo", json!(true))];

        assert!(apply(&[&plugin], &directives));
    }
}
