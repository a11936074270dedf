// src/builtins/mod.rs

//! # Builtins
//!
//! Commands executed inside the shell process. Each builtin lives in its own
//! module and exposes a `handle` function with the same synchronous signature;
//! [`BUILTIN_REGISTRY`] maps command names onto them.
//!
//! Builtins never fail a pipeline: a [`BuiltinError`] is rendered as an ordinary
//! output line by the stage that ran the builtin.

use thiserror::Error;

use crate::state::WorkingDir;

pub mod cd;
pub mod echo;
pub mod kill;
pub mod ps;
pub mod pwd;

/// Signature shared by every builtin: arguments and the working-directory cell
/// in, output lines out.
pub type BuiltinHandler = fn(&[String], &WorkingDir) -> Result<Vec<String>, BuiltinError>;

/// The builtins known to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Echo,
    Pwd,
    Cd,
    Kill,
    Ps,
}

/// Errors reported by builtins. The message text is what the user sees.
#[derive(Error, Debug)]
pub enum BuiltinError {
    #[error("{0}: missing operand")]
    MissingOperand(&'static str),
    #[error("directory {0} doesn't exist")]
    DirectoryNotFound(String),
    #[error("couldn't get wd: {0}")]
    WorkingDir(#[source] std::io::Error),
    #[error("couldn't convert pid {0} to int")]
    InvalidPid(String),
    #[error("couldn't find process {0}")]
    ProcessNotFound(i32),
    #[error("couldn't kill pid {pid}: {reason}")]
    KillFailed { pid: i32, reason: String },
    #[error("couldn't get process list: {0}")]
    ProcessList(String),
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

/// Defines a builtin, its aliases, and its handler function.
struct BuiltinDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    builtin: Builtin,
    handler: BuiltinHandler,
}

/// The single source of truth for all builtins.
static BUILTIN_REGISTRY: &[BuiltinDefinition] = &[
    BuiltinDefinition {
        name: "cd",
        aliases: &[],
        builtin: Builtin::Cd,
        handler: cd::handle,
    },
    BuiltinDefinition {
        name: "echo",
        aliases: &[],
        builtin: Builtin::Echo,
        handler: echo::handle,
    },
    BuiltinDefinition {
        name: "kill",
        aliases: &[],
        builtin: Builtin::Kill,
        handler: kill::handle,
    },
    BuiltinDefinition {
        name: "ps",
        aliases: &[],
        builtin: Builtin::Ps,
        handler: ps::handle,
    },
    BuiltinDefinition {
        name: "pwd",
        aliases: &[],
        builtin: Builtin::Pwd,
        handler: pwd::handle,
    },
];

/// Finds a builtin by its name or alias.
pub fn find_builtin(name: &str) -> Option<Builtin> {
    BUILTIN_REGISTRY
        .iter()
        .find(|def| def.name == name || def.aliases.contains(&name))
        .map(|def| def.builtin)
}

impl Builtin {
    fn definition(self) -> Option<&'static BuiltinDefinition> {
        BUILTIN_REGISTRY.iter().find(|def| def.builtin == self)
    }

    /// The canonical command name.
    pub fn name(self) -> &'static str {
        self.definition().map_or("?", |def| def.name)
    }

    /// Runs the builtin and returns its output lines. Errors become a single line.
    pub fn execute(self, args: &[String], cwd: &WorkingDir) -> Vec<String> {
        let Some(def) = self.definition() else {
            return Vec::new();
        };
        match (def.handler)(args, cwd) {
            Ok(lines) => lines,
            Err(e) => {
                log::debug!("Builtin '{}' failed: {}", def.name, e);
                vec![e.to_string()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_is_registered() {
        for builtin in [Builtin::Echo, Builtin::Pwd, Builtin::Cd, Builtin::Kill, Builtin::Ps] {
            assert_eq!(find_builtin(builtin.name()), Some(builtin));
        }
    }

    #[test]
    fn test_unknown_name_is_not_builtin() {
        assert_eq!(find_builtin("wc"), None);
        assert_eq!(find_builtin("exit"), None);
    }

    #[test]
    fn test_errors_are_rendered_as_lines() {
        let cwd = WorkingDir::new("/");
        let lines = Builtin::Kill.execute(&["abc".to_string()], &cwd);
        assert_eq!(lines, vec!["couldn't convert pid abc to int"]);
    }
}
