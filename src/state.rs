// src/state.rs

//! Session state that outlives a single pipeline: the working-directory cell
//! and the per-cycle execution context handed to every stage.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::CancellationToken;
use crate::core::paths;

/// The shell's current working directory.
///
/// There is exactly one cell per session. It is shared by reference (`Arc`) and
/// is deliberately not `Clone`: every read and write goes through [`WorkingDir::get`]
/// and [`WorkingDir::replace`]. Only the `cd` builtin writes to it.
#[derive(Debug)]
pub struct WorkingDir {
    current: RwLock<PathBuf>,
}

impl WorkingDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            current: RwLock::new(path.into()),
        }
    }

    /// Initialises the cell from the process's working directory.
    pub fn from_process() -> io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Returns a copy of the current directory.
    pub fn get(&self) -> PathBuf {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in a new directory and returns the previous one.
    pub fn replace(&self, path: impl Into<PathBuf>) -> PathBuf {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, path.into())
    }

    /// Resolves a user-supplied path (`~` expanded) against the current directory.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        paths::resolve_user_path(&self.get(), raw)
    }
}

/// Everything a stage needs from its surroundings: the cycle's cancellation
/// scope and the session's working-directory cell.
///
/// Cloning the context shares both; all stages of one pipeline hold clones of
/// the same context.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    token: CancellationToken,
    cwd: Arc<WorkingDir>,
}

impl ExecutionContext {
    pub fn new(token: CancellationToken, cwd: Arc<WorkingDir>) -> Self {
        Self { token, cwd }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cwd(&self) -> &WorkingDir {
        &self.cwd
    }

    /// A shared handle on the cell, for work that has to leave the async task.
    pub fn cwd_handle(&self) -> Arc<WorkingDir> {
        Arc::clone(&self.cwd)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_returns_previous_directory() {
        let cell = WorkingDir::new("/first");
        let previous = cell.replace("/second");
        assert_eq!(previous, PathBuf::from("/first"));
        assert_eq!(cell.get(), PathBuf::from("/second"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_relative_and_absolute() {
        let cell = WorkingDir::new("/srv/data");
        assert_eq!(cell.resolve("logs/a.txt"), PathBuf::from("/srv/data/logs/a.txt"));
        assert_eq!(cell.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_context_clones_share_scope_and_cell() {
        let ctx = ExecutionContext::new(CancellationToken::new(), Arc::new(WorkingDir::new("/a")));
        let clone = ctx.clone();

        clone.cwd().replace("/b");
        clone.token().cancel();

        assert_eq!(ctx.cwd().get(), PathBuf::from("/b"));
        assert!(ctx.is_cancelled());
    }
}
