// src/builtins/echo.rs

use super::BuiltinError;
use crate::state::WorkingDir;

/// Emits the arguments joined by single spaces as one line.
pub fn handle(args: &[String], _cwd: &WorkingDir) -> Result<Vec<String>, BuiltinError> {
    Ok(vec![args.join(" ")])
}
