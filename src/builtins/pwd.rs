// src/builtins/pwd.rs

use super::BuiltinError;
use crate::state::WorkingDir;

pub fn handle(_args: &[String], cwd: &WorkingDir) -> Result<Vec<String>, BuiltinError> {
    Ok(vec![cwd.get().display().to_string()])
}
