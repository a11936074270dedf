// src/builtins/kill.rs

use super::BuiltinError;
use crate::state::WorkingDir;
use crate::system::process_table;

/// Forcefully terminates the process whose pid is given as the first argument.
pub fn handle(args: &[String], _cwd: &WorkingDir) -> Result<Vec<String>, BuiltinError> {
    let raw = args.first().ok_or(BuiltinError::MissingOperand("kill"))?;
    let pid: i32 = raw
        .parse()
        .map_err(|_| BuiltinError::InvalidPid(raw.clone()))?;

    process_table::terminate(pid)?;
    log::debug!("Killed process {}", pid);
    Ok(Vec::new())
}
