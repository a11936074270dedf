// src/builtins/ps.rs

use super::BuiltinError;
use crate::constants::PS_HEADER;
use crate::state::WorkingDir;
use crate::system::process_table;

/// Lists running processes: a header line, then `pid ppid name` per process.
pub fn handle(_args: &[String], _cwd: &WorkingDir) -> Result<Vec<String>, BuiltinError> {
    let processes = process_table::list_processes()?;

    let mut lines = Vec::with_capacity(processes.len() + 1);
    lines.push(PS_HEADER.to_string());
    lines.extend(
        processes
            .iter()
            .map(|p| format!("{:>9}\t{:>5}\t{}", p.pid, p.ppid, p.name)),
    );
    Ok(lines)
}
