// src/system/process_table.rs

//! Access to the operating system's process table, used by `ps` and `kill`.

use crate::builtins::BuiltinError;

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: i32,
    pub ppid: i32,
    pub name: String,
}

/// Enumerates running processes, sorted by pid.
///
/// Processes that exit while the table is being read are skipped.
#[cfg(target_os = "linux")]
pub fn list_processes() -> Result<Vec<ProcessEntry>, BuiltinError> {
    let all = procfs::process::all_processes()
        .map_err(|e| BuiltinError::ProcessList(e.to_string()))?;

    let mut entries: Vec<ProcessEntry> = all
        .filter_map(Result::ok)
        .filter_map(|process| process.stat().ok())
        .map(|stat| ProcessEntry {
            pid: stat.pid,
            ppid: stat.ppid,
            name: stat.comm,
        })
        .collect();

    entries.sort_by_key(|entry| entry.pid);
    log::trace!("Read {} process table entries", entries.len());
    Ok(entries)
}

#[cfg(not(target_os = "linux"))]
pub fn list_processes() -> Result<Vec<ProcessEntry>, BuiltinError> {
    Err(BuiltinError::Unsupported("ps"))
}

/// Looks a process up and kills it (`SIGKILL`).
#[cfg(unix)]
pub fn terminate(pid: i32) -> Result<(), BuiltinError> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // 0 and negative values address process groups, never a single process.
    if pid <= 0 {
        return Err(BuiltinError::InvalidPid(pid.to_string()));
    }

    let target = Pid::from_raw(pid);
    if let Err(Errno::ESRCH) = kill(target, None) {
        return Err(BuiltinError::ProcessNotFound(pid));
    }

    kill(target, Signal::SIGKILL).map_err(|e| BuiltinError::KillFailed {
        pid,
        reason: e.to_string(),
    })
}

#[cfg(not(unix))]
pub fn terminate(_pid: i32) -> Result<(), BuiltinError> {
    Err(BuiltinError::Unsupported("kill"))
}
