// src/builtins/cd.rs

use super::BuiltinError;
use crate::state::WorkingDir;

/// Changes the process working directory and records the new absolute path in
/// the cell. With no argument, changes to the home directory.
///
/// On failure the cell is left untouched.
pub fn handle(args: &[String], cwd: &WorkingDir) -> Result<Vec<String>, BuiltinError> {
    let (shown, target) = match args.first() {
        Some(dir) => (dir.clone(), cwd.resolve(dir)),
        None => {
            let home = dirs::home_dir().ok_or(BuiltinError::MissingOperand("cd"))?;
            (home.display().to_string(), home)
        }
    };

    std::env::set_current_dir(&target).map_err(|e| {
        log::debug!("chdir to '{}' failed: {}", target.display(), e);
        BuiltinError::DirectoryNotFound(shown)
    })?;

    let new_dir = std::env::current_dir().map_err(BuiltinError::WorkingDir)?;
    let previous = cwd.replace(dunce::simplified(&new_dir).to_path_buf());
    log::debug!(
        "Working directory changed: '{}' -> '{}'",
        previous.display(),
        new_dir.display()
    );

    Ok(Vec::new())
}
