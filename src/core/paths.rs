// src/core/paths.rs

use crate::constants::{APP_DIR_NAME, CONFIG_FILENAME};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the path to the pipesh configuration directory (`~/.config/pipesh`).
/// Creates it if it doesn't exist.
///
/// The first call computes and caches the path; later calls return the cached value.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = CONFIG_DIR.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(APP_DIR_NAME);

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Returns the path to the default `config.toml`.
pub fn get_config_file_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILENAME))
}

/// Resolves a path typed by the user: `~` is expanded to the home directory,
/// relative paths are joined onto `cwd`, absolute paths are kept as-is.
pub fn resolve_user_path(cwd: &Path, raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
