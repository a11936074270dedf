// src/core/config_loader.rs

//! # Config Loader
//!
//! Loads `config.toml` for the shell. The default location is
//! `~/.config/pipesh/config.toml`; if that file does not exist yet it is written
//! with the default settings so users have something to edit.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::{self, PathError};
use crate::models::ShellConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Configuration file '{0}' does not exist.")]
    NotFound(PathBuf),
    #[error("Failed to parse {path}: {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Loads the configuration.
///
/// * `explicit` - A path given on the command line. It must exist.
/// * `None` - The default location is used, and created with defaults if missing.
pub fn load_shell_config(explicit: Option<&Path>) -> Result<ShellConfig, ConfigError> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            read_config_file(path)
        }
        None => {
            let path = paths::get_config_file_path()?;
            if path.exists() {
                read_config_file(&path)
            } else {
                let default_config = ShellConfig::default();
                write_config_file(&path, &default_config)?;
                log::debug!("Default configuration written to '{}'", path.display());
                Ok(default_config)
            }
        }
    }
}

/// Parses a configuration file. Missing keys take their default values.
pub fn read_config_file(path: &Path) -> Result<ShellConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.display().to_string(),
        source,
    })
}

fn write_config_file(path: &Path, config: &ShellConfig) -> Result<(), ConfigError> {
    let toml_string = toml::to_string_pretty(config)?;
    fs::write(path, toml_string)?;
    Ok(())
}
