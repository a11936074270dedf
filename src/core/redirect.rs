// src/core/redirect.rs

//! File endpoints for `<` and `>` redirects.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use colored::Colorize;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinHandle;

use crate::CancellationToken;
use crate::core::stream::{self, LineSender};

#[derive(Error, Debug)]
pub enum RedirectError {
    #[error("couldn't open input file {path}: {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't create output file {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Opens an input redirect target read-only.
pub fn open_input(path: &Path) -> Result<File, RedirectError> {
    File::open(path).map_err(|source| RedirectError::OpenInput {
        path: path.to_path_buf(),
        source,
    })
}

/// Creates (or truncates) an output redirect target, creating missing parent directories.
pub fn create_output(path: &Path) -> Result<File, RedirectError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|source| RedirectError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|source| RedirectError::CreateOutput {
            path: path.to_path_buf(),
            source,
        })
}

/// Starts a task that writes every line of a new stream into `file`.
///
/// Returns the stream's producing end; the task finishes once that end (and all
/// its clones) are dropped, or when the scope is cancelled. The file is flushed
/// and closed when the task ends.
pub fn spawn_file_writer(
    file: File,
    path: PathBuf,
    token: CancellationToken,
) -> (LineSender, JoinHandle<()>) {
    let (tx, mut rx) = stream::channel();

    let handle = tokio::spawn(async move {
        let mut writer = BufWriter::new(tokio::fs::File::from_std(file));
        let mut written = 0usize;

        while let Some(line) = stream::recv_line(&mut rx, &token).await {
            let result = async {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await
            }
            .await;

            if let Err(e) = result {
                eprintln!(
                    "\n{}",
                    format!(t!("redirect.error.write"), path = path.display(), error = e).red()
                );
                break;
            }
            written += 1;
        }

        if let Err(e) = writer.flush().await {
            log::warn!("Failed to flush '{}': {}", path.display(), e);
        }
        log::debug!("Wrote {} line(s) to '{}'", written, path.display());
    });

    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_output_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("deeper").join("out.txt");

        create_output(&target).unwrap();

        assert!(target.is_file());
    }

    #[test]
    fn test_open_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_input(&dir.path().join("absent.txt"));
        assert!(matches!(result, Err(RedirectError::OpenInput { .. })));
    }

    #[tokio::test]
    async fn test_file_writer_writes_lines_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        fs::write(&target, "old content that must disappear\n").unwrap();

        let file = create_output(&target).unwrap();
        let token = CancellationToken::new();
        let (tx, handle) = spawn_file_writer(file, target.clone(), token.clone());

        stream::send_line(&tx, "alpha".to_string(), &token).await.unwrap();
        stream::send_line(&tx, "beta".to_string(), &token).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "alpha\nbeta\n");
    }
}
