// src/system/executor.rs

//! Runs non-builtin stages as operating-system processes.
//!
//! The child's stdin is fed from the stage's incoming stream through a
//! [`LineReader`] (or straight from a file for `<` redirects). Its stdout and
//! stderr are read by two collector tasks that forward each line to the stage's
//! outgoing stream. The child is killed as soon as the pipeline's scope is
//! cancelled.

use std::io::{self, ErrorKind};
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use colored::Colorize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use crate::CancellationToken;
use crate::core::bridge::LineReader;
use crate::core::redirect::{self, RedirectError};
use crate::core::stream::{self, LineReceiver, LineSender};
use crate::state::ExecutionContext;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, #[source] io::Error),
    #[error("Command '{command}' exited with a non-zero status ({status}).")]
    NonZeroExitStatus {
        command: String,
        pid: Option<u32>,
        status: ExitStatus,
    },
    #[error("Could not wait for '{0}': {1}")]
    Wait(String, #[source] io::Error),
    #[error(transparent)]
    Redirect(#[from] RedirectError),
    #[error("Operation was cancelled by the user.")]
    Cancelled,
}

/// A resolved external stage, ready to run.
#[derive(Debug)]
pub struct ExternalCommand<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub input_redirect: Option<&'a Path>,
}

impl ExternalCommand<'_> {
    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.to_string()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Runs `command` until it exits or the scope is cancelled.
///
/// `input` is consumed as the child's stdin unless an input redirect is set; in
/// both cases whatever is left on it afterwards is discarded. `output` receives
/// the child's stdout and stderr lines, in no particular order between the two.
///
/// Stage output is only ever written to `output`; failures are returned to the
/// caller, which reports them on the terminal.
pub async fn run_external(
    command: ExternalCommand<'_>,
    ctx: &ExecutionContext,
    input: LineReceiver,
    output: LineSender,
) -> Result<ExitStatus, ExecutionError> {
    let token = ctx.token();
    if ctx.is_cancelled() {
        return Err(ExecutionError::Cancelled);
    }

    let stdin_file = command.input_redirect.map(redirect::open_input).transpose()?;

    let cwd = ctx.cwd().get();
    let clean_cwd = dunce::simplified(&cwd);

    let mut child = spawn_child(&command, clean_cwd, stdin_file.as_ref())?;
    let pid = child.id();
    log::debug!("Spawned '{}' (PID: {:?})", command.display(), pid);

    // --- Output collectors ---
    let label = command.program.to_string();
    let mut collectors: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        collectors.push(tokio::spawn(collect_lines(
            pipe,
            output.clone(),
            token.clone(),
            label.clone(),
            "stdout",
        )));
    }
    if let Some(pipe) = child.stderr.take() {
        collectors.push(tokio::spawn(collect_lines(
            pipe,
            output.clone(),
            token.clone(),
            label,
            "stderr",
        )));
    }
    drop(output);

    // --- Input feeding and supervision ---
    let mut bridge = match stdin_file {
        Some(_) => {
            stream::discard_pending(input);
            None
        }
        None => Some(LineReader::new(input)),
    };
    let stdin = child.stdin.take();
    let outcome = supervise(&mut child, stdin, bridge.as_mut(), token).await;

    for collector in collectors {
        if let Err(e) = collector.await {
            log::warn!("Output collector for '{}' failed: {}", command.program, e);
        }
    }

    if let Some(bridge) = bridge {
        stream::discard_pending(bridge.into_inner());
    }

    let status = outcome.map_err(|e| match e {
        SuperviseError::Cancelled => ExecutionError::Cancelled,
        SuperviseError::Wait(e) => ExecutionError::Wait(command.display(), e),
    })?;

    if status.success() {
        log::debug!("'{}' (PID: {:?}) finished", command.program, pid);
        Ok(status)
    } else {
        Err(ExecutionError::NonZeroExitStatus {
            command: command.display(),
            pid,
            status,
        })
    }
}

/// Reports an external stage failure on the terminal. Cancellation is not reported.
pub fn report_failure(error: &ExecutionError) {
    match error {
        ExecutionError::Cancelled => log::debug!("External stage cancelled"),
        ExecutionError::NonZeroExitStatus { pid, status, .. } => {
            let pid = pid.map_or_else(|| "?".to_string(), |p| p.to_string());
            eprintln!(
                "\n{}",
                format!(t!("process.error.exit"), pid = pid, status = status).yellow()
            );
        }
        ExecutionError::CommandFailed(command, e) => {
            eprintln!(
                "\n{}",
                format!(t!("process.error.spawn"), command = command, error = e).red()
            );
        }
        other => eprintln!("\n{}: {}", "Error".red().bold(), other),
    }
}

fn build_command(
    program: &str,
    args: &[String],
    cwd: &Path,
    stdin: Stdio,
) -> Command {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

fn stdin_for(file: Option<&std::fs::File>) -> io::Result<Stdio> {
    match file {
        Some(file) => Ok(Stdio::from(file.try_clone()?)),
        None => Ok(Stdio::piped()),
    }
}

/// Spawns the child. On Windows, a program that cannot be found is retried
/// through `cmd /C` so shell built-ins such as `dir` keep working.
fn spawn_child(
    command: &ExternalCommand<'_>,
    cwd: &Path,
    stdin_file: Option<&std::fs::File>,
) -> Result<Child, ExecutionError> {
    let failed = |e: io::Error| ExecutionError::CommandFailed(command.display(), e);

    let stdin = stdin_for(stdin_file).map_err(failed)?;
    match build_command(command.program, command.args, cwd, stdin).spawn() {
        Ok(child) => Ok(child),
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", command.program);
            let mut cmd_args = vec!["/C".to_string(), command.program.to_string()];
            cmd_args.extend(command.args.iter().cloned());
            let stdin = stdin_for(stdin_file).map_err(failed)?;
            build_command("cmd", &cmd_args, cwd, stdin)
                .spawn()
                .map_err(failed)
        }
        Err(e) => Err(failed(e)),
    }
}

enum SuperviseError {
    Cancelled,
    Wait(io::Error),
}

/// Feeds stdin and waits for the child, killing it if the scope is cancelled.
async fn supervise(
    child: &mut Child,
    stdin: Option<ChildStdin>,
    bridge: Option<&mut LineReader>,
    token: &CancellationToken,
) -> Result<ExitStatus, SuperviseError> {
    let feed = feed_stdin(stdin, bridge);
    tokio::pin!(feed);
    let mut feeding = true;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                if let Ok(Some(status)) = child.try_wait() {
                    return Ok(status);
                }
                log::debug!("Cancellation requested, killing child process (PID: {:?})...", child.id());
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill child process {:?}: {}", child.id(), e);
                }
                return Err(SuperviseError::Cancelled);
            }
            fed = &mut feed, if feeding => {
                feeding = false;
                match fed {
                    Ok(bytes) => log::trace!("Fed {} byte(s) to child stdin", bytes),
                    // The child may exit without reading all of its input.
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                        log::debug!("Child closed its stdin early");
                    }
                    Err(e) => log::warn!("Failed to feed child stdin: {}", e),
                }
            }
            status = child.wait() => return status.map_err(SuperviseError::Wait),
        }
    }
}

/// Copies the bridged stream into the child's stdin, then closes it so the
/// child sees end-of-input.
async fn feed_stdin(stdin: Option<ChildStdin>, bridge: Option<&mut LineReader>) -> io::Result<u64> {
    match (stdin, bridge) {
        (Some(mut stdin), Some(reader)) => {
            let copied = tokio::io::copy(reader, &mut stdin).await?;
            stdin.shutdown().await?;
            Ok(copied)
        }
        _ => Ok(0),
    }
}

/// Forwards a child pipe to a stream, one line at a time.
///
/// When the consumer is gone the pipe is dropped, so a child that keeps
/// writing gets a broken pipe instead of blocking forever.
async fn collect_lines<R>(
    pipe: R,
    sink: LineSender,
    token: CancellationToken,
    command: String,
    source: &'static str,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        let read = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            read = reader.read_until(b'\n', &mut buffer) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buffer);
                let line = text.trim_end_matches('\n').trim_end_matches('\r').to_string();
                if stream::send_line(&sink, line, &token).await.is_err() {
                    log::trace!("{} of '{}': consumer gone, closing pipe", source, command);
                    break;
                }
            }
            Err(e) => {
                eprintln!(
                    "\n{}",
                    format!(
                        t!("process.error.stream"),
                        source = source,
                        command = command,
                        error = e
                    )
                    .red()
                );
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::state::WorkingDir;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn context(cwd: &Path) -> ExecutionContext {
        ExecutionContext::new(CancellationToken::new(), Arc::new(WorkingDir::new(cwd)))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn collect(mut rx: LineReceiver) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stream_feeds_child_stdin() {
        let ctx = context(Path::new("/"));
        let (in_tx, in_rx) = stream::channel();
        let (out_tx, out_rx) = stream::channel();

        tokio::spawn(async move {
            in_tx.send("hello".to_string()).await.unwrap();
        });

        let args = strings(&["-c"]);
        let command = ExternalCommand {
            program: "wc",
            args: &args,
            input_redirect: None,
        };
        let (result, lines) =
            tokio::join!(run_external(command, &ctx, in_rx, out_tx), collect(out_rx));

        assert!(result.unwrap().success());
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].trim(), "6");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_input_redirect_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in.txt"), "one\ntwo\n").unwrap();
        let ctx = context(dir.path());
        let (_in_tx, in_rx) = stream::channel();
        let (out_tx, out_rx) = stream::channel();

        let input = dir.path().join("in.txt");
        let command = ExternalCommand {
            program: "cat",
            args: &[],
            input_redirect: Some(&input),
        };
        let (result, lines) =
            tokio::join!(run_external(command, &ctx, in_rx, out_tx), collect(out_rx));

        assert!(result.is_ok());
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runs_in_working_directory_cell() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dunce::canonicalize(dir.path()).unwrap();
        let ctx = context(&expected);
        let (_in_tx, in_rx) = stream::channel();
        let (out_tx, out_rx) = stream::channel();

        let args = strings(&["-P"]);
        let command = ExternalCommand {
            program: "pwd",
            args: &args,
            input_redirect: None,
        };
        let (result, lines) =
            tokio::join!(run_external(command, &ctx, in_rx, out_tx), collect(out_rx));

        assert!(result.is_ok());
        assert_eq!(lines, vec![expected.display().to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stderr_is_forwarded_and_exit_status_reported() {
        let ctx = context(Path::new("/"));
        let (_in_tx, in_rx) = stream::channel();
        let (out_tx, out_rx) = stream::channel();

        let args = strings(&["-c", "echo oops >&2; exit 3"]);
        let command = ExternalCommand {
            program: "sh",
            args: &args,
            input_redirect: None,
        };
        let (result, lines) =
            tokio::join!(run_external(command, &ctx, in_rx, out_tx), collect(out_rx));

        assert_eq!(lines, vec!["oops"]);
        match result {
            Err(ExecutionError::NonZeroExitStatus { status, .. }) => {
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("expected a non-zero exit, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_program_fails_to_spawn() {
        let ctx = context(Path::new("/"));
        let (_in_tx, in_rx) = stream::channel();
        let (out_tx, out_rx) = stream::channel();

        let command = ExternalCommand {
            program: "definitely-not-a-real-program-4821",
            args: &[],
            input_redirect: None,
        };
        let (result, lines) =
            tokio::join!(run_external(command, &ctx, in_rx, out_tx), collect(out_rx));

        assert!(matches!(result, Err(ExecutionError::CommandFailed(..))));
        assert!(lines.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancellation_kills_long_running_child() {
        let ctx = context(Path::new("/"));
        let (_in_tx, in_rx) = stream::channel();
        let (out_tx, _out_rx) = stream::channel();

        let token = ctx.token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            token.cancel();
        });

        let started = Instant::now();
        let args = strings(&["30"]);
        let command = ExternalCommand {
            program: "sleep",
            args: &args,
            input_redirect: None,
        };
        let result = run_external(command, &ctx, in_rx, out_tx).await;

        assert!(matches!(result, Err(ExecutionError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unread_input_is_discarded_after_exit() {
        let ctx = context(Path::new("/"));
        let (in_tx, in_rx) = stream::channel();
        let (out_tx, out_rx) = stream::channel();

        // `true` never reads stdin; the producer must not stay blocked.
        let producer = tokio::spawn(async move {
            let token = CancellationToken::new();
            let mut sent = 0;
            for i in 0..100 {
                if stream::send_line(&in_tx, i.to_string(), &token).await.is_err() {
                    break;
                }
                sent += 1;
            }
            sent
        });

        let command = ExternalCommand {
            program: "true",
            args: &[],
            input_redirect: None,
        };
        let (result, _) =
            tokio::join!(run_external(command, &ctx, in_rx, out_tx), collect(out_rx));
        assert!(result.is_ok());

        let sent = tokio::time::timeout(Duration::from_secs(5), producer)
            .await
            .expect("producer stayed blocked")
            .unwrap();
        assert!(sent <= 100);
    }
}
