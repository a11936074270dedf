// src/core/pipeline_executor.rs

//! Runs a parsed [`Pipeline`]: one task per stage, capacity-one streams between
//! neighbours, the live input reader feeding the first stage and a printer
//! draining the last one.
//!
//! The run is over once the printer has seen the final stream close. At that
//! point the final stage is awaited, the cycle's scope is cancelled so any
//! stage still running upstream is stopped, and every stage task is joined.

use std::io;
use std::path::PathBuf;

use colored::Colorize;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::CancellationToken;
use crate::builtins::Builtin;
use crate::core::redirect::{self, RedirectError};
use crate::core::stream::{self, LineReceiver, LineSender, StreamError};
use crate::models::{InputEvent, Pipeline, Stage, StageKind};
use crate::state::ExecutionContext;
use crate::system::executor::{self, ExecutionError, ExternalCommand};
use crate::system::input::{self, LiveInput};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to read live input: {0}")]
    Input(#[source] io::Error),
    #[error("failed to write pipeline output: {0}")]
    Output(#[source] io::Error),
}

/// Runs `pipeline` to completion (or until its scope is cancelled), writing the
/// final stage's lines to `out`.
///
/// Stage failures never surface here; they are reported on the terminal by the
/// stage itself. Only a failing input source or output sink is returned.
pub async fn run_pipeline<W>(
    pipeline: &Pipeline,
    ctx: &ExecutionContext,
    live_input: &mut LiveInput,
    out: &mut W,
) -> Result<(), PipelineError>
where
    W: AsyncWrite + Unpin,
{
    if pipeline.is_empty() {
        return Ok(());
    }
    let token = ctx.token().clone();
    let release = scopeguard::guard(token.clone(), |token| token.cancel());

    // --- Wiring ---
    let (first_tx, mut upstream) = stream::channel();
    let feeds_live_input = pipeline.stages.first().is_some_and(reads_input_stream);
    let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(pipeline.len());
    let mut previous_done: Option<oneshot::Receiver<()>> = None;
    let mut previous_builtin = false;

    for stage in &pipeline.stages {
        let (tx, rx) = stream::channel();
        let (done, done_rx) = oneshot::channel();
        let is_builtin = matches!(stage.kind, StageKind::Builtin(_));
        let wiring = StageWiring {
            input: upstream,
            output: tx,
            after: if is_builtin && previous_builtin {
                previous_done.take()
            } else {
                None
            },
            done,
        };
        log::debug!("Starting stage '{}' as {}", stage.name, stage.kind);
        handles.push(tokio::spawn(run_stage(stage.clone(), ctx.clone(), wiring)));
        previous_done = Some(done_rx);
        previous_builtin = is_builtin;
        upstream = rx;
    }
    let final_rx = upstream;

    // --- Live input and printer ---
    let feed = feed_live_input(live_input, feeds_live_input.then_some(first_tx), &token);
    tokio::pin!(feed);
    let print = print_lines(final_rx, out, &token);
    tokio::pin!(print);

    let mut feeding = true;
    let mut input_error = None;
    let printed = loop {
        tokio::select! {
            fed = &mut feed, if feeding => {
                feeding = false;
                if let Err(e) = fed {
                    token.cancel();
                    input_error = Some(e);
                }
            }
            printed = &mut print => break printed,
        }
    };

    // --- Teardown ---
    if printed.is_err() {
        token.cancel();
    }
    if let Some(last) = handles.pop() {
        join_stage(last).await;
    }
    drop(release);
    for handle in handles {
        join_stage(handle).await;
    }

    if let Some(e) = input_error {
        return Err(PipelineError::Input(e));
    }
    let count = printed.map_err(PipelineError::Output)?;
    log::debug!("Pipeline finished, {} line(s) printed", count);
    Ok(())
}

/// True when the stage takes its input from the incoming stream.
fn reads_input_stream(stage: &Stage) -> bool {
    matches!(stage.kind, StageKind::External { .. }) && stage.redirects.input.is_none()
}

async fn join_stage(handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        log::warn!("Stage task failed to complete: {}", e);
    }
}

/// Forwards live input lines to the first stage.
///
/// Stops at end of input, an end marker, an empty line, cancellation or when
/// the first stage stops reading. A line already taken from the input when the
/// stage goes away is dropped.
async fn feed_live_input(
    live_input: &mut LiveInput,
    tx: Option<LineSender>,
    token: &CancellationToken,
) -> Result<(), io::Error> {
    let Some(tx) = tx else {
        return Ok(());
    };

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tx.closed() => break,
            event = live_input.next_event() => event,
        };

        let line = match event {
            InputEvent::Line(line) if line.is_empty() || input::is_end_marker(&line) => break,
            InputEvent::Line(line) => line,
            InputEvent::EndOfStream => break,
            InputEvent::ReadError(e) => return Err(e),
        };

        match stream::send_line(&tx, line, token).await {
            Ok(()) => log::trace!("Fed one live input line to the first stage"),
            Err(StreamError::Cancelled) => {
                log::debug!("Dropped an unconsumed input line: pipeline was cancelled");
                break;
            }
            Err(StreamError::Closed) => {
                log::debug!("Dropped an unconsumed input line: first stage stopped reading");
                break;
            }
        }
    }
    Ok(())
}

/// Writes every line of the final stream to `out`. Returns the number of lines written.
async fn print_lines<W>(
    mut rx: LineReceiver,
    out: &mut W,
    token: &CancellationToken,
) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut count = 0;
    while let Some(line) = stream::recv_line(&mut rx, token).await {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
        count += 1;
    }
    Ok(count)
}

/// The connections of one stage task.
struct StageWiring {
    input: LineReceiver,
    output: LineSender,
    /// Completion of the previous stage, when both it and this stage are builtins.
    after: Option<oneshot::Receiver<()>>,
    /// Dropped when the stage finishes.
    done: oneshot::Sender<()>,
}

/// Runs one stage, reading `input` and writing to `output` (or to its output
/// redirect file). The downstream stream closes when this returns.
async fn run_stage(stage: Stage, ctx: ExecutionContext, wiring: StageWiring) {
    let StageWiring {
        input,
        output,
        after,
        done: _done,
    } = wiring;
    let token = ctx.token().clone();

    // With an output redirect, `_downstream` stays open but silent until the stage ends.
    let (sink, _downstream, writer) = match &stage.redirects.output {
        Some(raw) => {
            let path = ctx.cwd().resolve(raw);
            match redirect::create_output(&path) {
                Ok(file) => {
                    let (tx, handle) = redirect::spawn_file_writer(file, path, token.clone());
                    (tx, Some(output), Some(handle))
                }
                Err(e) => {
                    report_redirect_failure(&stage, &e);
                    stream::discard_pending(input);
                    return;
                }
            }
        }
        None => (output, None, None),
    };

    let input_path: Option<PathBuf> = stage.redirects.input.as_deref().map(|raw| ctx.cwd().resolve(raw));

    match &stage.kind {
        StageKind::Builtin(builtin) => {
            stream::discard_pending(input);
            run_builtin(*builtin, &stage, &ctx, input_path, after, sink).await;
        }
        StageKind::External { program } => {
            let command = ExternalCommand {
                program,
                args: &stage.args,
                input_redirect: input_path.as_deref(),
            };
            match executor::run_external(command, &ctx, input, sink).await {
                Ok(_) => {}
                Err(ExecutionError::Redirect(e)) => report_redirect_failure(&stage, &e),
                Err(e) => executor::report_failure(&e),
            }
        }
    }

    if let Some(writer) = writer
        && let Err(e) = writer.await
    {
        log::warn!("Output redirect writer for '{}' failed: {}", stage.name, e);
    }
    log::debug!("Stage '{}' finished", stage.name);
}

/// Runs a builtin. Its input stream has already been closed.
///
/// When the previous stage is a builtin too, this one waits for it to finish,
/// so `cd / | pwd` sees the new directory.
async fn run_builtin(
    builtin: Builtin,
    stage: &Stage,
    ctx: &ExecutionContext,
    input_path: Option<PathBuf>,
    after: Option<oneshot::Receiver<()>>,
    sink: LineSender,
) {
    let token = ctx.token();

    // Builtins ignore their input, but a bad input redirect still aborts the stage.
    if let Some(path) = input_path
        && let Err(e) = redirect::open_input(&path)
    {
        report_redirect_failure(stage, &e);
        return;
    }

    if let Some(previous) = after {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            // The sender is only ever dropped, so `Err` is the normal outcome.
            _ = previous => {}
        }
    }
    if ctx.is_cancelled() {
        return;
    }

    let args = stage.args.clone();
    let cwd = ctx.cwd_handle();
    let lines = match tokio::task::spawn_blocking(move || builtin.execute(&args, &cwd)).await {
        Ok(lines) => lines,
        Err(e) => {
            log::warn!("Builtin '{}' did not complete: {}", builtin.name(), e);
            return;
        }
    };

    for line in lines {
        if stream::send_line(&sink, line, token).await.is_err() {
            log::trace!("Builtin '{}' output no longer consumed", builtin.name());
            break;
        }
    }
}

fn report_redirect_failure(stage: &Stage, error: &RedirectError) {
    eprintln!(
        "\n{}",
        format!(t!("redirect.error.stage"), stage = stage.name, error = error).red()
    );
}

// MARK: --- UNIT TESTS ---
