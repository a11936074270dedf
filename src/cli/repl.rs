// src/cli/repl.rs

//! The interactive loop.
//!
//! Each cycle opens an interrupt scope, prints the prompt and waits for a line
//! or an interrupt. A line is parsed into a pipeline and run under that same
//! scope; the scope is released before the next prompt.

use std::io;
use std::sync::Arc;

use colored::Colorize;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::core::interpolator;
use crate::core::parser;
use crate::core::pipeline_executor::{self, PipelineError};
use crate::models::{InputEvent, PromptConfig};
use crate::state::{ExecutionContext, WorkingDir};
use crate::system::input::{self, LiveInput};
use crate::system::signals::{InterruptController, InterruptScope};

#[derive(Error, Debug)]
pub enum ReplError {
    /// The input source failed. Ends the session.
    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write to the terminal: {0}")]
    Output(#[source] io::Error),
}

/// Resolves `$NAME` tokens.
pub type EnvLookup = fn(&str) -> Option<String>;

enum ReplState {
    AwaitInput,
    Dispatch { line: String, scope: InterruptScope },
    Terminated,
}

#[derive(Debug)]
pub struct Repl<W> {
    prompt: PromptConfig,
    cwd: Arc<WorkingDir>,
    interrupts: InterruptController,
    input: LiveInput,
    out: W,
    env: EnvLookup,
}

impl<W> Repl<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        prompt: PromptConfig,
        cwd: Arc<WorkingDir>,
        interrupts: InterruptController,
        input: LiveInput,
        out: W,
    ) -> Self {
        Self {
            prompt,
            cwd,
            interrupts,
            input,
            out,
            env: interpolator::env_lookup,
        }
    }

    /// Replaces the process-environment lookup used for `$NAME` substitution.
    pub fn with_env_lookup(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs the loop until `exit`, end of input or an end marker.
    pub async fn run(&mut self) -> Result<(), ReplError> {
        let mut state = ReplState::AwaitInput;
        loop {
            state = match state {
                ReplState::AwaitInput => self.await_input().await?,
                ReplState::Dispatch { line, scope } => self.dispatch(&line, scope).await?,
                ReplState::Terminated => {
                    log::debug!("Session terminated");
                    return Ok(());
                }
            };
        }
    }

    async fn await_input(&mut self) -> Result<ReplState, ReplError> {
        let scope = self.interrupts.scope();
        self.write_prompt().await?;

        let event = tokio::select! {
            biased;
            _ = scope.token().cancelled() => None,
            event = self.input.next_event() => Some(event),
        };
        let Some(event) = event else {
            log::debug!("Interrupted while waiting for input");
            self.write_raw(b"\n").await?;
            return Ok(ReplState::AwaitInput);
        };

        match event {
            InputEvent::Line(line) if input::is_end_marker(&line) => Ok(ReplState::Terminated),
            InputEvent::Line(line) if line.trim().is_empty() => Ok(ReplState::AwaitInput),
            InputEvent::Line(line) => Ok(ReplState::Dispatch { line, scope }),
            InputEvent::EndOfStream => Ok(ReplState::Terminated),
            InputEvent::ReadError(e) => Err(ReplError::Read(e)),
        }
    }

    async fn dispatch(&mut self, line: &str, scope: InterruptScope) -> Result<ReplState, ReplError> {
        if parser::contains_exit(line) {
            return Ok(ReplState::Terminated);
        }

        let pipeline = match parser::parse_pipeline(line, &self.env) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("{}", format!(t!("repl.error.parse"), error = e).red());
                return Ok(ReplState::AwaitInput);
            }
        };
        log::debug!("Dispatching a pipeline of {} stage(s)", pipeline.len());

        let ctx = ExecutionContext::new(scope.token().clone(), Arc::clone(&self.cwd));
        let result =
            pipeline_executor::run_pipeline(&pipeline, &ctx, &mut self.input, &mut self.out).await;
        if scope.is_interrupted() {
            log::debug!("Line finished under an interrupted scope");
        }
        drop(scope);

        match result {
            Ok(()) => Ok(ReplState::AwaitInput),
            Err(PipelineError::Input(e)) => Err(ReplError::Read(e)),
            Err(PipelineError::Output(e)) => Err(ReplError::Output(e)),
        }
    }

    async fn write_prompt(&mut self) -> Result<(), ReplError> {
        if !self.prompt.show {
            return Ok(());
        }
        let cwd = self.cwd.get().display().to_string();
        let prompt = if self.prompt.colored {
            format!(
                "{}{}{}",
                self.prompt.prefix.green(),
                cwd.cyan().bold(),
                self.prompt.suffix
            )
        } else {
            format!("{}{}{}", self.prompt.prefix, cwd, self.prompt.suffix)
        };
        self.write_raw(prompt.as_bytes()).await
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ReplError> {
        self.out.write_all(bytes).await.map_err(ReplError::Output)?;
        self.out.flush().await.map_err(ReplError::Output)
    }
}

// MARK: --- UNIT TESTS ---
