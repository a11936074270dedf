// src/bin/pipesh.rs

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use pipesh::{
    cli::{
        Cli,
        repl::{Repl, ReplError},
    },
    core::config_loader,
    models::ShellConfig,
    state::WorkingDir,
    system::{input::LiveInput, signals::InterruptController},
    t,
};

/// The entry point of `pipesh`.
/// Sets up logging, loads the configuration, runs the session and performs
/// centralized error handling.
fn main() {
    env_logger::init();

    if let Err(e) = run_shell(Cli::parse()) {
        // --- Centralized Error Handling ---
        if let Some(ReplError::Read(source)) = e.downcast_ref::<ReplError>() {
            eprintln!("\n{}", format!(t!("repl.error.read"), error = source).red());
            std::process::exit(1);
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_shell(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let mut config = config_loader::load_shell_config(cli.config.as_deref()).unwrap_or_else(|e| {
        log::warn!("Configuration fallback: {}", e);
        eprintln!("{}", format!(t!("config.warn.fallback"), error = e).yellow());
        ShellConfig::default()
    });
    if cli.no_prompt {
        config.prompt.show = false;
    }

    let cwd = Arc::new(WorkingDir::from_process().context("Could not read the working directory")?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Could not start the async runtime")?;

    let result = runtime.block_on(async {
        let interrupts =
            InterruptController::new().context("Could not listen for interrupt signals")?;
        let mut repl = Repl::new(
            config.prompt,
            cwd,
            interrupts,
            LiveInput::stdin(),
            tokio::io::stdout(),
        );
        repl.run().await.map_err(anyhow::Error::from)
    });

    // The stdin reader may still be parked in a blocking read.
    runtime.shutdown_background();

    result
}
