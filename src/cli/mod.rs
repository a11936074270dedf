// src/cli/mod.rs

use std::path::PathBuf;

use clap::Parser;

pub mod repl;

/// Builds the dynamic, color-aware full help string at runtime.
fn build_help_string() -> &'static str {
    // Mini-renderer for the semantic tags of the localized help template.
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let err = if use_colors { "\x1b[91m" } else { "" }; // Bright Red
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<err>", err)
        .replace("</err>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// pipesh: an interactive command-pipeline shell.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    /// Do not print the working-directory prompt before each line.
    #[arg(short = 'w', long = "no-prompt")]
    pub no_prompt: bool,

    /// Load the configuration from this file instead of the default location.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
