// src/models.rs

//! Data model shared by the parser, the executor and the REPL.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::builtins::{self, Builtin};
use crate::constants::{DEFAULT_PROMPT_PREFIX, DEFAULT_PROMPT_SUFFIX};

// --- PIPELINE MODEL ---

/// The ordered chain of stages parsed from one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Number of stages in the pipeline.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when the pipeline holds no stage at all.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// One command of a pipeline, with redirects already stripped from its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
    pub args: Vec<String>,
    pub redirects: Redirects,
}

/// File overrides for a stage's input and output streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirects {
    pub input: Option<String>,
    pub output: Option<String>,
}

/// How a stage is executed, resolved once when the stage is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageKind {
    Builtin(Builtin),
    External { program: String },
}

impl StageKind {
    /// Resolves a command name against the builtin registry.
    pub fn resolve(name: &str) -> Self {
        match builtins::find_builtin(name) {
            Some(builtin) => Self::Builtin(builtin),
            None => Self::External {
                program: name.to_string(),
            },
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin(builtin) => write!(f, "builtin '{}'", builtin.name()),
            Self::External { program } => write!(f, "program '{}'", program),
        }
    }
}

// --- INPUT MODEL ---

/// One read from the raw input source.
#[derive(Debug)]
pub enum InputEvent {
    /// A line of text, without its terminator.
    Line(String),
    /// The input source failed; the session cannot continue.
    ReadError(std::io::Error),
    /// The input source is exhausted.
    EndOfStream,
}

// --- CONFIGURATION MODEL (config.toml) ---

/// The deserialized structure of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellConfig {
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Prompt appearance: `<prefix><cwd><suffix>`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    pub show: bool,
    pub prefix: String,
    pub suffix: String,
    pub colored: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            show: true,
            prefix: DEFAULT_PROMPT_PREFIX.to_string(),
            suffix: DEFAULT_PROMPT_SUFFIX.to_string(),
            colored: true,
        }
    }
}
