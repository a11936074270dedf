// src/constants.rs

//! Fixed names and literals shared across the shell.

/// Name of the application directory inside the system config directory.
pub const APP_DIR_NAME: &str = "pipesh";

/// Name of the configuration file (inside the application directory).
pub const CONFIG_FILENAME: &str = "config.toml";

/// Number of lines a stream holds before the producer has to wait.
pub const STREAM_CAPACITY: usize = 1;

/// The stage text that ends the session wherever it appears in a pipeline.
pub const EXIT_STAGE: &str = "exit";

/// End-of-transmission control character (`Ctrl+D` on a raw terminal).
pub const END_OF_TRANSMISSION: char = '\u{4}';

/// Printable form some terminals echo for `Ctrl+D`.
pub const END_MARKER_TEXT: &str = "^D";

/// Header line printed by the `ps` builtin.
pub const PS_HEADER: &str = "      PID    PPID\tCMD";

/// Default prompt pieces, printed around the working directory.
pub const DEFAULT_PROMPT_PREFIX: &str = "(pipesh) ";
/// See [`DEFAULT_PROMPT_PREFIX`].
pub const DEFAULT_PROMPT_SUFFIX: &str = ">";
