// src/system/mod.rs

//! # System Interaction Layer
//!
//! The boundary between the shell and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: spawns external programs for pipeline stages, bridges their
//!   standard streams to line streams and kills them when a line is interrupted.
//! - **`input`**: reads the raw input source in its own task.
//! - **`process_table`**: lists and kills processes for `ps` and `kill`.
//! - **`signals`**: turns `SIGINT`/`SIGTERM`/`SIGQUIT` into per-line cancellation.

pub mod executor;
pub mod input;
pub mod process_table;
pub mod signals;
