// src/lib.rs

//! # pipesh
//!
//! An interactive command-pipeline shell. A line such as `ps | grep ssh > out.txt`
//! is parsed into stages that run concurrently, connected by capacity-one line
//! streams, and can be aborted with `Ctrl+C` without ending the session.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

/// Cooperative cancellation scope shared by every stage of one pipeline.
pub use tokio_util::sync::CancellationToken;

pub mod builtins;
pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod state;
pub mod system;
