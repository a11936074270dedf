// src/core/mod.rs

pub mod bridge;
pub mod config_loader;
pub mod interpolator;
pub mod parser;
pub mod paths;
pub mod pipeline_executor;
pub mod redirect;
pub mod stream;
