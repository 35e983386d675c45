//! # Iris Core
//!
//! This crate provides shared utilities for the iris debug bridge:
//! configuration handling, internal error definitions, logging setup and the
//! id registry used for threads, frames and variable providers.

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;

// Re-export key items for easier use by other crates
pub use config::{SessionConfig, load_config};
pub use error::CoreError;
pub use registry::Registry;
