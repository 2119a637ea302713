//! TinyTV Common Utilities
//!
//! Shared infrastructure for all TinyTV crates:
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Configuration loading
//! - Human-readable size and duration formatting

pub mod config;
pub mod error;
pub mod format;
pub mod logging;

pub use config::*;
pub use error::*;
pub use format::*;
