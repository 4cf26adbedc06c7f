//! # Striping Common
//!
//! Shared utilities for the precache striping workspace.
//!
//! ## Features
//!
//! - Logging configuration and subscriber setup
//! - Environment-driven filters (`RUST_LOG`) with a configurable fallback level

pub mod logging;

pub use logging::{init_logging, try_init_logging, LogConfig, LogFormat, LoggingError};
