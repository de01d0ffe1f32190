//! vidjoin Common Utilities
//!
//! Shared infrastructure for all vidjoin crates:
//! - Error taxonomy, caller-visible error codes, and result aliases
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
