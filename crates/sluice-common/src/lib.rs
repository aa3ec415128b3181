//! Sluice Common Library
//!
//! Shared utilities for the sluice workspace members.
//!
//! Currently this is logging configuration and initialization; pipeline
//! types live in `sluice-ingest` next to the code that produces them.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
